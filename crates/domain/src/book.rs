//! Book catalog.

use chrono::{DateTime, Utc};
use common::{from_millis, now_millis};
use serde::{Deserialize, Serialize};
use sqlx::{Row, sqlite::SqliteRow};
use store::Store;

use crate::{DomainError, Result};

const BOOK_COLUMNS: &str = "isbn, title, authors, publisher, CAST(price AS REAL) AS price, year, \
     edited_by, out_of_print, category, updated_at";

/// A catalog entry.
///
/// Every field except the isbn is optional. On upsert, a `None` field keeps
/// the stored value instead of clearing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Book {
    pub isbn: String,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub price: Option<f64>,
    pub year: Option<String>,
    pub edited_by: Option<String>,
    pub out_of_print: Option<bool>,
    pub category: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Book {
    /// Creates a book with only its isbn set.
    pub fn new(isbn: impl Into<String>) -> Self {
        Self {
            isbn: isbn.into(),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = Some(authors.into());
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Returns true if any field other than the isbn is set.
    fn has_fields(&self) -> bool {
        self.title.is_some()
            || self.authors.is_some()
            || self.publisher.is_some()
            || self.price.is_some()
            || self.year.is_some()
            || self.edited_by.is_some()
            || self.out_of_print.is_some()
            || self.category.is_some()
    }

    fn from_row(row: SqliteRow) -> Result<Self> {
        Ok(Self {
            isbn: row.try_get("isbn")?,
            title: row.try_get("title")?,
            authors: row.try_get("authors")?,
            publisher: row.try_get("publisher")?,
            price: row.try_get("price")?,
            year: row.try_get("year")?,
            edited_by: row.try_get("edited_by")?,
            out_of_print: row
                .try_get::<Option<i64>, _>("out_of_print")?
                .map(|flag| flag != 0),
            category: row.try_get("category")?,
            updated_at: row.try_get::<Option<i64>, _>("updated_at")?.map(from_millis),
        })
    }
}

/// Reads and merges catalog entries.
#[derive(Clone)]
pub struct BookCatalog {
    store: Store,
}

impl BookCatalog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Inserts a book or merges the provided fields into the stored one.
    #[tracing::instrument(skip(self, book), fields(isbn = %book.isbn))]
    pub async fn upsert_book(&self, book: &Book) -> Result<()> {
        if book.isbn.trim().is_empty() {
            return Err(DomainError::MissingIsbn);
        }

        let updated_at = book.has_fields().then(now_millis);

        sqlx::query(
            r#"
            INSERT INTO book (isbn, title, authors, publisher, price, year, edited_by, out_of_print, category, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(isbn) DO UPDATE SET
                title = COALESCE(excluded.title, title),
                authors = COALESCE(excluded.authors, authors),
                publisher = COALESCE(excluded.publisher, publisher),
                price = COALESCE(excluded.price, price),
                year = COALESCE(excluded.year, year),
                edited_by = COALESCE(excluded.edited_by, edited_by),
                out_of_print = COALESCE(excluded.out_of_print, out_of_print),
                category = COALESCE(excluded.category, category),
                updated_at = COALESCE(excluded.updated_at, updated_at)
            "#,
        )
        .bind(&book.isbn)
        .bind(book.title.as_deref())
        .bind(book.authors.as_deref())
        .bind(book.publisher.as_deref())
        .bind(book.price)
        .bind(book.year.as_deref())
        .bind(book.edited_by.as_deref())
        .bind(book.out_of_print)
        .bind(book.category.as_deref())
        .bind(updated_at)
        .execute(self.store.pool())
        .await?;

        Ok(())
    }

    /// Gets a book by isbn.
    #[tracing::instrument(skip(self))]
    pub async fn get_book(&self, isbn: &str) -> Result<Option<Book>> {
        let row = sqlx::query(&format!("SELECT {BOOK_COLUMNS} FROM book WHERE isbn = ?"))
            .bind(isbn)
            .fetch_optional(self.store.pool())
            .await?;

        row.map(Book::from_row).transpose()
    }

    /// Gets every known book among `isbns`, ordered by isbn.
    #[tracing::instrument(skip(self))]
    pub async fn get_books(&self, isbns: &[String]) -> Result<Vec<Book>> {
        if isbns.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {BOOK_COLUMNS} FROM book WHERE isbn IN ({}) ORDER BY isbn",
            store::placeholders(isbns.len())
        );
        let mut query = sqlx::query(&sql);
        for isbn in isbns {
            query = query.bind(isbn);
        }

        let rows = query.fetch_all(self.store.pool()).await?;
        rows.into_iter().map(Book::from_row).collect()
    }

    /// Finds books whose isbn, title or authors contain `text`.
    #[tracing::instrument(skip(self))]
    pub async fn search_books(&self, text: &str) -> Result<Vec<Book>> {
        let pattern = format!("%{text}%");
        let rows = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM book \
             WHERE isbn LIKE ? OR title LIKE ? OR authors LIKE ? ORDER BY isbn"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(self.store.pool())
        .await?;

        rows.into_iter().map(Book::from_row).collect()
    }

    /// Lists every distinct publisher in the catalog.
    #[tracing::instrument(skip(self))]
    pub async fn publisher_list(&self) -> Result<Vec<String>> {
        let publishers = sqlx::query_scalar(
            "SELECT DISTINCT publisher FROM book WHERE publisher IS NOT NULL ORDER BY publisher",
        )
        .fetch_all(self.store.pool())
        .await?;

        Ok(publishers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn catalog() -> BookCatalog {
        BookCatalog::new(Store::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn upsert_requires_isbn() {
        let catalog = catalog().await;
        let result = catalog.upsert_book(&Book::new(" ").title("Nameless")).await;
        assert!(matches!(result, Err(DomainError::MissingIsbn)));
    }

    #[tokio::test]
    async fn upsert_merges_field_by_field() {
        let catalog = catalog().await;
        catalog
            .upsert_book(&Book::new("111").title("Dune").price(12.5))
            .await
            .unwrap();
        catalog
            .upsert_book(&Book::new("111").authors("Frank Herbert"))
            .await
            .unwrap();

        let book = catalog.get_book("111").await.unwrap().unwrap();
        assert_eq!(book.title.as_deref(), Some("Dune"));
        assert_eq!(book.authors.as_deref(), Some("Frank Herbert"));
        assert_eq!(book.price, Some(12.5));
        assert!(book.updated_at.is_some());
    }

    #[tokio::test]
    async fn isbn_only_upsert_leaves_no_timestamp() {
        let catalog = catalog().await;
        catalog.upsert_book(&Book::new("222")).await.unwrap();

        let book = catalog.get_book("222").await.unwrap().unwrap();
        assert_eq!(book.title, None);
        assert_eq!(book.updated_at, None);
    }

    #[tokio::test]
    async fn search_and_publishers() {
        let catalog = catalog().await;
        catalog
            .upsert_book(&Book::new("111").title("Dune").publisher("Chilton"))
            .await
            .unwrap();
        catalog
            .upsert_book(&Book::new("222").title("Emma").publisher("Murray"))
            .await
            .unwrap();
        catalog
            .upsert_book(&Book::new("333").title("Dune Messiah").publisher("Chilton"))
            .await
            .unwrap();

        let found = catalog.search_books("Dune").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(
            catalog.publisher_list().await.unwrap(),
            vec!["Chilton".to_string(), "Murray".to_string()]
        );
        assert!(catalog.get_book("999").await.unwrap().is_none());
    }
}
