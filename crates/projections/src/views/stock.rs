//! Stock read model: current quantity per (book, warehouse).

use common::WarehouseId;
use serde::Serialize;
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};
use store::{Store, placeholders};

use crate::Result;

/// Signed contribution of one book transaction to stock.
///
/// Inbound and reconciliation notes add, outbound notes subtract.
const SIGNED_QUANTITY: &str = "CASE WHEN n.warehouse_id IS NOT NULL OR n.is_reconciliation_note = 1 \
     THEN bt.quantity ELSE -bt.quantity END";

/// Filters applied to a stock query. All filters combine with AND.
#[derive(Debug, Clone, Default)]
pub struct StockFilter {
    /// Free text matched against isbn, title and authors.
    pub search: Option<String>,

    /// Restrict to these isbns.
    pub isbns: Option<Vec<String>>,

    /// Restrict to these (isbn, warehouse) pairs.
    pub entries: Option<Vec<(String, WarehouseId)>>,

    /// Restrict to a single warehouse.
    pub warehouse_id: Option<WarehouseId>,
}

impl StockFilter {
    /// Creates an empty filter matching all stock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter for a single warehouse.
    pub fn for_warehouse(warehouse_id: WarehouseId) -> Self {
        Self {
            warehouse_id: Some(warehouse_id),
            ..Default::default()
        }
    }

    /// Matches isbn, title or authors containing `text`.
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Restricts to the given isbns.
    pub fn isbns(mut self, isbns: Vec<String>) -> Self {
        self.isbns = Some(isbns);
        self
    }

    /// Restricts to the given (isbn, warehouse) pairs.
    pub fn entries(mut self, entries: Vec<(String, WarehouseId)>) -> Self {
        self.entries = Some(entries);
        self
    }

    /// Restricts to a single warehouse.
    pub fn warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    /// True when an explicit list filter is present but empty.
    fn matches_nothing(&self) -> bool {
        self.isbns.as_ref().is_some_and(Vec::is_empty)
            || self.entries.as_ref().is_some_and(Vec::is_empty)
    }
}

/// Catalog details joined onto a stock row. Unknown books have every field empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookMeta {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub price: Option<f64>,
    pub year: Option<String>,
    pub edited_by: Option<String>,
    pub out_of_print: bool,
    pub category: Option<String>,
}

/// Current stock of one book in one warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockEntry {
    pub isbn: String,
    pub warehouse_id: Option<WarehouseId>,
    pub warehouse_name: Option<String>,
    pub warehouse_discount: f64,
    pub quantity: i64,
    #[serde(flatten)]
    pub book: BookMeta,
}

/// Total committed stock held by one warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WarehouseTotal {
    pub warehouse_id: WarehouseId,
    pub total_books: i64,
}

/// Read model over the note ledger.
#[derive(Clone)]
pub struct StockView {
    store: Store,
}

impl StockView {
    /// Creates a view over the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Returns every non-zero stock row matching `filter`, ordered by isbn then warehouse.
    #[tracing::instrument(skip(self))]
    pub async fn get_stock(&self, filter: &StockFilter) -> Result<Vec<StockEntry>> {
        let mut conn = self.store.acquire().await?;
        stock_entries(&mut conn, filter).await
    }

    /// Returns the committed stock of a single (isbn, warehouse) pair, 0 if none.
    #[tracing::instrument(skip(self))]
    pub async fn quantity(&self, isbn: &str, warehouse_id: WarehouseId) -> Result<i64> {
        let filter = StockFilter::new().entries(vec![(isbn.to_string(), warehouse_id)]);
        let rows = self.get_stock(&filter).await?;
        Ok(rows.first().map_or(0, |row| row.quantity))
    }

    /// Returns the total committed stock per warehouse.
    #[tracing::instrument(skip(self))]
    pub async fn warehouse_totals(&self) -> Result<Vec<WarehouseTotal>> {
        let mut conn = self.store.acquire().await?;
        warehouse_totals(&mut conn).await
    }
}

/// Computes stock on an existing connection or transaction.
pub async fn stock_entries(
    conn: &mut SqliteConnection,
    filter: &StockFilter,
) -> Result<Vec<StockEntry>> {
    if filter.matches_nothing() {
        return Ok(Vec::new());
    }

    let mut sql = format!(
        r#"
        SELECT bt.isbn AS isbn,
               bt.warehouse_id AS warehouse_id,
               CAST(SUM({SIGNED_QUANTITY}) AS INTEGER) AS quantity,
               w.display_name AS warehouse_name,
               CAST(COALESCE(w.discount, 0) AS REAL) AS warehouse_discount,
               b.title AS title,
               b.authors AS authors,
               b.publisher AS publisher,
               CAST(b.price AS REAL) AS price,
               b.year AS year,
               b.edited_by AS edited_by,
               COALESCE(b.out_of_print, 0) AS out_of_print,
               b.category AS category
        FROM book_transaction bt
        JOIN note n ON n.id = bt.note_id
        LEFT JOIN warehouse w ON w.id = bt.warehouse_id
        LEFT JOIN book b ON b.isbn = bt.isbn
        WHERE n.committed = 1
        "#
    );

    if filter.search.is_some() {
        sql.push_str(" AND (bt.isbn LIKE ? OR b.title LIKE ? OR b.authors LIKE ?)");
    }
    if let Some(isbns) = &filter.isbns {
        sql.push_str(&format!(" AND bt.isbn IN ({})", placeholders(isbns.len())));
    }
    if let Some(entries) = &filter.entries {
        let pairs = vec!["(bt.isbn = ? AND bt.warehouse_id = ?)"; entries.len()].join(" OR ");
        sql.push_str(&format!(" AND ({pairs})"));
    }
    if filter.warehouse_id.is_some() {
        sql.push_str(" AND bt.warehouse_id = ?");
    }

    sql.push_str(&format!(
        " GROUP BY bt.isbn, bt.warehouse_id HAVING SUM({SIGNED_QUANTITY}) != 0 \
         ORDER BY bt.isbn, bt.warehouse_id"
    ));

    let mut query = sqlx::query(&sql);
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        query = query.bind(pattern.clone()).bind(pattern.clone()).bind(pattern);
    }
    if let Some(isbns) = &filter.isbns {
        for isbn in isbns {
            query = query.bind(isbn);
        }
    }
    if let Some(entries) = &filter.entries {
        for (isbn, warehouse_id) in entries {
            query = query.bind(isbn).bind(warehouse_id.as_i64());
        }
    }
    if let Some(warehouse_id) = filter.warehouse_id {
        query = query.bind(warehouse_id.as_i64());
    }

    let rows = query.fetch_all(&mut *conn).await?;
    rows.into_iter().map(row_to_entry).collect()
}

/// Sums committed stock per warehouse on an existing connection or transaction.
///
/// Warehouses with no committed stock are absent from the result.
pub async fn warehouse_totals(conn: &mut SqliteConnection) -> Result<Vec<WarehouseTotal>> {
    let sql = format!(
        r#"
        SELECT bt.warehouse_id AS warehouse_id,
               CAST(SUM({SIGNED_QUANTITY}) AS INTEGER) AS total_books
        FROM book_transaction bt
        JOIN note n ON n.id = bt.note_id
        WHERE n.committed = 1 AND bt.warehouse_id IS NOT NULL
        GROUP BY bt.warehouse_id
        ORDER BY bt.warehouse_id
        "#
    );

    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.into_iter()
        .map(|row| {
            Ok(WarehouseTotal {
                warehouse_id: WarehouseId::new(row.try_get("warehouse_id")?),
                total_books: row.try_get("total_books")?,
            })
        })
        .collect()
}

fn row_to_entry(row: SqliteRow) -> Result<StockEntry> {
    let out_of_print: i64 = row.try_get("out_of_print")?;

    Ok(StockEntry {
        isbn: row.try_get("isbn")?,
        warehouse_id: row
            .try_get::<Option<i64>, _>("warehouse_id")?
            .map(WarehouseId::new),
        warehouse_name: row.try_get("warehouse_name")?,
        warehouse_discount: row.try_get("warehouse_discount")?,
        quantity: row.try_get("quantity")?,
        book: BookMeta {
            title: row.try_get("title")?,
            authors: row.try_get("authors")?,
            publisher: row.try_get("publisher")?,
            price: row.try_get("price")?,
            year: row.try_get("year")?,
            edited_by: row.try_get("edited_by")?,
            out_of_print: out_of_print != 0,
            category: row.try_get("category")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn note(store: &Store, id: i64, warehouse: Option<i64>, committed: bool) {
        sqlx::query(
            "INSERT INTO note (id, warehouse_id, committed, updated_at) VALUES (?, ?, ?, 0)",
        )
        .bind(id)
        .bind(warehouse)
        .bind(committed)
        .execute(store.pool())
        .await
        .unwrap();
    }

    async fn line(store: &Store, note_id: i64, isbn: &str, warehouse: i64, quantity: i64) {
        sqlx::query(
            "INSERT INTO book_transaction (note_id, isbn, warehouse_id, quantity, updated_at) \
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(note_id)
        .bind(isbn)
        .bind(warehouse)
        .bind(quantity)
        .execute(store.pool())
        .await
        .unwrap();
    }

    #[test]
    fn empty_list_filters_match_nothing() {
        assert!(StockFilter::new().isbns(vec![]).matches_nothing());
        assert!(StockFilter::new().entries(vec![]).matches_nothing());
        assert!(!StockFilter::new().matches_nothing());
    }

    #[tokio::test]
    async fn empty_ledger_has_no_stock() {
        let store = Store::in_memory().await.unwrap();
        let view = StockView::new(store);

        assert!(view.get_stock(&StockFilter::new()).await.unwrap().is_empty());
        assert_eq!(view.quantity("A", WarehouseId::new(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn inbound_minus_outbound() {
        let store = Store::in_memory().await.unwrap();
        note(&store, 1, Some(1), true).await;
        line(&store, 1, "A", 1, 10).await;
        note(&store, 2, None, true).await;
        line(&store, 2, "A", 1, 3).await;

        let view = StockView::new(store);
        assert_eq!(view.quantity("A", WarehouseId::new(1)).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn drafts_do_not_count() {
        let store = Store::in_memory().await.unwrap();
        note(&store, 1, Some(1), false).await;
        line(&store, 1, "A", 1, 10).await;

        let view = StockView::new(store);
        assert!(view.get_stock(&StockFilter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_rows_are_omitted() {
        let store = Store::in_memory().await.unwrap();
        note(&store, 1, Some(1), true).await;
        line(&store, 1, "A", 1, 4).await;
        note(&store, 2, None, true).await;
        line(&store, 2, "A", 1, 4).await;

        let view = StockView::new(store);
        assert!(view.get_stock(&StockFilter::new()).await.unwrap().is_empty());
        assert!(view.warehouse_totals().await.unwrap().iter().all(|t| t.total_books == 0));
    }
}
