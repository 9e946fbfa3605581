//! Suppliers, publisher routing and supplier orders.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{SupplierId, SupplierOrderId, from_millis, now_millis};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};
use store::{Store, placeholders};

use crate::{OrderError, Result};

/// Name of the bucket for books whose publisher has no supplier.
pub const DEFAULT_SUPPLIER_NAME: &str = "General";

/// The supplier a book is ordered from, `None` for the general bucket.
async fn routed_supplier(conn: &mut SqliteConnection, isbn: &str) -> Result<Option<SupplierId>> {
    let supplier_id: Option<i64> = sqlx::query_scalar(
        "SELECT s.id FROM (SELECT ? AS isbn) wanted \
         LEFT JOIN book b ON b.isbn = wanted.isbn \
         LEFT JOIN supplier_publisher sp ON sp.publisher = b.publisher \
         LEFT JOIN supplier s ON s.id = sp.supplier_id",
    )
    .bind(isbn)
    .fetch_one(&mut *conn)
    .await?;
    Ok(supplier_id.map(SupplierId::new))
}

/// Routes each unplaced customer order line to the supplier of its book's publisher.
const UNPLACED_LINES: &str = r#"
    FROM customer_order_lines col
    LEFT JOIN book b ON b.isbn = col.isbn
    LEFT JOIN supplier_publisher sp ON sp.publisher = b.publisher
    LEFT JOIN supplier s ON s.id = sp.supplier_id
    WHERE col.placed IS NULL
"#;

/// A quantity of one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookQuantity {
    pub isbn: String,
    pub quantity: i64,
}

impl BookQuantity {
    pub fn new(isbn: impl Into<String>, quantity: i64) -> Self {
        Self {
            isbn: isbn.into(),
            quantity,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.isbn.trim().is_empty() {
            return Err(OrderError::MissingIsbn);
        }
        if self.quantity <= 0 {
            return Err(OrderError::InvalidQuantity {
                isbn: self.isbn.clone(),
                quantity: self.quantity,
            });
        }
        Ok(())
    }
}

/// Sums quantities per isbn, in isbn order.
pub(crate) fn merge_quantities(lines: &[BookQuantity]) -> Vec<BookQuantity> {
    let mut merged: BTreeMap<&str, i64> = BTreeMap::new();
    for line in lines {
        *merged.entry(line.isbn.as_str()).or_default() += line.quantity;
    }
    merged
        .into_iter()
        .map(|(isbn, quantity)| BookQuantity::new(isbn, quantity))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub publisher_count: i64,
}

impl Supplier {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: SupplierId::new(row.try_get("id")?),
            name: row.try_get::<Option<String>, _>("name")?.unwrap_or_default(),
            email: row.try_get("email")?,
            address: row.try_get("address")?,
            publisher_count: row.try_get("publisher_count")?,
        })
    }
}

/// Supplier fields to write. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SupplierUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl SupplierUpdate {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Unplaced customer demand for one supplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PossibleSupplierOrder {
    /// `None` for the general bucket.
    pub supplier_id: Option<SupplierId>,
    pub supplier_name: String,
    pub total_book_number: i64,
    pub total_book_price: f64,
}

/// Unplaced customer demand for one book from one supplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PossibleSupplierOrderLine {
    pub supplier_id: Option<SupplierId>,
    pub supplier_name: String,
    pub isbn: String,
    pub title: String,
    pub authors: String,
    pub publisher: String,
    pub price: f64,
    pub quantity: i64,
    pub line_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedSupplierOrder {
    pub id: SupplierOrderId,
    pub supplier_id: Option<SupplierId>,
    pub supplier_name: String,
    pub created: DateTime<Utc>,
    pub total_book_number: i64,
    pub total_book_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedSupplierOrderLine {
    pub supplier_order_id: SupplierOrderId,
    pub supplier_id: Option<SupplierId>,
    pub supplier_name: String,
    pub isbn: String,
    pub title: String,
    pub authors: String,
    pub price: f64,
    pub quantity: i64,
    pub line_price: f64,
    pub created: DateTime<Utc>,
}

/// Service for suppliers and supplier orders.
#[derive(Clone)]
pub struct SupplierService {
    store: Store,
}

impl SupplierService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates a supplier or merges the provided fields into an existing one.
    ///
    /// A new supplier needs a name.
    #[tracing::instrument(skip(self))]
    pub async fn upsert_supplier(&self, id: SupplierId, update: SupplierUpdate) -> Result<Supplier> {
        let name = update
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let mut tx = self.store.begin().await?;

        if name.is_none() {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM supplier WHERE id = ?")
                .bind(id.as_i64())
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(OrderError::MissingSupplierName(id));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO supplier (id, name, email, address) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = COALESCE(excluded.name, name),
                email = COALESCE(excluded.email, email),
                address = COALESCE(excluded.address, address)
            "#,
        )
        .bind(id.as_i64())
        .bind(name)
        .bind(update.email.as_deref())
        .bind(update.address.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(supplier_id = %id, "supplier saved");

        self.get_supplier(id)
            .await?
            .ok_or(OrderError::MissingSupplierName(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_supplier(&self, id: SupplierId) -> Result<Option<Supplier>> {
        let row = sqlx::query(
            "SELECT s.id, s.name, s.email, s.address, \
             (SELECT COUNT(*) FROM supplier_publisher sp WHERE sp.supplier_id = s.id) AS publisher_count \
             FROM supplier s WHERE s.id = ?",
        )
        .bind(id.as_i64())
        .fetch_optional(self.store.pool())
        .await?;

        row.as_ref().map(Supplier::from_row).transpose()
    }

    /// Lists suppliers with the number of publishers routed to each.
    #[tracing::instrument(skip(self))]
    pub async fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        let rows = sqlx::query(
            "SELECT s.id, s.name, s.email, s.address, \
             (SELECT COUNT(*) FROM supplier_publisher sp WHERE sp.supplier_id = s.id) AS publisher_count \
             FROM supplier s ORDER BY s.id",
        )
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(Supplier::from_row).collect()
    }

    /// Routes a publisher's books to a supplier, taking it from any previous one.
    #[tracing::instrument(skip(self))]
    pub async fn associate_publisher(&self, supplier_id: SupplierId, publisher: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO supplier_publisher (publisher, supplier_id) VALUES (?, ?) \
             ON CONFLICT(publisher) DO UPDATE SET supplier_id = excluded.supplier_id",
        )
        .bind(publisher)
        .bind(supplier_id.as_i64())
        .execute(self.store.pool())
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_publisher(&self, supplier_id: SupplierId, publisher: &str) -> Result<()> {
        sqlx::query("DELETE FROM supplier_publisher WHERE supplier_id = ? AND publisher = ?")
            .bind(supplier_id.as_i64())
            .bind(publisher)
            .execute(self.store.pool())
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn publishers_for(&self, supplier_id: SupplierId) -> Result<Vec<String>> {
        let publishers = sqlx::query_scalar(
            "SELECT publisher FROM supplier_publisher WHERE supplier_id = ? ORDER BY publisher ASC",
        )
        .bind(supplier_id.as_i64())
        .fetch_all(self.store.pool())
        .await?;
        Ok(publishers)
    }

    /// Groups unplaced customer order lines by supplier.
    ///
    /// Lines whose publisher is unknown or unrouted fall into the general bucket.
    #[tracing::instrument(skip(self))]
    pub async fn possible_supplier_orders(&self) -> Result<Vec<PossibleSupplierOrder>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT s.id AS supplier_id, COALESCE(s.name, ?) AS supplier_name,
                   COUNT(*) AS total_book_number,
                   CAST(SUM(COALESCE(b.price, 0)) AS REAL) AS total_book_price
            {UNPLACED_LINES}
            GROUP BY s.id
            ORDER BY supplier_name
            "#
        ))
        .bind(DEFAULT_SUPPLIER_NAME)
        .fetch_all(self.store.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PossibleSupplierOrder {
                    supplier_id: row
                        .try_get::<Option<i64>, _>("supplier_id")?
                        .map(SupplierId::new),
                    supplier_name: row.try_get("supplier_name")?,
                    total_book_number: row.try_get("total_book_number")?,
                    total_book_price: row.try_get("total_book_price")?,
                })
            })
            .collect()
    }

    /// Lists unplaced demand per isbn for one supplier, or the general bucket for `None`.
    #[tracing::instrument(skip(self))]
    pub async fn possible_supplier_order_lines(
        &self,
        supplier_id: Option<SupplierId>,
    ) -> Result<Vec<PossibleSupplierOrderLine>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT s.id AS supplier_id, COALESCE(s.name, ?) AS supplier_name, col.isbn,
                   COALESCE(b.title, 'N/A') AS title, COALESCE(b.authors, 'N/A') AS authors,
                   COALESCE(b.publisher, '') AS publisher,
                   CAST(COALESCE(b.price, 0) AS REAL) AS price,
                   COUNT(*) AS line_quantity,
                   CAST(SUM(COALESCE(b.price, 0)) AS REAL) AS line_price
            {UNPLACED_LINES}
              AND s.id IS ?
            GROUP BY col.isbn
            ORDER BY col.isbn
            "#
        ))
        .bind(DEFAULT_SUPPLIER_NAME)
        .bind(supplier_id.map(|id| id.as_i64()))
        .fetch_all(self.store.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PossibleSupplierOrderLine {
                    supplier_id: row
                        .try_get::<Option<i64>, _>("supplier_id")?
                        .map(SupplierId::new),
                    supplier_name: row.try_get("supplier_name")?,
                    isbn: row.try_get("isbn")?,
                    title: row.try_get("title")?,
                    authors: row.try_get("authors")?,
                    publisher: row.try_get("publisher")?,
                    price: row.try_get("price")?,
                    quantity: row.try_get("line_quantity")?,
                    line_price: row.try_get("line_price")?,
                })
            })
            .collect()
    }

    /// Places a supplier order.
    ///
    /// Every isbn must be routed to `supplier_id` (`None` for the general
    /// bucket). For each isbn the oldest unplaced customer order lines, up to
    /// the ordered quantity, are stamped as placed and linked to the new
    /// order. The order line keeps the full quantity even when fewer customer
    /// lines were waiting.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn create_supplier_order(
        &self,
        supplier_id: Option<SupplierId>,
        lines: &[BookQuantity],
    ) -> Result<SupplierOrderId> {
        if lines.is_empty() {
            return Err(OrderError::NoOrderLines);
        }
        for line in lines {
            line.validate()?;
        }
        let lines = merge_quantities(lines);

        let mut tx = self.store.begin().await?;
        for line in &lines {
            let actual = routed_supplier(&mut tx, &line.isbn).await?;
            if actual != supplier_id {
                return Err(OrderError::SupplierMismatch {
                    isbn: line.isbn.clone(),
                    expected: supplier_id,
                    actual,
                });
            }
        }
        let now = now_millis();

        let order_id = sqlx::query("INSERT INTO supplier_order (supplier_id, created) VALUES (?, ?)")
            .bind(supplier_id.map(|id| id.as_i64()))
            .bind(now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        let mut placed_total = 0;
        for line in &lines {
            let waiting: Vec<i64> = sqlx::query_scalar(
                "SELECT id FROM customer_order_lines WHERE isbn = ? AND placed IS NULL \
                 ORDER BY created ASC, id ASC LIMIT ?",
            )
            .bind(&line.isbn)
            .bind(line.quantity)
            .fetch_all(&mut *tx)
            .await?;

            if !waiting.is_empty() {
                let sql = format!(
                    "UPDATE customer_order_lines SET placed = ? WHERE id IN ({})",
                    placeholders(waiting.len())
                );
                let mut query = sqlx::query(&sql).bind(now);
                for id in &waiting {
                    query = query.bind(*id);
                }
                query.execute(&mut *tx).await?;

                for id in &waiting {
                    sqlx::query(
                        "INSERT INTO customer_order_line_supplier_order \
                         (customer_order_line_id, supplier_order_id, placed) VALUES (?, ?, ?)",
                    )
                    .bind(*id)
                    .bind(order_id)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            sqlx::query(
                "INSERT INTO supplier_order_line (supplier_order_id, isbn, quantity) VALUES (?, ?, ?)",
            )
            .bind(order_id)
            .bind(&line.isbn)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            placed_total += waiting.len();
        }

        tx.commit().await?;

        metrics::counter!("supplier_orders_placed_total").increment(1);
        metrics::counter!("customer_order_lines_placed_total").increment(placed_total as u64);
        tracing::info!(
            supplier_order_id = order_id,
            isbns = lines.len(),
            customer_lines = placed_total,
            "supplier order placed"
        );

        Ok(SupplierOrderId::new(order_id))
    }

    /// Lists placed supplier orders, newest first, optionally for one supplier.
    #[tracing::instrument(skip(self))]
    pub async fn placed_supplier_orders(
        &self,
        supplier_id: Option<SupplierId>,
    ) -> Result<Vec<PlacedSupplierOrder>> {
        let supplier_id = supplier_id.map(|id| id.as_i64());
        let rows = sqlx::query(
            r#"
            SELECT so.id, so.supplier_id, COALESCE(s.name, ?) AS supplier_name, so.created,
                   CAST(COALESCE(SUM(sol.quantity), 0) AS INTEGER) AS total_book_number,
                   CAST(COALESCE(SUM(sol.quantity * COALESCE(b.price, 0)), 0) AS REAL)
                       AS total_book_price
            FROM supplier_order so
            LEFT JOIN supplier s ON s.id = so.supplier_id
            LEFT JOIN supplier_order_line sol ON sol.supplier_order_id = so.id
            LEFT JOIN book b ON b.isbn = sol.isbn
            WHERE ? IS NULL OR so.supplier_id = ?
            GROUP BY so.id
            ORDER BY so.created DESC, so.id DESC
            "#,
        )
        .bind(DEFAULT_SUPPLIER_NAME)
        .bind(supplier_id)
        .bind(supplier_id)
        .fetch_all(self.store.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PlacedSupplierOrder {
                    id: SupplierOrderId::new(row.try_get("id")?),
                    supplier_id: row
                        .try_get::<Option<i64>, _>("supplier_id")?
                        .map(SupplierId::new),
                    supplier_name: row.try_get("supplier_name")?,
                    created: from_millis(row.try_get("created")?),
                    total_book_number: row.try_get("total_book_number")?,
                    total_book_price: row.try_get("total_book_price")?,
                })
            })
            .collect()
    }

    /// Lists the lines of the given supplier orders.
    #[tracing::instrument(skip(self))]
    pub async fn placed_supplier_order_lines(
        &self,
        order_ids: &[SupplierOrderId],
    ) -> Result<Vec<PlacedSupplierOrderLine>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT sol.supplier_order_id, so.supplier_id, COALESCE(s.name, ?) AS supplier_name,
                   sol.isbn, sol.quantity, so.created,
                   COALESCE(b.title, 'N/A') AS title, COALESCE(b.authors, 'N/A') AS authors,
                   CAST(COALESCE(b.price, 0) AS REAL) AS price,
                   CAST(sol.quantity * COALESCE(b.price, 0) AS REAL) AS line_price
            FROM supplier_order_line sol
            JOIN supplier_order so ON so.id = sol.supplier_order_id
            LEFT JOIN supplier s ON s.id = so.supplier_id
            LEFT JOIN book b ON b.isbn = sol.isbn
            WHERE sol.supplier_order_id IN ({})
            ORDER BY sol.supplier_order_id, sol.isbn
            "#,
            placeholders(order_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(DEFAULT_SUPPLIER_NAME);
        for id in order_ids {
            query = query.bind(id.as_i64());
        }
        let rows = query.fetch_all(self.store.pool()).await?;

        rows.iter()
            .map(|row| {
                Ok(PlacedSupplierOrderLine {
                    supplier_order_id: SupplierOrderId::new(row.try_get("supplier_order_id")?),
                    supplier_id: row
                        .try_get::<Option<i64>, _>("supplier_id")?
                        .map(SupplierId::new),
                    supplier_name: row.try_get("supplier_name")?,
                    isbn: row.try_get("isbn")?,
                    title: row.try_get("title")?,
                    authors: row.try_get("authors")?,
                    price: row.try_get("price")?,
                    quantity: row.try_get("quantity")?,
                    line_price: row.try_get("line_price")?,
                    created: from_millis(row.try_get("created")?),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> SupplierService {
        SupplierService::new(Store::in_memory().await.unwrap())
    }

    #[test]
    fn merges_duplicate_isbns() {
        let merged = merge_quantities(&[
            BookQuantity::new("222", 1),
            BookQuantity::new("111", 2),
            BookQuantity::new("222", 3),
        ]);
        assert_eq!(
            merged,
            vec![BookQuantity::new("111", 2), BookQuantity::new("222", 4)]
        );
    }

    #[test]
    fn book_quantity_validation() {
        assert!(BookQuantity::new("111", 1).validate().is_ok());
        assert!(matches!(
            BookQuantity::new("", 1).validate(),
            Err(OrderError::MissingIsbn)
        ));
        assert!(matches!(
            BookQuantity::new("111", 0).validate(),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[tokio::test]
    async fn new_supplier_needs_a_name() {
        let suppliers = service().await;
        let result = suppliers
            .upsert_supplier(SupplierId::new(1), SupplierUpdate::default())
            .await;
        assert!(matches!(result, Err(OrderError::MissingSupplierName(_))));
    }

    #[tokio::test]
    async fn upsert_merges_fields() {
        let suppliers = service().await;
        let id = SupplierId::new(1);
        suppliers
            .upsert_supplier(id, SupplierUpdate::named("Penguin").email("orders@penguin.test"))
            .await
            .unwrap();

        let supplier = suppliers
            .upsert_supplier(
                id,
                SupplierUpdate {
                    address: Some("1 Strand".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(supplier.name, "Penguin");
        assert_eq!(supplier.email.as_deref(), Some("orders@penguin.test"));
        assert_eq!(supplier.address.as_deref(), Some("1 Strand"));
    }

    #[tokio::test]
    async fn associating_a_publisher_steals_it() {
        let suppliers = service().await;
        let (first, second) = (SupplierId::new(1), SupplierId::new(2));
        suppliers.upsert_supplier(first, SupplierUpdate::named("A")).await.unwrap();
        suppliers.upsert_supplier(second, SupplierUpdate::named("B")).await.unwrap();

        suppliers.associate_publisher(first, "Penguin").await.unwrap();
        suppliers.associate_publisher(first, "Faber").await.unwrap();
        suppliers.associate_publisher(second, "Penguin").await.unwrap();

        assert_eq!(suppliers.publishers_for(first).await.unwrap(), vec!["Faber"]);
        assert_eq!(suppliers.publishers_for(second).await.unwrap(), vec!["Penguin"]);

        let listed = suppliers.list_suppliers().await.unwrap();
        assert_eq!(listed[0].publisher_count, 1);
        assert_eq!(listed[1].publisher_count, 1);

        suppliers.remove_publisher(second, "Penguin").await.unwrap();
        assert!(suppliers.publishers_for(second).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_supplier_order_is_rejected() {
        let suppliers = service().await;
        let result = suppliers.create_supplier_order(None, &[]).await;
        assert!(matches!(result, Err(OrderError::NoOrderLines)));
    }

    #[tokio::test]
    async fn no_lines_for_unknown_orders() {
        let suppliers = service().await;
        assert!(suppliers.placed_supplier_order_lines(&[]).await.unwrap().is_empty());
        assert!(
            suppliers
                .placed_supplier_order_lines(&[SupplierOrderId::new(9)])
                .await
                .unwrap()
                .is_empty()
        );
    }
}
