//! Customers and their order lines.

use chrono::{DateTime, Utc};
use common::{CustomerId, CustomerOrderLineId, SupplierId, SupplierOrderId, from_millis, now_millis};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};
use store::{Store, placeholders};

use crate::status::OrderLineStatus;
use crate::supplier::DEFAULT_SUPPLIER_NAME;
use crate::{OrderError, Result};

/// Display ids at or above this value are ignored when allocating the next one.
const DISPLAY_ID_CEILING: i64 = 10_000;

const ORDER_LINE_COLUMNS: &str = "col.id, col.customer_id, col.isbn, col.created, col.placed, \
     col.received, col.collected, COALESCE(b.title, 'N/A') AS title, \
     COALESCE(b.authors, 'N/A') AS authors, CAST(COALESCE(b.price, 0) AS REAL) AS price";

/// A customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub display_id: String,
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub deposit: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: CustomerId::new(row.try_get("id")?),
            display_id: row.try_get("display_id")?,
            fullname: row.try_get("fullname")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            deposit: row.try_get("deposit")?,
            updated_at: from_millis(row.try_get("updated_at")?),
        })
    }
}

/// Customer fields to write. Optional fields left as `None` keep the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerUpsert {
    pub display_id: String,
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub deposit: Option<f64>,
}

impl CustomerUpsert {
    pub fn new(display_id: impl Into<String>) -> Self {
        Self {
            display_id: display_id.into(),
            ..Default::default()
        }
    }

    pub fn fullname(mut self, fullname: impl Into<String>) -> Self {
        self.fullname = Some(fullname.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// One book requested by one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerOrderLine {
    pub id: CustomerOrderLineId,
    pub customer_id: CustomerId,
    pub isbn: String,
    pub title: String,
    pub authors: String,
    pub price: f64,
    pub created: DateTime<Utc>,
    pub placed: Option<DateTime<Utc>>,
    pub received: Option<DateTime<Utc>>,
    pub collected: Option<DateTime<Utc>>,
    pub status: OrderLineStatus,
}

impl CustomerOrderLine {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let placed = row.try_get::<Option<i64>, _>("placed")?.map(from_millis);
        let received = row.try_get::<Option<i64>, _>("received")?.map(from_millis);
        let collected = row.try_get::<Option<i64>, _>("collected")?.map(from_millis);

        Ok(Self {
            id: CustomerOrderLineId::new(row.try_get("id")?),
            customer_id: CustomerId::new(row.try_get("customer_id")?),
            isbn: row.try_get("isbn")?,
            title: row.try_get("title")?,
            authors: row.try_get("authors")?,
            price: row.try_get("price")?,
            created: from_millis(row.try_get("created")?),
            placed,
            received,
            collected,
            status: OrderLineStatus::derive(placed, received, collected),
        })
    }
}

/// A supplier order that a customer order line was placed in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLinePlacement {
    pub supplier_order_id: SupplierOrderId,
    pub supplier_id: Option<SupplierId>,
    pub supplier_name: String,
    pub placed: DateTime<Utc>,
}

async fn customer_exists(conn: &mut SqliteConnection, id: CustomerId) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM customer WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

async fn touch_customer(conn: &mut SqliteConnection, id: CustomerId, now: i64) -> Result<()> {
    sqlx::query("UPDATE customer SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Service for customers and their order lines.
#[derive(Clone)]
pub struct CustomerService {
    store: Store,
}

impl CustomerService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates a customer or merges the provided fields into an existing one.
    ///
    /// The display id is required and must not belong to another customer.
    #[tracing::instrument(skip(self, customer), fields(display_id = %customer.display_id))]
    pub async fn upsert_customer(&self, id: CustomerId, customer: CustomerUpsert) -> Result<Customer> {
        let display_id = customer.display_id.trim();
        if display_id.is_empty() {
            return Err(OrderError::MissingCustomerDisplayId);
        }

        let mut tx = self.store.begin().await?;

        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM customer WHERE display_id = ? AND id != ?")
                .bind(display_id)
                .bind(id.as_i64())
                .fetch_one(&mut *tx)
                .await?;
        if taken > 0 {
            return Err(OrderError::DisplayIdTaken(display_id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO customer (id, display_id, fullname, email, phone, deposit, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                display_id = excluded.display_id,
                fullname = COALESCE(excluded.fullname, fullname),
                email = COALESCE(excluded.email, email),
                phone = COALESCE(excluded.phone, phone),
                deposit = COALESCE(excluded.deposit, deposit),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id.as_i64())
        .bind(display_id)
        .bind(customer.fullname.as_deref())
        .bind(customer.email.as_deref())
        .bind(customer.phone.as_deref())
        .bind(customer.deposit)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(customer_id = %id, "customer saved");

        self.get_customer(id)
            .await?
            .ok_or(OrderError::CustomerNotFound(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            "SELECT id, display_id, fullname, email, phone, CAST(deposit AS REAL) AS deposit, \
             updated_at FROM customer WHERE id = ?",
        )
        .bind(id.as_i64())
        .fetch_optional(self.store.pool())
        .await?;

        row.as_ref().map(Customer::from_row).transpose()
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(
            "SELECT id, display_id, fullname, email, phone, CAST(deposit AS REAL) AS deposit, \
             updated_at FROM customer ORDER BY id",
        )
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(Customer::from_row).collect()
    }

    /// Returns the display id following the highest numeric one in use.
    ///
    /// Non-numeric display ids and those at or above 10000 are ignored.
    #[tracing::instrument(skip(self))]
    pub async fn next_display_id(&self) -> Result<String> {
        let next: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(CAST(display_id AS INTEGER)) + 1, 1)
            FROM customer
            WHERE display_id GLOB '[0-9]*' AND CAST(display_id AS INTEGER) < ?
            "#,
        )
        .bind(DISPLAY_ID_CEILING)
        .fetch_one(self.store.pool())
        .await?;

        Ok(next.to_string())
    }

    /// Creates one pending order line per isbn and touches the customer.
    #[tracing::instrument(skip(self, isbns), fields(books = isbns.len()))]
    pub async fn add_books_to_customer(
        &self,
        customer_id: CustomerId,
        isbns: &[String],
    ) -> Result<Vec<CustomerOrderLineId>> {
        if isbns.is_empty() {
            return Err(OrderError::NoBooksProvided);
        }
        if isbns.iter().any(|isbn| isbn.trim().is_empty()) {
            return Err(OrderError::MissingIsbn);
        }

        let mut tx = self.store.begin().await?;
        if !customer_exists(&mut tx, customer_id).await? {
            return Err(OrderError::CustomerNotFound(customer_id));
        }

        let now = now_millis();
        let mut ids = Vec::with_capacity(isbns.len());
        for isbn in isbns {
            let inserted = sqlx::query(
                "INSERT INTO customer_order_lines (customer_id, isbn, created) VALUES (?, ?, ?)",
            )
            .bind(customer_id.as_i64())
            .bind(isbn.trim())
            .bind(now)
            .execute(&mut *tx)
            .await?;
            ids.push(CustomerOrderLineId::new(inserted.last_insert_rowid()));
        }

        touch_customer(&mut tx, customer_id, now).await?;
        tx.commit().await?;

        tracing::info!(customer_id = %customer_id, lines = ids.len(), "books added to customer");
        Ok(ids)
    }

    /// Deletes order lines belonging to the customer.
    #[tracing::instrument(skip(self))]
    pub async fn remove_books_from_customer(
        &self,
        customer_id: CustomerId,
        line_ids: &[CustomerOrderLineId],
    ) -> Result<()> {
        if line_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.store.begin().await?;
        if !customer_exists(&mut tx, customer_id).await? {
            return Err(OrderError::CustomerNotFound(customer_id));
        }

        let sql = format!(
            "DELETE FROM customer_order_lines WHERE customer_id = ? AND id IN ({})",
            placeholders(line_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(customer_id.as_i64());
        for id in line_ids {
            query = query.bind(id.as_i64());
        }
        query.execute(&mut *tx).await?;

        touch_customer(&mut tx, customer_id, now_millis()).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Lists a customer's order lines with book details, by isbn.
    #[tracing::instrument(skip(self))]
    pub async fn customer_order_lines(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<CustomerOrderLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM customer_order_lines col \
             LEFT JOIN book b ON b.isbn = col.isbn \
             WHERE col.customer_id = ? ORDER BY col.isbn, col.id"
        ))
        .bind(customer_id.as_i64())
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(CustomerOrderLine::from_row).collect()
    }

    /// Lists every customer order line, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn all_customer_order_lines(&self) -> Result<Vec<CustomerOrderLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM customer_order_lines col \
             LEFT JOIN book b ON b.isbn = col.isbn ORDER BY col.created, col.id"
        ))
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(CustomerOrderLine::from_row).collect()
    }

    /// Marks received lines as collected and returns how many changed.
    ///
    /// Lines that are not yet received, or already collected, are left alone.
    #[tracing::instrument(skip(self))]
    pub async fn mark_collected(&self, line_ids: &[CustomerOrderLineId]) -> Result<u64> {
        if line_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE customer_order_lines SET collected = ? \
             WHERE id IN ({}) AND placed IS NOT NULL AND received IS NOT NULL AND collected IS NULL",
            placeholders(line_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(now_millis());
        for id in line_ids {
            query = query.bind(id.as_i64());
        }
        let updated = query.execute(self.store.pool()).await?.rows_affected();

        if updated < line_ids.len() as u64 {
            tracing::debug!(
                requested = line_ids.len(),
                updated,
                "some lines were not ready for collection"
            );
        }
        Ok(updated)
    }

    /// Lists the supplier orders an order line was placed in, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn order_line_history(
        &self,
        line_id: CustomerOrderLineId,
    ) -> Result<Vec<OrderLinePlacement>> {
        let rows = sqlx::query(
            r#"
            SELECT link.supplier_order_id, so.supplier_id,
                   COALESCE(s.name, ?) AS supplier_name, link.placed
            FROM customer_order_line_supplier_order link
            JOIN supplier_order so ON so.id = link.supplier_order_id
            LEFT JOIN supplier s ON s.id = so.supplier_id
            WHERE link.customer_order_line_id = ?
            ORDER BY link.placed, link.supplier_order_id
            "#,
        )
        .bind(DEFAULT_SUPPLIER_NAME)
        .bind(line_id.as_i64())
        .fetch_all(self.store.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderLinePlacement {
                    supplier_order_id: SupplierOrderId::new(row.try_get("supplier_order_id")?),
                    supplier_id: row
                        .try_get::<Option<i64>, _>("supplier_id")?
                        .map(SupplierId::new),
                    supplier_name: row.try_get("supplier_name")?,
                    placed: from_millis(row.try_get("placed")?),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> CustomerService {
        CustomerService::new(Store::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn upsert_merges_fields() {
        let customers = service().await;
        let id = CustomerId::new(1);

        customers
            .upsert_customer(id, CustomerUpsert::new("1").fullname("Ada").email("ada@example.com"))
            .await
            .unwrap();
        let customer = customers
            .upsert_customer(id, CustomerUpsert::new("1").email("ada@lovelace.org"))
            .await
            .unwrap();

        assert_eq!(customer.fullname.as_deref(), Some("Ada"));
        assert_eq!(customer.email.as_deref(), Some("ada@lovelace.org"));
    }

    #[tokio::test]
    async fn display_id_is_required() {
        let customers = service().await;
        let result = customers
            .upsert_customer(CustomerId::new(1), CustomerUpsert::new("  "))
            .await;
        assert!(matches!(result, Err(OrderError::MissingCustomerDisplayId)));
    }

    #[tokio::test]
    async fn display_id_must_be_unique() {
        let customers = service().await;
        customers
            .upsert_customer(CustomerId::new(1), CustomerUpsert::new("7"))
            .await
            .unwrap();

        let result = customers
            .upsert_customer(CustomerId::new(2), CustomerUpsert::new("7"))
            .await;
        assert!(matches!(result, Err(OrderError::DisplayIdTaken(ref id)) if id == "7"));

        // Re-saving the owner with its own display id is fine.
        customers
            .upsert_customer(CustomerId::new(1), CustomerUpsert::new("7"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn next_display_id_skips_garbage() {
        let customers = service().await;
        assert_eq!(customers.next_display_id().await.unwrap(), "1");

        for (id, display_id) in [(1, "3"), (2, "12000"), (3, "abc"), (4, "9")] {
            customers
                .upsert_customer(CustomerId::new(id), CustomerUpsert::new(display_id))
                .await
                .unwrap();
        }

        assert_eq!(customers.next_display_id().await.unwrap(), "10");
    }

    #[tokio::test]
    async fn adding_books_requires_books_and_customer() {
        let customers = service().await;

        let empty = customers.add_books_to_customer(CustomerId::new(1), &[]).await;
        assert!(matches!(empty, Err(OrderError::NoBooksProvided)));

        let missing = customers
            .add_books_to_customer(CustomerId::new(1), &["111".to_string()])
            .await;
        assert!(matches!(missing, Err(OrderError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn new_lines_are_pending() {
        let customers = service().await;
        let id = CustomerId::new(1);
        customers
            .upsert_customer(id, CustomerUpsert::new("1"))
            .await
            .unwrap();

        let ids = customers
            .add_books_to_customer(id, &["222".to_string(), "111".to_string()])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let lines = customers.customer_order_lines(id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].isbn, "111");
        assert_eq!(lines[0].title, "N/A");
        assert!(lines.iter().all(|l| l.status == OrderLineStatus::Pending));
    }

    #[tokio::test]
    async fn pending_lines_cannot_be_collected() {
        let customers = service().await;
        let id = CustomerId::new(1);
        customers
            .upsert_customer(id, CustomerUpsert::new("1"))
            .await
            .unwrap();
        let ids = customers
            .add_books_to_customer(id, &["111".to_string()])
            .await
            .unwrap();

        assert_eq!(customers.mark_collected(&ids).await.unwrap(), 0);
        let lines = customers.customer_order_lines(id).await.unwrap();
        assert_eq!(lines[0].collected, None);
    }

    #[tokio::test]
    async fn removes_only_own_lines() {
        let customers = service().await;
        for id in [1, 2] {
            customers
                .upsert_customer(CustomerId::new(id), CustomerUpsert::new(id.to_string()))
                .await
                .unwrap();
        }
        let first = customers
            .add_books_to_customer(CustomerId::new(1), &["111".to_string()])
            .await
            .unwrap();
        let second = customers
            .add_books_to_customer(CustomerId::new(2), &["111".to_string()])
            .await
            .unwrap();

        customers
            .remove_books_from_customer(CustomerId::new(1), &[first[0], second[0]])
            .await
            .unwrap();

        assert!(customers.customer_order_lines(CustomerId::new(1)).await.unwrap().is_empty());
        assert_eq!(customers.customer_order_lines(CustomerId::new(2)).await.unwrap().len(), 1);
    }
}
