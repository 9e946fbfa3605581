//! Matching deliveries to placed supplier orders.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{
    CustomerOrderLineId, NoteId, ReconciliationOrderId, SupplierOrderId, from_millis, now_millis,
};
use domain::Volume;
use domain::note::{insert_reconciliation_note, next_note_id};
use domain::warehouse::ensure_warehouse;
use serde::Serialize;
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};
use store::{Store, placeholders};

use crate::config::ReconciliationConfig;
use crate::supplier::{BookQuantity, PlacedSupplierOrderLine, merge_quantities};
use crate::{OrderError, ReconciliationConflict, Result};

/// A delivery being matched against one or more supplier orders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationOrder {
    pub id: ReconciliationOrderId,
    pub supplier_order_ids: Vec<SupplierOrderId>,
    pub finalized: bool,
    pub created: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReconciliationOrder {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let ids: String = row.try_get("supplier_order_ids")?;
        Ok(Self {
            id: ReconciliationOrderId::new(row.try_get("id")?),
            supplier_order_ids: serde_json::from_str(&ids)?,
            finalized: row.try_get("finalized")?,
            created: from_millis(row.try_get("created")?),
            updated_at: from_millis(row.try_get("updated_at")?),
        })
    }
}

/// A scanned book in a reconciliation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationOrderLine {
    pub reconciliation_order_id: ReconciliationOrderId,
    pub isbn: String,
    pub quantity: i64,
    pub title: String,
    pub authors: String,
    pub publisher: String,
    pub price: f64,
}

/// A placed order line with the quantity that actually arrived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedOrderLine {
    #[serde(flatten)]
    pub line: PlacedSupplierOrderLine,
    pub ordered_quantity: i64,
    pub delivered_quantity: i64,
}

impl ProcessedOrderLine {
    pub fn is_underdelivered(&self) -> bool {
        self.delivered_quantity < self.ordered_quantity
    }

    pub fn is_overdelivered(&self) -> bool {
        self.delivered_quantity > self.ordered_quantity
    }
}

/// Outcome of matching scanned books to placed order lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub processed_lines: Vec<ProcessedOrderLine>,
    /// Scanned books that no placed line asked for.
    pub unmatched_books: Vec<BookQuantity>,
}

impl DeliveryReport {
    /// True when every line got exactly what was ordered and nothing extra arrived.
    pub fn is_exact(&self) -> bool {
        self.unmatched_books.is_empty()
            && self
                .processed_lines
                .iter()
                .all(|line| line.delivered_quantity == line.ordered_quantity)
    }
}

/// Matches scanned books against placed supplier order lines.
///
/// Scanned quantities are summed per isbn and handed out to the placed
/// lines for that isbn in order, each taking at most what it ordered; the
/// last line for an isbn takes whatever remains, so over-delivery shows up
/// there. Nothing is rejected: shortfalls and surpluses are only reported.
pub fn process_order_delivery(
    scanned: &[BookQuantity],
    placed: &[PlacedSupplierOrderLine],
) -> DeliveryReport {
    let mut remaining: BTreeMap<&str, i64> = BTreeMap::new();
    for book in scanned {
        *remaining.entry(book.isbn.as_str()).or_default() += book.quantity;
    }

    let mut lines_left: HashMap<&str, usize> = HashMap::new();
    for line in placed {
        *lines_left.entry(line.isbn.as_str()).or_default() += 1;
    }

    let mut processed_lines = Vec::with_capacity(placed.len());
    for line in placed {
        let isbn = line.isbn.as_str();
        let is_last = lines_left.get_mut(isbn).is_some_and(|left| {
            *left -= 1;
            *left == 0
        });

        let delivered_quantity = match remaining.get_mut(isbn) {
            Some(available) => {
                let taken = if is_last {
                    *available
                } else {
                    (*available).min(line.quantity)
                };
                *available -= taken;
                taken
            }
            None => 0,
        };

        processed_lines.push(ProcessedOrderLine {
            line: line.clone(),
            ordered_quantity: line.quantity,
            delivered_quantity,
        });
    }

    let unmatched_books = remaining
        .into_iter()
        .filter(|(isbn, _)| !lines_left.contains_key(isbn))
        .map(|(isbn, quantity)| BookQuantity::new(isbn, quantity))
        .collect();

    DeliveryReport {
        processed_lines,
        unmatched_books,
    }
}

/// What finalizing a reconciliation order changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finalization {
    pub reconciliation_order_id: ReconciliationOrderId,
    /// Customer order lines stamped as received.
    pub received_lines: Vec<CustomerOrderLineId>,
    /// The committed reconciliation note, if anything was delivered.
    pub note_id: Option<NoteId>,
}

async fn load_order(
    conn: &mut SqliteConnection,
    id: ReconciliationOrderId,
) -> Result<Option<ReconciliationOrder>> {
    let row = sqlx::query(
        "SELECT id, supplier_order_ids, finalized, created, updated_at \
         FROM reconciliation_order WHERE id = ?",
    )
    .bind(id.as_i64())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(ReconciliationOrder::from_row).transpose()
}

/// Loads an order that can still be edited.
async fn open_order(
    conn: &mut SqliteConnection,
    id: ReconciliationOrderId,
) -> Result<ReconciliationOrder> {
    let order = load_order(conn, id)
        .await?
        .ok_or(OrderError::ReconciliationOrderNotFound(id))?;
    if order.finalized {
        return Err(OrderError::ReconciliationOrderFinalized(id));
    }
    Ok(order)
}

async fn touch_order(conn: &mut SqliteConnection, id: ReconciliationOrderId, now: i64) -> Result<()> {
    sqlx::query("UPDATE reconciliation_order SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Service for reconciliation orders.
#[derive(Clone)]
pub struct ReconciliationService {
    store: Store,
    config: ReconciliationConfig,
}

impl ReconciliationService {
    pub fn new(store: Store, config: ReconciliationConfig) -> Self {
        Self { store, config }
    }

    /// Starts reconciling the given supplier orders.
    ///
    /// Every supplier order must exist and must not already belong to
    /// another reconciliation order.
    #[tracing::instrument(skip(self))]
    pub async fn create_reconciliation_order(
        &self,
        id: ReconciliationOrderId,
        supplier_order_ids: &[SupplierOrderId],
    ) -> Result<ReconciliationOrder> {
        if supplier_order_ids.is_empty() {
            return Err(OrderError::NoSupplierOrders);
        }
        let mut requested = supplier_order_ids.to_vec();
        requested.sort();
        requested.dedup();

        let mut tx = self.store.begin().await?;

        let sql = format!(
            "SELECT id FROM supplier_order WHERE id IN ({}) ORDER BY id",
            placeholders(requested.len())
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for id in &requested {
            query = query.bind(id.as_i64());
        }
        let found: Vec<SupplierOrderId> = query
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(SupplierOrderId::new)
            .collect();
        if found.len() != requested.len() {
            return Err(OrderError::SupplierOrdersNotFound {
                provided: requested,
                found,
            });
        }

        let existing = sqlx::query(
            "SELECT id, supplier_order_ids, finalized, created, updated_at \
             FROM reconciliation_order ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?;
        let mut conflicts = Vec::new();
        for row in &existing {
            let order = ReconciliationOrder::from_row(row)?;
            let overlap: Vec<_> = order
                .supplier_order_ids
                .into_iter()
                .filter(|id| requested.contains(id))
                .collect();
            if !overlap.is_empty() {
                conflicts.push(ReconciliationConflict {
                    reconciliation_order_id: order.id,
                    supplier_order_ids: overlap,
                });
            }
        }
        if !conflicts.is_empty() {
            return Err(OrderError::SupplierOrdersAlreadyReconciling { conflicts });
        }

        let now = now_millis();
        sqlx::query(
            "INSERT INTO reconciliation_order (id, supplier_order_ids, created, updated_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(id.as_i64())
        .bind(serde_json::to_string(&requested)?)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let order = load_order(&mut tx, id)
            .await?
            .ok_or(OrderError::ReconciliationOrderNotFound(id))?;
        tx.commit().await?;

        tracing::info!(
            reconciliation_order_id = %id,
            supplier_orders = requested.len(),
            "reconciliation order created"
        );
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_reconciliation_order(
        &self,
        id: ReconciliationOrderId,
    ) -> Result<Option<ReconciliationOrder>> {
        let mut conn = self.store.acquire().await?;
        load_order(&mut conn, id).await
    }

    /// Lists reconciliation orders, most recently updated first.
    #[tracing::instrument(skip(self))]
    pub async fn list_reconciliation_orders(
        &self,
        finalized: Option<bool>,
    ) -> Result<Vec<ReconciliationOrder>> {
        let rows = sqlx::query(
            "SELECT id, supplier_order_ids, finalized, created, updated_at FROM reconciliation_order \
             WHERE ? IS NULL OR finalized = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(finalized)
        .bind(finalized)
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(ReconciliationOrder::from_row).collect()
    }

    /// Adds scanned books. Quantities for the same isbn accumulate.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn add_order_lines(
        &self,
        id: ReconciliationOrderId,
        lines: &[BookQuantity],
    ) -> Result<()> {
        for line in lines {
            line.validate()?;
        }

        let mut tx = self.store.begin().await?;
        open_order(&mut tx, id).await?;
        if lines.is_empty() {
            return Ok(());
        }

        for line in merge_quantities(lines) {
            sqlx::query(
                "INSERT INTO reconciliation_order_lines (reconciliation_order_id, isbn, quantity) \
                 VALUES (?, ?, ?) ON CONFLICT(reconciliation_order_id, isbn) \
                 DO UPDATE SET quantity = quantity + excluded.quantity",
            )
            .bind(id.as_i64())
            .bind(&line.isbn)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        touch_order(&mut tx, id, now_millis()).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_order_line(&self, id: ReconciliationOrderId, isbn: &str) -> Result<()> {
        let mut tx = self.store.begin().await?;
        open_order(&mut tx, id).await?;

        sqlx::query(
            "DELETE FROM reconciliation_order_lines WHERE reconciliation_order_id = ? AND isbn = ?",
        )
        .bind(id.as_i64())
        .bind(isbn)
        .execute(&mut *tx)
        .await?;

        touch_order(&mut tx, id, now_millis()).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Lists scanned books with catalog details, by isbn.
    #[tracing::instrument(skip(self))]
    pub async fn reconciliation_order_lines(
        &self,
        id: ReconciliationOrderId,
    ) -> Result<Vec<ReconciliationOrderLine>> {
        let mut conn = self.store.acquire().await?;
        if load_order(&mut conn, id).await?.is_none() {
            return Err(OrderError::ReconciliationOrderNotFound(id));
        }

        let rows = sqlx::query(
            r#"
            SELECT rol.reconciliation_order_id, rol.isbn, rol.quantity,
                   COALESCE(b.title, 'N/A') AS title, COALESCE(b.authors, 'N/A') AS authors,
                   COALESCE(b.publisher, 'N/A') AS publisher,
                   CAST(COALESCE(b.price, 0) AS REAL) AS price
            FROM reconciliation_order_lines rol
            LEFT JOIN book b ON b.isbn = rol.isbn
            WHERE rol.reconciliation_order_id = ?
            ORDER BY rol.isbn
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ReconciliationOrderLine {
                    reconciliation_order_id: ReconciliationOrderId::new(
                        row.try_get("reconciliation_order_id")?,
                    ),
                    isbn: row.try_get("isbn")?,
                    quantity: row.try_get("quantity")?,
                    title: row.try_get("title")?,
                    authors: row.try_get("authors")?,
                    publisher: row.try_get("publisher")?,
                    price: row.try_get("price")?,
                })
            })
            .collect()
    }

    /// Deletes an unfinalized reconciliation order and its lines.
    #[tracing::instrument(skip(self))]
    pub async fn delete_reconciliation_order(&self, id: ReconciliationOrderId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        open_order(&mut tx, id).await?;

        sqlx::query("DELETE FROM reconciliation_order_lines WHERE reconciliation_order_id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM reconciliation_order WHERE id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(reconciliation_order_id = %id, "reconciliation order deleted");
        Ok(())
    }

    /// Finalizes a reconciliation order.
    ///
    /// For every scanned isbn the oldest placed but unreceived customer order
    /// line is marked as received, and the scanned quantities are booked into
    /// the delivery warehouse as a committed reconciliation note. Finalizing
    /// twice is an error, and so is finalizing a delivery without a
    /// configured delivery warehouse.
    #[tracing::instrument(skip(self))]
    pub async fn finalize_reconciliation_order(
        &self,
        id: ReconciliationOrderId,
    ) -> Result<Finalization> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;
        let order = open_order(&mut tx, id).await?;
        let now = now_millis();

        let rows = sqlx::query(
            "SELECT isbn, quantity FROM reconciliation_order_lines \
             WHERE reconciliation_order_id = ? ORDER BY isbn",
        )
        .bind(id.as_i64())
        .fetch_all(&mut *tx)
        .await?;
        let delivered = rows
            .iter()
            .map(|row| {
                Ok(BookQuantity::new(
                    row.try_get::<String, _>("isbn")?,
                    row.try_get::<i64, _>("quantity")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let delivery_warehouse = match self.config.delivery_warehouse {
            Some(warehouse_id) => Some(warehouse_id),
            None if delivered.is_empty() => None,
            None => return Err(OrderError::MissingDeliveryWarehouse(id)),
        };

        // TODO: advance one line per delivered copy instead of one per isbn.
        let mut received_lines = Vec::new();
        for book in &delivered {
            let oldest: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM customer_order_lines \
                 WHERE isbn = ? AND placed IS NOT NULL AND received IS NULL \
                 ORDER BY created ASC, id ASC LIMIT 1",
            )
            .bind(&book.isbn)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(line_id) = oldest {
                sqlx::query("UPDATE customer_order_lines SET received = ? WHERE id = ?")
                    .bind(now)
                    .bind(line_id)
                    .execute(&mut *tx)
                    .await?;
                received_lines.push(CustomerOrderLineId::new(line_id));
            }
        }

        warn_on_overdelivery(&mut tx, &order, &delivered).await?;

        let note_id = match delivery_warehouse {
            Some(warehouse_id) if !delivered.is_empty() => {
                let volumes: Vec<Volume> = delivered
                    .iter()
                    .map(|book| {
                        Volume::new(book.isbn.clone(), book.quantity).in_warehouse(warehouse_id)
                    })
                    .collect();
                ensure_warehouse(&mut tx, warehouse_id).await?;
                let note_id = next_note_id(&mut tx).await?;
                insert_reconciliation_note(&mut tx, note_id, Some(id), &volumes).await?;
                Some(note_id)
            }
            _ => {
                tracing::debug!(reconciliation_order_id = %id, "nothing delivered, no note written");
                None
            }
        };

        sqlx::query(
            "UPDATE reconciliation_order SET finalized = 1, updated_at = ? WHERE id = ? AND finalized = 0",
        )
        .bind(now)
        .bind(id.as_i64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        metrics::counter!("reconciliation_orders_finalized_total").increment(1);
        metrics::counter!("customer_order_lines_received_total")
            .increment(received_lines.len() as u64);
        metrics::histogram!("reconciliation_finalize_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(
            reconciliation_order_id = %id,
            received = received_lines.len(),
            "reconciliation order finalized"
        );

        Ok(Finalization {
            reconciliation_order_id: id,
            received_lines,
            note_id,
        })
    }
}

/// Logs isbns that arrived in greater numbers than the supplier orders asked for.
async fn warn_on_overdelivery(
    conn: &mut SqliteConnection,
    order: &ReconciliationOrder,
    delivered: &[BookQuantity],
) -> Result<()> {
    if order.supplier_order_ids.is_empty() || delivered.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "SELECT isbn, CAST(SUM(quantity) AS INTEGER) AS ordered FROM supplier_order_line \
         WHERE supplier_order_id IN ({}) GROUP BY isbn",
        placeholders(order.supplier_order_ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in &order.supplier_order_ids {
        query = query.bind(id.as_i64());
    }
    let ordered: HashMap<String, i64> = query
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(|row| Ok((row.try_get::<String, _>("isbn")?, row.try_get::<i64, _>("ordered")?)))
        .collect::<Result<_>>()?;

    let mut seen = HashSet::new();
    for book in delivered {
        if !seen.insert(book.isbn.as_str()) {
            continue;
        }
        let ordered = ordered.get(&book.isbn).copied().unwrap_or(0);
        if book.quantity > ordered {
            tracing::warn!(
                reconciliation_order_id = %order.id,
                isbn = %book.isbn,
                ordered,
                delivered = book.quantity,
                "more books delivered than ordered"
            );
        }
    }
    Ok(())
}
