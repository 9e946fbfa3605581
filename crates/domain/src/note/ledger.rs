//! Note ledger: the append-only source of stock.

use chrono::SecondsFormat;
use common::{NoteId, ReconciliationOrderId, WarehouseId, from_millis, now_millis};
use projections::StockFilter;
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};
use store::Store;

use super::validation::{PendingLine, collect_violations};
use super::{
    CustomItem, Note, NoteEntry, NoteKind, NoteLine, NoteState, NoteSummary, NoteUpdate, Receipt,
    ReceiptItem, TransactionUpdate, Volume,
};
use crate::sequence::{self, NOTE_BASE_NAME};
use crate::warehouse::ensure_warehouse;
use crate::{DomainError, Result};

const INBOUND_NOTE_NAMES: &str = "SELECT display_name FROM note \
     WHERE warehouse_id IS NOT NULL AND is_reconciliation_note = 0 \
     AND (display_name = ? OR display_name LIKE ?)";

const OUTBOUND_NOTE_NAMES: &str = "SELECT display_name FROM note \
     WHERE warehouse_id IS NULL AND is_reconciliation_note = 0 \
     AND (display_name = ? OR display_name LIKE ?)";

const NOTE_COLUMNS: &str = "n.id, n.display_name, n.warehouse_id, w.display_name AS warehouse_name, \
     n.default_warehouse, n.is_reconciliation_note, n.reconciliation_order_id, n.committed, \
     n.committed_at, n.updated_at";

/// The columns every mutator needs before touching a note.
#[derive(Debug, Clone, Copy)]
struct NoteHeader {
    warehouse_id: Option<WarehouseId>,
    kind: NoteKind,
    state: NoteState,
}

impl NoteHeader {
    /// Warehouse used for book lines that do not name one.
    fn line_warehouse(&self, requested: Option<WarehouseId>) -> Option<WarehouseId> {
        match self.kind {
            NoteKind::Inbound => requested.or(self.warehouse_id),
            NoteKind::Outbound | NoteKind::Reconciliation => requested,
        }
    }
}

async fn note_header(conn: &mut SqliteConnection, id: NoteId) -> Result<Option<NoteHeader>> {
    let row = sqlx::query(
        "SELECT warehouse_id, is_reconciliation_note, committed FROM note WHERE id = ?",
    )
    .bind(id.as_i64())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| {
        let warehouse_id = row
            .try_get::<Option<i64>, _>("warehouse_id")?
            .map(WarehouseId::new);
        let is_reconciliation: bool = row.try_get("is_reconciliation_note")?;
        let committed: bool = row.try_get("committed")?;
        Ok(NoteHeader {
            warehouse_id,
            kind: NoteKind::classify(warehouse_id, is_reconciliation),
            state: NoteState::from_committed(committed),
        })
    })
    .transpose()
}

/// Loads the header of a draft note.
///
/// Returns `None` (after logging) when the note is committed, so replayed
/// mutations become no-ops.
async fn draft_header(
    conn: &mut SqliteConnection,
    id: NoteId,
    action: &'static str,
) -> Result<Option<NoteHeader>> {
    let header = note_header(conn, id)
        .await?
        .ok_or(DomainError::NoteNotFound(id))?;

    if !header.state.can_modify() {
        tracing::warn!(note_id = %id, action, "note is committed, ignoring");
        return Ok(None);
    }
    Ok(Some(header))
}

async fn touch_note(conn: &mut SqliteConnection, id: NoteId, now: i64) -> Result<()> {
    sqlx::query("UPDATE note SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Adds `quantity` to the (isbn, warehouse) line of a note, creating it if needed.
async fn add_to_book_line(
    conn: &mut SqliteConnection,
    id: NoteId,
    isbn: &str,
    warehouse_id: Option<WarehouseId>,
    quantity: i64,
    updated_at: i64,
) -> Result<()> {
    let warehouse_id = warehouse_id.map(|wh| wh.as_i64());

    // NULL warehouses never collide in the primary key, so merge by hand.
    let merged = sqlx::query(
        "UPDATE book_transaction SET quantity = quantity + ?, updated_at = ? \
         WHERE note_id = ? AND isbn = ? AND warehouse_id IS ?",
    )
    .bind(quantity)
    .bind(updated_at)
    .bind(id.as_i64())
    .bind(isbn)
    .bind(warehouse_id)
    .execute(&mut *conn)
    .await?;

    if merged.rows_affected() == 0 {
        sqlx::query(
            "INSERT INTO book_transaction (note_id, isbn, warehouse_id, quantity, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.as_i64())
        .bind(isbn)
        .bind(warehouse_id)
        .bind(quantity)
        .bind(updated_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Returns an id one above the highest note id in use.
pub async fn next_note_id(conn: &mut SqliteConnection) -> Result<NoteId> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM note")
        .fetch_one(&mut *conn)
        .await?;
    Ok(NoteId::new(max.unwrap_or(0) + 1))
}

/// Writes a committed reconciliation note on an open transaction.
///
/// Volumes for the same (isbn, warehouse) are summed into one line.
pub async fn insert_reconciliation_note(
    conn: &mut SqliteConnection,
    id: NoteId,
    reconciliation_order_id: Option<ReconciliationOrderId>,
    volumes: &[Volume],
) -> Result<()> {
    for volume in volumes {
        volume.validate()?;
    }

    let now = now_millis();
    let display_name = format!(
        "Reconciliation note: {}",
        from_millis(now).to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    sqlx::query(
        "INSERT INTO note (id, display_name, is_reconciliation_note, reconciliation_order_id, \
         committed, committed_at, updated_at) VALUES (?, ?, 1, ?, 1, ?, ?)",
    )
    .bind(id.as_i64())
    .bind(&display_name)
    .bind(reconciliation_order_id.map(|r| r.as_i64()))
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    for volume in volumes {
        add_to_book_line(conn, id, &volume.isbn, volume.warehouse_id, volume.quantity, now).await?;
    }

    sqlx::query("UPDATE book_transaction SET committed_at = ? WHERE note_id = ?")
        .bind(now)
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;

    metrics::counter!("notes_committed_total").increment(1);
    tracing::info!(note_id = %id, lines = volumes.len(), "reconciliation note committed");
    Ok(())
}

fn note_from_row(row: &SqliteRow) -> Result<Note> {
    let warehouse_id = row
        .try_get::<Option<i64>, _>("warehouse_id")?
        .map(WarehouseId::new);
    let is_reconciliation: bool = row.try_get("is_reconciliation_note")?;
    let committed: bool = row.try_get("committed")?;

    Ok(Note {
        id: NoteId::new(row.try_get("id")?),
        display_name: row
            .try_get::<Option<String>, _>("display_name")?
            .unwrap_or_default(),
        kind: NoteKind::classify(warehouse_id, is_reconciliation),
        state: NoteState::from_committed(committed),
        warehouse_id,
        warehouse_name: row.try_get("warehouse_name")?,
        default_warehouse: row
            .try_get::<Option<i64>, _>("default_warehouse")?
            .map(WarehouseId::new),
        reconciliation_order_id: row
            .try_get::<Option<i64>, _>("reconciliation_order_id")?
            .map(ReconciliationOrderId::new),
        committed_at: row.try_get::<Option<i64>, _>("committed_at")?.map(from_millis),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<NoteSummary> {
    Ok(NoteSummary {
        id: NoteId::new(row.try_get("id")?),
        display_name: row
            .try_get::<Option<String>, _>("display_name")?
            .unwrap_or_default(),
        warehouse_id: row
            .try_get::<Option<i64>, _>("warehouse_id")?
            .map(WarehouseId::new),
        warehouse_name: row.try_get("warehouse_name")?,
        total_books: row.try_get("total_books")?,
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

/// Service for creating, editing and committing notes.
///
/// Every mutator first checks whether the note is committed. Committed
/// notes are never changed: the call logs a warning and succeeds.
#[derive(Clone)]
pub struct NoteLedger {
    store: Store,
}

impl NoteLedger {
    /// Creates a ledger over the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates an inbound note if `warehouse_id` is given, else an outbound one.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, id: NoteId, warehouse_id: Option<WarehouseId>) -> Result<Note> {
        let mut tx = self.store.begin().await?;

        let names = match warehouse_id {
            Some(wh) => {
                ensure_warehouse(&mut tx, wh).await?;
                INBOUND_NOTE_NAMES
            }
            None => OUTBOUND_NOTE_NAMES,
        };
        let display_name = sequence::next_name(&mut tx, names, NOTE_BASE_NAME).await?;

        sqlx::query(
            "INSERT INTO note (id, display_name, warehouse_id, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.as_i64())
        .bind(&display_name)
        .bind(warehouse_id.map(|wh| wh.as_i64()))
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(note_id = %id, %display_name, "note created");

        self.get_note(id).await?.ok_or(DomainError::NoteNotFound(id))
    }

    /// Creates a draft note that adds stock to `warehouse_id`.
    pub async fn create_inbound_note(&self, id: NoteId, warehouse_id: WarehouseId) -> Result<Note> {
        self.create(id, Some(warehouse_id)).await
    }

    /// Creates a draft note that removes stock.
    pub async fn create_outbound_note(&self, id: NoteId) -> Result<Note> {
        self.create(id, None).await
    }

    /// Creates and commits a reconciliation note in one transaction.
    #[tracing::instrument(skip(self, volumes), fields(lines = volumes.len()))]
    pub async fn create_reconciliation_note(
        &self,
        id: NoteId,
        reconciliation_order_id: Option<ReconciliationOrderId>,
        volumes: &[Volume],
    ) -> Result<Note> {
        let mut tx = self.store.begin().await?;
        insert_reconciliation_note(&mut tx, id, reconciliation_order_id, volumes).await?;
        tx.commit().await?;

        self.get_note(id).await?.ok_or(DomainError::NoteNotFound(id))
    }

    /// Gets a note header by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM note n LEFT JOIN warehouse w ON w.id = n.warehouse_id \
             WHERE n.id = ?"
        ))
        .bind(id.as_i64())
        .fetch_optional(self.store.pool())
        .await?;

        row.as_ref().map(note_from_row).transpose()
    }

    /// Lists uncommitted inbound notes, most recently updated first.
    #[tracing::instrument(skip(self))]
    pub async fn list_inbound_drafts(&self) -> Result<Vec<NoteSummary>> {
        self.list_drafts("n.warehouse_id IS NOT NULL").await
    }

    /// Lists uncommitted outbound notes, most recently updated first.
    #[tracing::instrument(skip(self))]
    pub async fn list_outbound_drafts(&self) -> Result<Vec<NoteSummary>> {
        self.list_drafts("n.warehouse_id IS NULL").await
    }

    async fn list_drafts(&self, kind_clause: &str) -> Result<Vec<NoteSummary>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT n.id, n.display_name, n.warehouse_id, w.display_name AS warehouse_name,
                   n.updated_at, CAST(COALESCE(SUM(bt.quantity), 0) AS INTEGER) AS total_books
            FROM note n
            LEFT JOIN warehouse w ON w.id = n.warehouse_id
            LEFT JOIN book_transaction bt ON bt.note_id = n.id
            WHERE n.committed = 0 AND n.is_reconciliation_note = 0 AND {kind_clause}
            GROUP BY n.id
            ORDER BY n.updated_at DESC, n.id DESC
            "#
        ))
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(summary_from_row).collect()
    }

    /// Returns an id one above the highest note id in use.
    #[tracing::instrument(skip(self))]
    pub async fn next_note_id(&self) -> Result<NoteId> {
        let mut conn = self.store.acquire().await?;
        next_note_id(&mut conn).await
    }

    /// Changes the display name or default warehouse of a draft note.
    #[tracing::instrument(skip(self))]
    pub async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if draft_header(&mut tx, id, "update").await?.is_none() || update.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "UPDATE note SET display_name = COALESCE(?, display_name), \
             default_warehouse = COALESCE(?, default_warehouse), updated_at = ? WHERE id = ?",
        )
        .bind(update.display_name.as_deref())
        .bind(update.default_warehouse.map(|wh| wh.as_i64()))
        .bind(now_millis())
        .bind(id.as_i64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Adds lines to a draft note.
    ///
    /// Book lines merge additively per (isbn, warehouse); an inbound note's
    /// line without a warehouse goes to the note's warehouse. Custom items are
    /// always inserted as new rows.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn add_volumes(&self, id: NoteId, lines: &[NoteLine]) -> Result<()> {
        for line in lines {
            if let NoteLine::Book(volume) = line {
                volume.validate()?;
            }
        }

        let mut tx = self.store.begin().await?;
        let Some(header) = draft_header(&mut tx, id, "add volumes").await? else {
            return Ok(());
        };

        let now = now_millis();
        for line in lines {
            match line {
                NoteLine::Book(volume) => {
                    let warehouse_id = header.line_warehouse(volume.warehouse_id);
                    add_to_book_line(&mut tx, id, &volume.isbn, warehouse_id, volume.quantity, now)
                        .await?;
                }
                NoteLine::Custom(item) => {
                    sqlx::query(
                        "INSERT INTO custom_item (note_id, title, price, updated_at) \
                         VALUES (?, ?, ?, ?)",
                    )
                    .bind(id.as_i64())
                    .bind(&item.title)
                    .bind(item.price)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        touch_note(&mut tx, id, now).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Moves a book line to another warehouse and sets its quantity.
    ///
    /// If the target line exists the quantity is added to it. Otherwise the
    /// moved line keeps its original position in the entry listing.
    #[tracing::instrument(skip(self))]
    pub async fn update_transaction(
        &self,
        id: NoteId,
        isbn: &str,
        warehouse_id: Option<WarehouseId>,
        next: TransactionUpdate,
    ) -> Result<()> {
        if next.quantity <= 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: next.quantity,
            });
        }

        let mut tx = self.store.begin().await?;
        let Some(header) = draft_header(&mut tx, id, "update transaction").await? else {
            return Ok(());
        };

        let current = warehouse_id.map(|wh| wh.as_i64());
        let original: Option<i64> = sqlx::query_scalar(
            "SELECT updated_at FROM book_transaction \
             WHERE note_id = ? AND isbn = ? AND warehouse_id IS ?",
        )
        .bind(id.as_i64())
        .bind(isbn)
        .bind(current)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(original) = original else {
            tracing::warn!(note_id = %id, isbn, "transaction not found, ignoring");
            return Ok(());
        };

        sqlx::query(
            "DELETE FROM book_transaction WHERE note_id = ? AND isbn = ? AND warehouse_id IS ?",
        )
        .bind(id.as_i64())
        .bind(isbn)
        .bind(current)
        .execute(&mut *tx)
        .await?;

        let now = now_millis();
        let target = header.line_warehouse(next.warehouse_id);
        let merged = sqlx::query(
            "UPDATE book_transaction SET quantity = quantity + ?, updated_at = ? \
             WHERE note_id = ? AND isbn = ? AND warehouse_id IS ?",
        )
        .bind(next.quantity)
        .bind(now)
        .bind(id.as_i64())
        .bind(isbn)
        .bind(target.map(|wh| wh.as_i64()))
        .execute(&mut *tx)
        .await?;

        if merged.rows_affected() == 0 {
            add_to_book_line(&mut tx, id, isbn, target, next.quantity, original).await?;
        }

        touch_note(&mut tx, id, now).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Removes a book line from a draft note.
    #[tracing::instrument(skip(self))]
    pub async fn remove_transaction(
        &self,
        id: NoteId,
        isbn: &str,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if draft_header(&mut tx, id, "remove transaction").await?.is_none() {
            return Ok(());
        }

        sqlx::query(
            "DELETE FROM book_transaction WHERE note_id = ? AND isbn = ? AND warehouse_id IS ?",
        )
        .bind(id.as_i64())
        .bind(isbn)
        .bind(warehouse_id.map(|wh| wh.as_i64()))
        .execute(&mut *tx)
        .await?;

        touch_note(&mut tx, id, now_millis()).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Changes the title and price of a custom item. Its position is kept.
    #[tracing::instrument(skip(self))]
    pub async fn update_custom_item(
        &self,
        id: NoteId,
        item_id: i64,
        title: &str,
        price: f64,
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if draft_header(&mut tx, id, "update custom item").await?.is_none() {
            return Ok(());
        }

        sqlx::query("UPDATE custom_item SET title = ?, price = ? WHERE id = ? AND note_id = ?")
            .bind(title)
            .bind(price)
            .bind(item_id)
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        touch_note(&mut tx, id, now_millis()).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Removes a custom item from a draft note.
    #[tracing::instrument(skip(self))]
    pub async fn remove_custom_item(&self, id: NoteId, item_id: i64) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if draft_header(&mut tx, id, "remove custom item").await?.is_none() {
            return Ok(());
        }

        sqlx::query("DELETE FROM custom_item WHERE id = ? AND note_id = ?")
            .bind(item_id)
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        touch_note(&mut tx, id, now_millis()).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Lists the book lines of a note, most recently updated first.
    #[tracing::instrument(skip(self))]
    pub async fn note_entries(&self, id: NoteId) -> Result<Vec<NoteEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT bt.isbn, bt.quantity, bt.warehouse_id, w.display_name AS warehouse_name,
                   b.title, CAST(b.price AS REAL) AS price, b.authors, b.publisher, bt.updated_at
            FROM book_transaction bt
            LEFT JOIN book b ON b.isbn = bt.isbn
            LEFT JOIN warehouse w ON w.id = bt.warehouse_id
            WHERE bt.note_id = ?
            ORDER BY bt.updated_at DESC, bt.isbn ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(self.store.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(NoteEntry {
                    isbn: row.try_get("isbn")?,
                    quantity: row.try_get("quantity")?,
                    warehouse_id: row
                        .try_get::<Option<i64>, _>("warehouse_id")?
                        .map(WarehouseId::new),
                    warehouse_name: row.try_get("warehouse_name")?,
                    title: row.try_get("title")?,
                    price: row.try_get("price")?,
                    authors: row.try_get("authors")?,
                    publisher: row.try_get("publisher")?,
                    updated_at: from_millis(row.try_get("updated_at")?),
                })
            })
            .collect()
    }

    /// Lists the custom items of a note, most recently added first.
    #[tracing::instrument(skip(self))]
    pub async fn custom_items(&self, id: NoteId) -> Result<Vec<CustomItem>> {
        let rows = sqlx::query(
            "SELECT id, title, CAST(price AS REAL) AS price, updated_at FROM custom_item \
             WHERE note_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(id.as_i64())
        .fetch_all(self.store.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CustomItem {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    price: row.try_get("price")?,
                    updated_at: from_millis(row.try_get("updated_at")?),
                })
            })
            .collect()
    }

    /// Builds the receipt for a note: book lines with their warehouse
    /// discount, then custom items at quantity 1.
    #[tracing::instrument(skip(self))]
    pub async fn receipt(&self, id: NoteId) -> Result<Receipt> {
        let mut conn = self.store.acquire().await?;
        if note_header(&mut conn, id).await?.is_none() {
            return Err(DomainError::NoteNotFound(id));
        }

        let books = sqlx::query(
            r#"
            SELECT bt.isbn, bt.quantity, COALESCE(b.title, '') AS title,
                   CAST(COALESCE(b.price, 0) AS REAL) AS price,
                   CAST(COALESCE(w.discount, 0) AS REAL) AS discount
            FROM book_transaction bt
            LEFT JOIN book b ON b.isbn = bt.isbn
            LEFT JOIN warehouse w ON w.id = bt.warehouse_id
            WHERE bt.note_id = ?
            ORDER BY bt.updated_at ASC, bt.isbn ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&mut *conn)
        .await?;

        let custom = sqlx::query(
            "SELECT title, CAST(price AS REAL) AS price FROM custom_item WHERE note_id = ? ORDER BY id",
        )
        .bind(id.as_i64())
        .fetch_all(&mut *conn)
        .await?;

        let mut items = Vec::with_capacity(books.len() + custom.len());
        for row in &books {
            items.push(ReceiptItem {
                isbn: Some(row.try_get("isbn")?),
                title: row.try_get("title")?,
                quantity: row.try_get("quantity")?,
                price: row.try_get("price")?,
                discount: row.try_get("discount")?,
            });
        }
        for row in &custom {
            items.push(ReceiptItem {
                isbn: None,
                title: row.try_get("title")?,
                quantity: 1,
                price: row.try_get("price")?,
                discount: 0.0,
            });
        }

        Ok(Receipt {
            items,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Commits a note so that it counts towards stock.
    ///
    /// Outbound notes are validated first: every line needs a warehouse and
    /// enough stock there. All offending lines are reported in one error.
    /// Committing a committed note is a no-op and keeps `committed_at`.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&self, id: NoteId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let Some(header) = draft_header(&mut tx, id, "commit").await? else {
            return Ok(());
        };

        if header.kind == NoteKind::Outbound {
            let rows = sqlx::query(
                "SELECT bt.isbn, bt.warehouse_id, w.display_name AS warehouse_name, bt.quantity \
                 FROM book_transaction bt LEFT JOIN warehouse w ON w.id = bt.warehouse_id \
                 WHERE bt.note_id = ? ORDER BY bt.isbn, bt.warehouse_id",
            )
            .bind(id.as_i64())
            .fetch_all(&mut *tx)
            .await?;

            let lines = rows
                .iter()
                .map(|row| {
                    Ok(PendingLine {
                        isbn: row.try_get("isbn")?,
                        warehouse_id: row
                            .try_get::<Option<i64>, _>("warehouse_id")?
                            .map(WarehouseId::new),
                        warehouse_name: row.try_get("warehouse_name")?,
                        quantity: row.try_get("quantity")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let pairs: Vec<_> = lines
                .iter()
                .filter_map(|line| line.warehouse_id.map(|wh| (line.isbn.clone(), wh)))
                .collect();
            let stock =
                projections::stock_entries(&mut tx, &StockFilter::new().entries(pairs)).await?;

            let violations = collect_violations(&lines, &stock);
            if !violations.is_empty() {
                metrics::counter!("notes_commit_rejected_total").increment(1);
                tracing::warn!(note_id = %id, %violations, "note commit rejected");
                return Err(DomainError::InvalidNoteLines(violations));
            }
        }

        let now = now_millis();
        sqlx::query(
            "UPDATE note SET committed = 1, committed_at = ?, updated_at = ? \
             WHERE id = ? AND committed = 0",
        )
        .bind(now)
        .bind(now)
        .bind(id.as_i64())
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE book_transaction SET committed_at = ? WHERE note_id = ?")
            .bind(now)
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        metrics::counter!("notes_committed_total").increment(1);
        tracing::info!(note_id = %id, kind = %header.kind, "note committed");
        Ok(())
    }

    /// Deletes a draft note and all of its lines.
    ///
    /// Deleting a committed note is a no-op; deleting a missing one succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: NoteId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let Some(header) = note_header(&mut tx, id).await? else {
            tracing::debug!(note_id = %id, "note already gone");
            return Ok(());
        };
        if !header.state.can_modify() {
            tracing::warn!(note_id = %id, action = "delete", "note is committed, ignoring");
            return Ok(());
        }

        for table in ["book_transaction", "custom_item"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE note_id = ?"))
                .bind(id.as_i64())
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM note WHERE id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(note_id = %id, "note deleted");
        Ok(())
    }
}
