//! Warehouses: logical groupings of stock.

use std::collections::HashMap;

use common::WarehouseId;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, sqlite::SqliteRow};
use store::Store;

use crate::Result;
use crate::sequence::{self, WAREHOUSE_BASE_NAME};

const WAREHOUSE_NAMES: &str =
    "SELECT display_name FROM warehouse WHERE display_name = ? OR display_name LIKE ?";

/// A warehouse and the total of its committed stock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub display_name: String,
    pub discount: f64,
    pub total_books: i64,
}

impl Warehouse {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: WarehouseId::new(row.try_get("id")?),
            display_name: row
                .try_get::<Option<String>, _>("display_name")?
                .unwrap_or_default(),
            discount: row.try_get("discount")?,
            total_books: 0,
        })
    }
}

/// Fields to set on a warehouse. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WarehouseUpdate {
    pub display_name: Option<String>,
    pub discount: Option<f64>,
}

impl WarehouseUpdate {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            ..Default::default()
        }
    }

    pub fn discount(mut self, discount: f64) -> Self {
        self.discount = Some(discount);
        self
    }
}

/// Clamps a discount percentage into 0..=100.
fn clamp_discount(discount: f64) -> f64 {
    if discount.is_nan() {
        0.0
    } else {
        discount.clamp(0.0, 100.0)
    }
}

/// Creates the warehouse with a default name if it does not exist yet.
pub async fn ensure_warehouse(conn: &mut SqliteConnection, id: WarehouseId) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM warehouse WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    let display_name = sequence::next_name(conn, WAREHOUSE_NAMES, WAREHOUSE_BASE_NAME).await?;
    sqlx::query("INSERT INTO warehouse (id, display_name) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
        .bind(id.as_i64())
        .bind(&display_name)
        .execute(&mut *conn)
        .await?;

    tracing::info!(warehouse_id = %id, %display_name, "warehouse created");
    Ok(())
}

/// Manages warehouse rows.
#[derive(Clone)]
pub struct WarehouseService {
    store: Store,
}

impl WarehouseService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Creates or updates a warehouse.
    ///
    /// A new warehouse without a name gets the next default name. The
    /// discount is clamped to 0..=100.
    #[tracing::instrument(skip(self))]
    pub async fn upsert_warehouse(&self, id: WarehouseId, update: WarehouseUpdate) -> Result<()> {
        let discount = update.discount.map(clamp_discount);
        let mut tx = self.store.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM warehouse WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;

        if exists.is_some() {
            sqlx::query(
                "UPDATE warehouse SET display_name = COALESCE(?, display_name), \
                 discount = COALESCE(?, discount) WHERE id = ?",
            )
            .bind(update.display_name.as_deref())
            .bind(discount)
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        } else {
            let display_name = match update.display_name {
                Some(name) => name,
                None => sequence::next_name(&mut tx, WAREHOUSE_NAMES, WAREHOUSE_BASE_NAME).await?,
            };
            sqlx::query("INSERT INTO warehouse (id, display_name, discount) VALUES (?, ?, ?)")
                .bind(id.as_i64())
                .bind(display_name)
                .bind(discount.unwrap_or(0.0))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Creates the warehouse with a default name if it does not exist yet.
    #[tracing::instrument(skip(self))]
    pub async fn ensure(&self, id: WarehouseId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        ensure_warehouse(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Gets a warehouse with its committed stock total.
    #[tracing::instrument(skip(self))]
    pub async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>> {
        let warehouses = self.list_warehouses().await?;
        Ok(warehouses.into_iter().find(|w| w.id == id))
    }

    /// Lists all warehouses ordered by id. Warehouses without stock report 0.
    #[tracing::instrument(skip(self))]
    pub async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        let mut conn = self.store.acquire().await?;

        let rows = sqlx::query(
            "SELECT id, display_name, CAST(discount AS REAL) AS discount FROM warehouse ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await?;

        let totals: HashMap<WarehouseId, i64> = projections::warehouse_totals(&mut conn)
            .await?
            .into_iter()
            .map(|t| (t.warehouse_id, t.total_books))
            .collect();

        rows.iter()
            .map(|row| {
                let mut warehouse = Warehouse::from_row(row)?;
                warehouse.total_books = totals.get(&warehouse.id).copied().unwrap_or(0);
                Ok(warehouse)
            })
            .collect()
    }

    /// Deletes the warehouse row. Notes referencing it are kept.
    #[tracing::instrument(skip(self))]
    pub async fn delete_warehouse(&self, id: WarehouseId) -> Result<()> {
        sqlx::query("DELETE FROM warehouse WHERE id = ?")
            .bind(id.as_i64())
            .execute(self.store.pool())
            .await?;
        Ok(())
    }

    /// Returns an id one above the highest in use.
    #[tracing::instrument(skip(self))]
    pub async fn next_warehouse_id(&self) -> Result<WarehouseId> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM warehouse")
            .fetch_one(self.store.pool())
            .await?;
        Ok(WarehouseId::new(max.unwrap_or(0) + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> WarehouseService {
        WarehouseService::new(Store::in_memory().await.unwrap())
    }

    #[test]
    fn discount_is_clamped() {
        assert_eq!(clamp_discount(-5.0), 0.0);
        assert_eq!(clamp_discount(150.0), 100.0);
        assert_eq!(clamp_discount(12.5), 12.5);
        assert_eq!(clamp_discount(f64::NAN), 0.0);
    }

    #[tokio::test]
    async fn new_warehouses_get_sequential_default_names() {
        let service = service().await;
        for id in 1..=3 {
            service
                .upsert_warehouse(WarehouseId::new(id), WarehouseUpdate::default())
                .await
                .unwrap();
        }

        let names: Vec<_> = service
            .list_warehouses()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.display_name)
            .collect();
        assert_eq!(
            names,
            vec!["New Warehouse", "New Warehouse (2)", "New Warehouse (3)"]
        );
    }

    #[tokio::test]
    async fn renaming_all_resets_the_sequence() {
        let service = service().await;
        for id in 1..=3 {
            service
                .upsert_warehouse(WarehouseId::new(id), WarehouseUpdate::default())
                .await
                .unwrap();
        }
        for id in 1..=3 {
            service
                .upsert_warehouse(
                    WarehouseId::new(id),
                    WarehouseUpdate::named(format!("Shelf {id}")),
                )
                .await
                .unwrap();
        }

        service
            .upsert_warehouse(WarehouseId::new(4), WarehouseUpdate::default())
            .await
            .unwrap();
        let fourth = service
            .get_warehouse(WarehouseId::new(4))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fourth.display_name, "New Warehouse");
    }

    #[tokio::test]
    async fn update_merges_fields_and_clamps_discount() {
        let service = service().await;
        let id = WarehouseId::new(1);
        service
            .upsert_warehouse(id, WarehouseUpdate::named("Front").discount(10.0))
            .await
            .unwrap();
        service
            .upsert_warehouse(id, WarehouseUpdate::default().discount(250.0))
            .await
            .unwrap();

        let warehouse = service.get_warehouse(id).await.unwrap().unwrap();
        assert_eq!(warehouse.display_name, "Front");
        assert_eq!(warehouse.discount, 100.0);
        assert_eq!(warehouse.total_books, 0);
    }

    #[tokio::test]
    async fn ensure_is_lazy_and_idempotent() {
        let service = service().await;
        let id = WarehouseId::new(7);
        service.ensure(id).await.unwrap();
        service
            .upsert_warehouse(id, WarehouseUpdate::named("Basement"))
            .await
            .unwrap();
        service.ensure(id).await.unwrap();

        let warehouse = service.get_warehouse(id).await.unwrap().unwrap();
        assert_eq!(warehouse.display_name, "Basement");
        assert_eq!(service.next_warehouse_id().await.unwrap(), WarehouseId::new(8));
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let service = service().await;
        let id = WarehouseId::new(1);
        service.ensure(id).await.unwrap();
        service.delete_warehouse(id).await.unwrap();

        assert!(service.get_warehouse(id).await.unwrap().is_none());
        assert_eq!(service.next_warehouse_id().await.unwrap(), WarehouseId::new(1));
    }
}
