use std::str::FromStr;

use sqlx::{
    Sqlite, SqlitePool, Transaction,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{Result, StoreConfig};

/// An open transaction against the store.
pub type Tx = Transaction<'static, Sqlite>;

/// A connection checked out of the pool.
pub type Connection = PoolConnection<Sqlite>;

/// SQLite-backed relational store.
///
/// Cloning is cheap; all clones share the same pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Wraps an existing pool. Migrations are not run.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the database described by `config` and applies pending migrations.
    #[tracing::instrument(skip(config), fields(url = %config.database_url))]
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);

        let mut pool_options =
            SqlitePoolOptions::new().max_connections(config.effective_max_connections());
        if config.is_in_memory() {
            // The schema lives and dies with the connection.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        let store = Self::new(pool);
        store.run_migrations().await?;

        tracing::info!("store ready");
        Ok(store)
    }

    /// Opens a private in-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&StoreConfig::in_memory()).await
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Checks a connection out of the pool for a sequence of reads.
    pub async fn acquire(&self) -> Result<Connection> {
        Ok(self.pool.acquire().await?)
    }

    /// Starts a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Tx> {
        Ok(self.pool.begin().await?)
    }

    /// Round-trips a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_has_schema() {
        let store = Store::in_memory().await.unwrap();
        let mut conn = store.acquire().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM note")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn ping_answers() {
        let store = Store::in_memory().await.unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = Store::in_memory().await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            sqlx::query("INSERT INTO warehouse (id, display_name) VALUES (1, 'Rollback')")
                .execute(&mut *tx)
                .await
                .unwrap();
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM warehouse")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = Store::in_memory().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        sqlx::query("INSERT INTO warehouse (id, display_name) VALUES (1, 'Kept')")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let name: String = sqlx::query_scalar("SELECT display_name FROM warehouse WHERE id = 1")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(name, "Kept");
    }
}
