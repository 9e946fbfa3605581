//! Application configuration loaded from environment variables.

use common::WarehouseId;
use orders::ReconciliationConfig;
use store::StoreConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: SQLite connection string (default: `"sqlite://bookstock.db"`)
/// - `DELIVERY_WAREHOUSE_ID`: warehouse receiving reconciled deliveries (default: none)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub delivery_warehouse_id: Option<WarehouseId>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            delivery_warehouse_id: std::env::var("DELIVERY_WAREHOUSE_ID")
                .ok()
                .and_then(|id| id.parse().ok())
                .map(WarehouseId::new),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Store settings: the configured URL with the pool size from the environment.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            database_url: self.database_url.clone(),
            ..StoreConfig::from_env()
        }
    }

    pub fn reconciliation_config(&self) -> ReconciliationConfig {
        ReconciliationConfig::new(self.delivery_warehouse_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: StoreConfig::default().database_url,
            delivery_warehouse_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_url, "sqlite://bookstock.db");
        assert_eq!(config.delivery_warehouse_id, None);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reconciliation_config() {
        let config = Config {
            delivery_warehouse_id: Some(WarehouseId::new(2)),
            ..Config::default()
        };
        assert_eq!(
            config.reconciliation_config().delivery_warehouse,
            Some(WarehouseId::new(2))
        );
    }

    #[test]
    fn test_store_config_uses_database_url() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Config::default()
        };
        assert!(config.store_config().is_in_memory());
    }
}
