//! Store configuration loaded from environment variables.

/// Connection settings for the SQLite database.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: SQLite connection string (default: `"sqlite://bookstock.db"`)
/// - `DB_MAX_CONNECTIONS`: pool size (default: `5`)
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl StoreConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.max_connections),
        }
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }

    /// Returns true if the URL points at an in-memory database.
    ///
    /// Each connection to such a database sees its own empty schema, so the
    /// pool must be pinned to one long-lived connection.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// Pool size actually used, taking in-memory databases into account.
    pub fn effective_max_connections(&self) -> u32 {
        if self.is_in_memory() {
            1
        } else {
            self.max_connections.max(1)
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://bookstock.db".to_string(),
            max_connections: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = StoreConfig::default();
        assert_eq!(config.database_url, "sqlite://bookstock.db");
        assert_eq!(config.max_connections, 5);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_in_memory_pins_single_connection() {
        let config = StoreConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 8,
        };
        assert!(config.is_in_memory());
        assert_eq!(config.effective_max_connections(), 1);
    }

    #[test]
    fn test_shared_memory_url_detected() {
        let config = StoreConfig {
            database_url: "sqlite:file:books?mode=memory&cache=shared".to_string(),
            max_connections: 4,
        };
        assert!(config.is_in_memory());
    }

    #[test]
    fn test_zero_connections_clamped() {
        let config = StoreConfig {
            database_url: "sqlite://books.db".to_string(),
            max_connections: 0,
        };
        assert_eq!(config.effective_max_connections(), 1);
    }
}
