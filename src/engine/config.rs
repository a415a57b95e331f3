//! Engine configuration resolved from the environment.

/// Runtime configuration for assembling an engine with the default
/// backends. Values not provided explicitly are resolved from the
/// environment (a `.env` file is honored).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// SQLite database file name for the durable stores.
    pub sqlite_db_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
        }
    }
}

impl EngineConfig {
    pub fn new(sqlite_db_name: Option<String>) -> Self {
        Self {
            sqlite_db_name: Self::resolve_sqlite_db_name(sqlite_db_name),
        }
    }

    fn resolve_sqlite_db_name(provided: Option<String>) -> String {
        if let Some(name) = provided {
            return name;
        }
        dotenvy::dotenv().ok();
        std::env::var("MAILGRAPH_DB_NAME").unwrap_or_else(|_| "mailgraph.db".to_string())
    }

    /// Connection URL for the configured database, creating the file on
    /// first use.
    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.sqlite_db_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_name_wins() {
        let config = EngineConfig::new(Some("custom.db".into()));
        assert_eq!(config.sqlite_db_name, "custom.db");
        assert_eq!(config.database_url(), "sqlite://custom.db?mode=rwc");
    }
}
