//! # Engine Configuration
//!
//! ## Configuration Sources (in priority order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Configuration Priority                              │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     TILEMART_DB_PATH, TILEMART_DEFAULT_COMMISSION_PCT,                  │
//! │     TILEMART_SCHEMA_VERSION                                             │
//! │                                                                         │
//! │  2. Config File                                                         │
//! │     explicit path, or <platform config dir>/engine.toml                 │
//! │                                                                         │
//! │  3. Defaults (lowest priority)                                          │
//! │     tilemart.db, 5 connections, newest schema, 0% default commission    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Config File
//! ```toml
//! [database]
//! path = "/var/lib/tilemart/tilemart.db"
//! max_connections = 5
//!
//! [schema]
//! version = 3
//! sale_line_cost_snapshot = false
//!
//! [commission]
//! default_pct = 1.5
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use crate::schema::SchemaCapabilities;
use tilemart_core::validation::validate_percentage;
use tilemart_core::Percent;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tilemart.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommissionSettings {
    /// Percentage used when no rate row matches an invoice.
    #[serde(default)]
    pub default_pct: f64,
}

impl CommissionSettings {
    pub fn default_rate(&self) -> Percent {
        Percent::from_percentage(self.default_pct)
    }
}

// =============================================================================
// App Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub schema: SchemaCapabilities,

    #[serde(default)]
    pub commission: CommissionSettings,
}

impl AppConfig {
    /// Loads configuration from file and environment.
    ///
    /// A missing file is not an error; defaults are used.
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> DbResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DbError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.database.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::InvalidConfig("database path is empty".into()));
        }

        if SchemaCapabilities::for_version(self.schema.version).is_none() {
            return Err(DbError::InvalidConfig(format!(
                "Unknown schema version: {}",
                self.schema.version
            )));
        }

        validate_percentage("commission.default_pct", self.commission.default_pct)
            .map_err(|e| DbError::InvalidConfig(e.to_string()))?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TILEMART_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(pct) = std::env::var("TILEMART_DEFAULT_COMMISSION_PCT") {
            match pct.parse::<f64>() {
                Ok(p) => self.commission.default_pct = p,
                Err(_) => warn!(value = %pct, "Ignoring unparsable TILEMART_DEFAULT_COMMISSION_PCT"),
            }
        }

        // Replaces the whole descriptor; per-column tweaks need the file.
        if let Ok(version) = std::env::var("TILEMART_SCHEMA_VERSION") {
            match version.parse::<u32>().ok().and_then(SchemaCapabilities::for_version) {
                Some(caps) => {
                    debug!(version = caps.version, "Overriding schema version from environment");
                    self.schema = caps;
                }
                None => warn!(value = %version, "Ignoring unknown TILEMART_SCHEMA_VERSION"),
            }
        }
    }

    /// `<config dir>/engine.toml` for the current platform.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tilemart", "engine")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    /// Pool settings derived from the `[database]` and `[schema]` sections.
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .schema(self.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.commission.default_rate(), Percent::zero());
        assert_eq!(config.schema, SchemaCapabilities::current());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: AppConfig = toml::from_str(
            r#"
            [database]
            path = "/data/shop.db"

            [schema]
            version = 3
            sale_line_cost_snapshot = false

            [commission]
            default_pct = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/data/shop.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.schema.version, 3);
        assert!(!config.schema.sale_line_cost_snapshot);
        assert_eq!(config.commission.default_rate().bps(), 150);

        let db = config.to_db_config();
        assert_eq!(db.schema.version, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(matches!(config.validate(), Err(DbError::InvalidConfig(_))));

        let mut config = AppConfig::default();
        config.commission.default_pct = 150.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.schema.version = 42;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("tilemart-missing-config-test.toml");
        let config = AppConfig::load(Some(path)).unwrap();
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("tilemart-config-{}.toml", std::process::id()));
        let mut config = AppConfig::default();
        config.commission.default_pct = 2.0;
        config.save(Some(path.clone())).unwrap();

        let loaded = AppConfig::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.commission.default_rate().bps(), 200);
        let _ = std::fs::remove_file(path);
    }
}
