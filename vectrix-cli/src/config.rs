//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `VECTRIX_`-prefixed environment variables, validated before use.

use serde::{Deserialize, Serialize};
use validator::Validate;
use vectrix_persistence::SyncPolicy;

/// Inert passthrough fields for the transport layer this crate does not
/// implement. Kept so a future RPC crate can read them from the same file
/// without a config-format migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub auth_passwords: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:6380".to_string(),
            auth_passwords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PersistenceConfigSection {
    pub data_dir: String,
    pub snapshot_filename: String,
    pub aol_filename: String,
    pub aol_sync: AolSyncSetting,
    #[validate(range(min = 0))]
    pub snapshot_interval_minutes: u64,
    #[validate(range(min = 1))]
    pub aol_rewrite_size_mb: u64,
    pub backup_retention: usize,
}

impl Default for PersistenceConfigSection {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            snapshot_filename: "snapshot.bin".to_string(),
            aol_filename: "aol.bin".to_string(),
            aol_sync: AolSyncSetting::EverySec,
            snapshot_interval_minutes: 0,
            aol_rewrite_size_mb: 64,
            backup_retention: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AolSyncSetting {
    Always,
    EverySec,
    Never,
}

impl From<AolSyncSetting> for SyncPolicy {
    fn from(setting: AolSyncSetting) -> Self {
        match setting {
            AolSyncSetting::Always => SyncPolicy::Always,
            AolSyncSetting::EverySec => SyncPolicy::EverySec,
            AolSyncSetting::Never => SyncPolicy::Never,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HnswDefaults {
    #[validate(range(min = 1))]
    pub m: usize,
    #[validate(range(min = 1))]
    pub ef_construction: usize,
    #[validate(range(min = 1))]
    pub ef_search: usize,
}

impl Default for HnswDefaults {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AlgorithmConfig {
    #[validate(nested)]
    pub hnsw_defaults: HnswDefaults,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            hnsw_defaults: HnswDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub enable_audit: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            enable_audit: false,
        }
    }
}

/// Top-level configuration, loaded by [`load`]. `embedding`/`monitoring`
/// stay untyped: they name external collaborators this crate never talks
/// to directly.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VectrixConfig {
    pub server: ServerConfig,
    #[validate(nested)]
    pub persistence: PersistenceConfigSection,
    #[validate(nested)]
    pub algorithm: AlgorithmConfig,
    pub logging: LoggingConfig,
    pub embedding: serde_json::Value,
    pub monitoring: serde_json::Value,
}

impl Default for VectrixConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            persistence: PersistenceConfigSection::default(),
            algorithm: AlgorithmConfig::default(),
            logging: LoggingConfig::default(),
            embedding: serde_json::Value::Null,
            monitoring: serde_json::Value::Null,
        }
    }
}

/// Loads configuration from built-in defaults, an optional TOML file at
/// `path` (if it exists), then `VECTRIX_`-prefixed environment variables
/// (double-underscore separated, e.g. `VECTRIX_PERSISTENCE__DATA_DIR`),
/// and validates the result. Returns `CliError::Config`/`CliError::Validation`
/// (mapped by the caller to exit code 2) on a malformed file, an
/// unrecognized key, or a failed validation rule — returned as `CliError`
/// directly rather than through `anyhow`, so the caller's `?` preserves the
/// variant instead of collapsing it into `CliError::Other`.
pub fn load(path: Option<&str>) -> Result<VectrixConfig, crate::error::CliError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder =
            builder.add_source(config::File::from(std::path::Path::new(path)).required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("VECTRIX")
            .separator("__")
            .try_parsing(true),
    );

    // Every field carries a struct-level `#[serde(default)]`, so a source
    // that sets nothing at all still deserializes to `VectrixConfig::default()`.
    let cfg: VectrixConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_successfully() {
        let cfg = VectrixConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_m_fails_validation() {
        let mut cfg = VectrixConfig::default();
        cfg.algorithm.hnsw_defaults.m = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults() {
        let cfg = load(Some("/nonexistent/path/vectrix.toml")).unwrap();
        assert_eq!(cfg.algorithm.hnsw_defaults.m, 16);
    }

    #[test]
    fn env_override_changes_data_dir() {
        std::env::set_var("VECTRIX_PERSISTENCE__DATA_DIR", "/tmp/vectrix-test-data");
        let cfg = load(None).unwrap();
        assert_eq!(cfg.persistence.data_dir, "/tmp/vectrix-test-data");
        std::env::remove_var("VECTRIX_PERSISTENCE__DATA_DIR");
    }
}
