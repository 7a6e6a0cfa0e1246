//! Layered configuration for `coderadar`: a `#[serde(default)]` tree merged
//! global -> workspace -> CLI overrides.

mod error;
mod loader;

pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Matches `coderadar_core::DEFAULT_EXCLUDE_DIRS`; duplicated here rather than
/// depending on `coderadar-core` so the config layer has no compile-time
/// dependency on the engine's data model.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] =
    &[".git", "node_modules", "dist", "coverage", "target", "build", ".venv", "venv", "__pycache__", ".idea", ".vscode"];

fn default_exclude_dirs() -> Vec<String> {
    DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect()
}

/// Root configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub scanner: ScannerConfig,
    pub concurrency: ConcurrencyConfig,
    pub logging: LoggingConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            scanner: ScannerConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Absolute path of this workspace's data directory, resolved against
    /// `workspace_root`.
    pub fn data_dir(&self, workspace_root: &std::path::Path) -> PathBuf {
        workspace_root.join(&self.storage.data_dir)
    }

    /// Path of the `IndexerState` file.
    pub fn state_path(&self, workspace_root: &std::path::Path) -> PathBuf {
        self.data_dir(workspace_root).join(&self.storage.state_file)
    }

    /// Path of the metrics SQLite database.
    pub fn metrics_db_path(&self, workspace_root: &std::path::Path) -> PathBuf {
        self.data_dir(workspace_root).join(&self.storage.metrics_db)
    }

    /// Validates cross-field invariants that `#[serde(default)]` alone can't
    /// enforce.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::invalid_value("embedding.dimension", "must be greater than zero"));
        }
        if self.embedding.model_id.trim().is_empty() {
            return Err(ConfigError::invalid_value("embedding.model_id", "must not be empty"));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::invalid_value("embedding.batch_size", "must be greater than zero"));
        }
        if self.embedding.embedding_batch_size == 0 {
            return Err(ConfigError::invalid_value("embedding.embedding_batch_size", "must be greater than zero"));
        }
        if let Some(max_kb) = self.scanner.max_file_size_kb {
            if max_kb == 0 {
                return Err(ConfigError::invalid_value("scanner.max_file_size_kb", "must be greater than zero if set"));
            }
        }
        Ok(())
    }

    /// Applies CLI/env overrides on top of the merged global+workspace
    /// config, field by field, leaving fields the override doesn't set
    /// untouched.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(workers) = overrides.override_workers {
            self.concurrency.override_workers = Some(workers);
        }
        if let Some(batch_size) = overrides.batch_size {
            self.embedding.batch_size = batch_size;
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(data_dir) = &overrides.data_dir {
            self.storage.data_dir = data_dir.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub state_file: PathBuf,
    pub metrics_db: PathBuf,
    pub max_snapshot_history: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".coderadar"),
            state_file: PathBuf::from("state.json"),
            metrics_db: PathBuf::from("metrics.db"),
            max_snapshot_history: Some(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_id: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub embedding_batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "hash-embedder-v1".to_string(),
            dimension: 256,
            batch_size: 32,
            embedding_batch_size: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub exclude_dirs: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub max_file_size_kb: Option<u64>,
    pub languages: Option<Vec<String>>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: default_exclude_dirs(),
            exclude_extensions: Vec::new(),
            max_file_size_kb: Some(1024),
            languages: None,
        }
    }
}

/// `override_workers` mirrors the `DEV_AGENT_CONCURRENCY` env var consumed by
/// `coderadar_core::effective_workers_from_env`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub override_workers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::invalid_value("logging.format", format!("unknown format '{other}'"))),
        }
    }
}

/// Built by the CLI from global flags/env vars and layered on top of the
/// merged global+workspace config as the final tier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub override_workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub log_level: Option<String>,
    pub data_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(IndexerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_dimension_is_invalid() {
        let mut config = IndexerConfig::default();
        config.embedding.dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn apply_overrides_only_touches_set_fields() {
        let mut config = IndexerConfig::default();
        let original_level = config.logging.level.clone();
        let overrides = ConfigOverrides { override_workers: Some(4), ..Default::default() };
        config.apply_overrides(&overrides);
        assert_eq!(config.concurrency.override_workers, Some(4));
        assert_eq!(config.logging.level, original_level);
    }

    #[test]
    fn data_dir_and_state_path_resolve_under_workspace_root() {
        let config = IndexerConfig::default();
        let root = std::path::Path::new("/workspace");
        assert_eq!(config.data_dir(root), PathBuf::from("/workspace/.coderadar"));
        assert_eq!(config.state_path(root), PathBuf::from("/workspace/.coderadar/state.json"));
    }

    #[test]
    fn log_format_round_trips_through_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("bogus".parse::<LogFormat>().is_err());
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let config = IndexerConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: IndexerConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let partial = "[embedding]\nmodel_id = \"custom-model\"\n";
        let config: IndexerConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.embedding.model_id, "custom-model");
        assert_eq!(config.embedding.dimension, EmbeddingConfig::default().dimension);
        assert_eq!(config.scanner.exclude_dirs, default_exclude_dirs());
    }
}
