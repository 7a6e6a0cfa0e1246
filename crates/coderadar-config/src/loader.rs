//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.config/coderadar/config.toml`
//! 2. Local config: `<workspace>/.coderadar/config.toml`
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::{ConcurrencyConfig, ConfigOverrides, EmbeddingConfig, IndexerConfig, LoggingConfig, ScannerConfig, StorageConfig};

const CONFIG_FILE_NAME: &str = "config.toml";
const LOCAL_CONFIG_DIR: &str = ".coderadar";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_config_dir: Option<PathBuf>,
    global_config: Option<IndexerConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Detects the global config directory (`~/.config/coderadar`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(".config").join("coderadar"));
        Self { global_config_dir, global_config: None }
    }

    /// A loader with a custom global config directory, for tests.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self { global_config_dir: Some(global_dir.into()), global_config: None }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir.as_ref().map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Merges config in order: global -> local -> overrides.
    pub fn load(&mut self, workspace_root: &Path, overrides: Option<&ConfigOverrides>) -> Result<IndexerConfig, ConfigError> {
        let mut config = IndexerConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn load_global(&mut self) -> Result<Option<IndexerConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("no home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!(path = ?global_path, "global config not found");
            return Ok(None);
        }

        debug!(path = ?global_path, "loading global config");
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());
        Ok(Some(config))
    }

    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<IndexerConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!(path = ?local_path, "local config not found");
            return Ok(None);
        }

        debug!(path = ?local_path, "loading local config");
        load_config_file(&local_path).map(Some)
    }

    pub fn save_global(&self, config: &IndexerConfig) -> Result<(), ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        save_config_file(&global_dir.join(CONFIG_FILE_NAME), config)
    }

    pub fn save_local(&self, workspace_root: &Path, config: &IndexerConfig) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(workspace_root), config)
    }

    /// Creates `~/.config/coderadar/config.toml` with default configuration
    /// if it doesn't already exist.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        if !global_dir.exists() {
            std::fs::create_dir_all(global_dir).map_err(|e| ConfigError::create_dir(global_dir, e))?;
        }

        let config_path = global_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &IndexerConfig::default())?;
        }
        Ok(config_path)
    }

    /// Creates `<workspace>/.coderadar/config.toml` with default
    /// configuration if it doesn't already exist.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        let local_dir = workspace_root.join(LOCAL_CONFIG_DIR);

        if !local_dir.exists() {
            std::fs::create_dir_all(&local_dir).map_err(|e| ConfigError::create_dir(&local_dir, e))?;
        }

        let config_path = local_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &IndexerConfig::default())?;
        }
        Ok(config_path)
    }

    /// Forces a reload on the next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn load_config_file(path: &Path) -> Result<IndexerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

fn save_config_file(path: &Path, config: &IndexerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merges two configs, with `overlay` taking precedence over `base`, field by
/// field, so a file that sets only one key doesn't reset the rest to
/// defaults.
fn merge_configs(base: IndexerConfig, overlay: IndexerConfig) -> IndexerConfig {
    IndexerConfig {
        storage: merge_storage(base.storage, overlay.storage),
        embedding: merge_embedding(base.embedding, overlay.embedding),
        scanner: merge_scanner(base.scanner, overlay.scanner),
        concurrency: merge_concurrency(base.concurrency, overlay.concurrency),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_storage(base: StorageConfig, overlay: StorageConfig) -> StorageConfig {
    let default = StorageConfig::default();
    StorageConfig {
        data_dir: if overlay.data_dir != default.data_dir { overlay.data_dir } else { base.data_dir },
        state_file: if overlay.state_file != default.state_file { overlay.state_file } else { base.state_file },
        metrics_db: if overlay.metrics_db != default.metrics_db { overlay.metrics_db } else { base.metrics_db },
        max_snapshot_history: overlay.max_snapshot_history.or(base.max_snapshot_history),
    }
}

fn merge_embedding(base: EmbeddingConfig, overlay: EmbeddingConfig) -> EmbeddingConfig {
    let default = EmbeddingConfig::default();
    EmbeddingConfig {
        model_id: if overlay.model_id != default.model_id { overlay.model_id } else { base.model_id },
        dimension: if overlay.dimension != default.dimension { overlay.dimension } else { base.dimension },
        batch_size: if overlay.batch_size != default.batch_size { overlay.batch_size } else { base.batch_size },
        embedding_batch_size: if overlay.embedding_batch_size != default.embedding_batch_size {
            overlay.embedding_batch_size
        } else {
            base.embedding_batch_size
        },
    }
}

fn merge_scanner(base: ScannerConfig, overlay: ScannerConfig) -> ScannerConfig {
    let default = ScannerConfig::default();
    ScannerConfig {
        exclude_dirs: if overlay.exclude_dirs != default.exclude_dirs {
            let mut dirs = base.exclude_dirs;
            for dir in overlay.exclude_dirs {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
            dirs
        } else {
            base.exclude_dirs
        },
        exclude_extensions: if overlay.exclude_extensions.is_empty() {
            base.exclude_extensions
        } else {
            let mut extensions = base.exclude_extensions;
            for ext in overlay.exclude_extensions {
                if !extensions.contains(&ext) {
                    extensions.push(ext);
                }
            }
            extensions
        },
        max_file_size_kb: overlay.max_file_size_kb.or(base.max_file_size_kb),
        languages: overlay.languages.or(base.languages),
    }
}

fn merge_concurrency(base: ConcurrencyConfig, overlay: ConcurrencyConfig) -> ConcurrencyConfig {
    ConcurrencyConfig { override_workers: overlay.override_workers.or(base.override_workers) }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let default = LoggingConfig::default();
    LoggingConfig {
        level: if overlay.level != default.level { overlay.level } else { base.level },
        format: overlay.format,
    }
}
