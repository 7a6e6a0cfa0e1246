//! CLI command implementations.

pub mod clean;
pub mod index;
pub mod init;
pub mod search;
pub mod stats;
pub mod update;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use coderadar_config::{ConfigLoader, ConfigOverrides, IndexerConfig};
use coderadar_engine::reference::{HashEmbedder, InMemoryVectorStore, RegexScanner};
use coderadar_engine::{IndexerEngine, IndexerEngineOptions, VectorStore};

use crate::progress::CliProgress;
use crate::GlobalOptions;

/// Resolve the workspace root from `--workspace` or the current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    let path = global.workspace.clone().map(Ok).unwrap_or_else(std::env::current_dir).context("failed to resolve workspace path")?;
    path.canonicalize().with_context(|| format!("workspace path does not exist: {}", path.display()))
}

/// Load layered configuration (global -> local -> CLI overrides) for a
/// workspace.
pub fn load_config(global: &GlobalOptions, workspace_root: &Path) -> Result<IndexerConfig> {
    let mut loader = ConfigLoader::new();

    if let Some(ref config_path) = global.config {
        let parent = config_path.parent().unwrap_or(workspace_root);
        if let Some(config) = loader.load_local(parent).context("failed to load config file")? {
            return Ok(config);
        }
        anyhow::bail!("config file not found: {}", config_path.display());
    }

    let overrides = ConfigOverrides { override_workers: global.concurrency, ..Default::default() };
    loader.load(workspace_root, Some(&overrides)).context("failed to load configuration")
}

/// Construct and initialize an `IndexerEngine` wired to the reference
/// Scanner/Embedder/VectorStore collaborators, so the engine and CLI
/// operate end to end without a real scanner/embedder/vector database.
pub async fn build_engine(
    global: &GlobalOptions,
    workspace_root: &Path,
    batch_size_override: Option<usize>,
) -> Result<(IndexerConfig, IndexerEngine<CliProgress>)> {
    let mut config = load_config(global, workspace_root)?;
    if let Some(batch_size) = batch_size_override {
        config.embedding.batch_size = batch_size;
    }
    config.validate().context("invalid configuration")?;

    let embedder = Arc::new(HashEmbedder::new(config.embedding.dimension));
    let scanner = Arc::new(RegexScanner::new());
    let vector_store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(embedder.clone()));

    let options = IndexerEngineOptions {
        repo_root: workspace_root.to_path_buf(),
        state_path: config.state_path(workspace_root),
        metrics_db_path: Some(config.metrics_db_path(workspace_root)),
        embedding_model: embedder.model_id().to_string(),
        embedding_dimension: embedder.dimension(),
        batch_size: config.embedding.batch_size,
        scanner,
        embedder,
        vector_store,
        git_history: None,
        metrics_collector: None,
        progress: CliProgress::new(global.quiet),
        max_snapshot_history: config.storage.max_snapshot_history,
    };

    let engine = IndexerEngine::new(options).context("failed to construct indexer engine")?;
    engine.initialize().await.context("failed to initialize indexer state")?;
    Ok((config, engine))
}

/// Print an info message, respecting `--quiet`. Stderr only, so stdout
/// stays clean for `--json` output.
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}
