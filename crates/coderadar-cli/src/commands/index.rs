//! `index` command - full index of a workspace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::{build_engine, print_info, resolve_workspace};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Workspace path to index (defaults to the current directory)
    path: Option<PathBuf>,

    /// Suppress the "already initialized, consider `update`" hint
    #[arg(long, short = 'f')]
    force: bool,

    /// Override the configured embedding batch size
    #[arg(long)]
    batch_size: Option<usize>,
}

pub async fn execute(args: IndexArgs, global: GlobalOptions) -> Result<()> {
    let workspace_root = match args.path {
        Some(path) => path.canonicalize().context("failed to resolve workspace path")?,
        None => resolve_workspace(&global)?,
    };

    let (config, engine) = build_engine(&global, &workspace_root, args.batch_size).await?;

    if !args.force && config.data_dir(&workspace_root).exists() {
        print_info("workspace already has an index; this rebuilds it from scratch. Use `coderadar update` for an incremental pass.", global.quiet);
    }

    let stats = engine.index().await.context("full index failed")?;
    engine.close().await.context("failed to flush indexer state")?;

    if stats.errors.is_empty() {
        print_info(&format!("indexed {} documents across {} files ({} ms)", stats.documents_indexed, stats.files_scanned, stats.duration_ms), global.quiet);
    } else {
        print_info(
            &format!(
                "indexed {} documents across {} files with {} errors ({} ms)",
                stats.documents_indexed,
                stats.files_scanned,
                stats.errors.len(),
                stats.duration_ms
            ),
            global.quiet,
        );
        for error in &stats.errors {
            eprintln!("  batch {}: {}", error.batch_index, error.reason);
        }
    }

    Ok(())
}
