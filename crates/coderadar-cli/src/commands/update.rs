//! `update` command - incremental update, delegating to a full index when
//! no prior state exists.

use anyhow::{Context, Result};
use clap::Args;

use super::{build_engine, print_info, resolve_workspace};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct UpdateArgs {}

pub async fn execute(_args: UpdateArgs, global: GlobalOptions) -> Result<()> {
    let workspace_root = resolve_workspace(&global)?;
    let (_config, engine) = build_engine(&global, &workspace_root, None).await?;

    let stats = engine.update().await.context("incremental update failed")?;
    engine.close().await.context("failed to flush indexer state")?;

    if stats.files_scanned == 0 && stats.documents_indexed == 0 && stats.errors.is_empty() {
        print_info("no changes detected; index is up to date", global.quiet);
        return Ok(());
    }

    let kind = if stats.is_incremental { "incremental update" } else { "full index" };
    if stats.errors.is_empty() {
        print_info(&format!("{kind}: indexed {} documents across {} files ({} ms)", stats.documents_indexed, stats.files_scanned, stats.duration_ms), global.quiet);
    } else {
        print_info(
            &format!(
                "{kind}: indexed {} documents across {} files with {} errors ({} ms)",
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
