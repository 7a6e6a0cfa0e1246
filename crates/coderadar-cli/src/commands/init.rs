//! `init` command - create a workspace's data directory and run a full index.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::{build_engine, print_info, resolve_workspace};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Workspace path to initialize (defaults to the current directory)
    path: Option<PathBuf>,

    /// Reinitialize even if the data directory already exists
    #[arg(long, short = 'f')]
    force: bool,
}

pub async fn execute(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let workspace_root = match args.path {
        Some(path) => path.canonicalize().context("failed to resolve workspace path")?,
        None => resolve_workspace(&global)?,
    };

    let (config, engine) = build_engine(&global, &workspace_root, None).await?;
    let data_dir = config.data_dir(&workspace_root);

    if data_dir.exists() && !args.force {
        anyhow::bail!("workspace already initialized at {}. Use --force to reinitialize.", data_dir.display());
    }

    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir).context("failed to create data directory")?;
    }
    print_info(&format!("initializing coderadar workspace at {}", workspace_root.display()), global.quiet);

    let stats = engine.index().await.context("failed to build the initial index")?;
    engine.close().await.context("failed to flush indexer state")?;

    if stats.errors.is_empty() {
        print_info(&format!("indexed {} documents across {} files", stats.documents_indexed, stats.files_scanned), global.quiet);
    } else {
        print_info(
            &format!(
                "indexed {} documents across {} files ({} errors)",
                stats.documents_indexed,
                stats.files_scanned,
                stats.errors.len()
            ),
            global.quiet,
        );
    }

    if !global.quiet {
        println!("\nworkspace initialized.");
        println!("next steps:");
        println!("  coderadar search \"your query\"   - search the codebase");
        println!("  coderadar stats                 - inspect index statistics");
        println!("  coderadar update                - incrementally reindex after edits");
    }

    Ok(())
}
