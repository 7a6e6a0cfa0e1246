//! `clean` command - destroy `IndexerState` and vector store contents for a
//! workspace.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args;

use super::{build_engine, resolve_workspace};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Skip the confirmation prompt
    #[arg(long, short = 'f')]
    force: bool,
}

pub async fn execute(args: CleanArgs, global: GlobalOptions) -> Result<()> {
    let workspace_root = resolve_workspace(&global)?;
    let (config, engine) = build_engine(&global, &workspace_root, None).await?;
    let data_dir = config.data_dir(&workspace_root);

    if !data_dir.exists() {
        if !global.quiet {
            println!("nothing to clean at {}", data_dir.display());
        }
        return Ok(());
    }

    if !args.force {
        print!("remove {} and all indexed vectors? [y/N] ", data_dir.display());
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("cleanup cancelled.");
            return Ok(());
        }
    }

    engine.close().await.context("failed to close indexer engine")?;
    std::fs::remove_dir_all(&data_dir).with_context(|| format!("failed to remove {}", data_dir.display()))?;

    if !global.quiet {
        println!("removed {}", data_dir.display());
    }

    Ok(())
}
