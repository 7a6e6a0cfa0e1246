//! `stats` command - `IndexerEngine::get_stats`.

use anyhow::{Context, Result};
use clap::Args;

use super::{build_engine, resolve_workspace};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: StatsArgs, global: GlobalOptions) -> Result<()> {
    let workspace_root = resolve_workspace(&global)?;
    let (_config, engine) = build_engine(&global, &workspace_root, None).await?;

    let stats = engine.get_stats().await.context("failed to compute stats")?;
    engine.close().await.context("failed to flush indexer state")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats).context("failed to serialize stats")?);
        return Ok(());
    }

    println!("coderadar index statistics");
    println!("===========================\n");
    println!("files:      {}", stats.total_files);
    println!("documents:  {}", stats.total_documents);
    println!("vectors:    {}", stats.total_vectors);

    if !stats.by_language.is_empty() {
        println!("\nby language:");
        let mut languages: Vec<_> = stats.by_language.iter().collect();
        languages.sort_by(|a, b| a.0.cmp(b.0));
        for (language, counts) in languages {
            println!("  {language:<12} files={:<6} components={:<6} lines={}", counts.files, counts.components, counts.lines);
        }
    }

    if !stats.by_component_type.is_empty() {
        println!("\nby component type:");
        let mut component_types: Vec<_> = stats.by_component_type.iter().collect();
        component_types.sort_by(|a, b| a.0.cmp(b.0));
        for (component_type, count) in component_types {
            println!("  {component_type:<12} {count}");
        }
    }

    if let Some(warning) = &stats.warning {
        println!("\nwarning: {warning}");
    }

    Ok(())
}
