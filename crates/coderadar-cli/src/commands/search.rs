//! `search` command - semantic search over the indexed repository.

use anyhow::{Context, Result};
use clap::Args;
use coderadar_engine::SearchOptions;

use super::{build_engine, resolve_workspace};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    query: String,

    /// Maximum number of results to return
    #[arg(long, short = 'n', default_value = "10")]
    limit: usize,

    /// Minimum similarity score (0.0 - 1.0)
    #[arg(long)]
    threshold: Option<f32>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: SearchArgs, global: GlobalOptions) -> Result<()> {
    let workspace_root = resolve_workspace(&global)?;
    let (_config, engine) = build_engine(&global, &workspace_root, None).await?;

    let options = SearchOptions { limit: Some(args.limit), score_threshold: args.threshold, filter: None };
    let results = engine.search(&args.query, options).await.context("search failed")?;
    engine.close().await.context("failed to flush indexer state")?;

    if results.is_empty() {
        if !global.quiet {
            eprintln!("no results found for: {}", args.query);
        }
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results).context("failed to serialize results")?);
        return Ok(());
    }

    if !global.quiet {
        println!("found {} result(s) for \"{}\":\n", results.len(), args.query);
    }
    for (i, result) in results.iter().enumerate() {
        println!("{}. {} ({})", i + 1, result.metadata.name, result.metadata.component_type);
        println!("   {}:{}-{}", result.metadata.file, result.metadata.start_line, result.metadata.end_line);
        println!("   score: {:.3}", result.score);
        if let Some(snippet) = &result.metadata.snippet {
            println!("   ---");
            for line in snippet.lines().take(5) {
                println!("   {line}");
            }
        }
        println!();
    }

    Ok(())
}
