use clap::Parser;
use std::path::PathBuf;

use shopsearch_cli::AppContext;
use shopsearch_core::config::{expand_path, Config, FailureMode};
use shopsearch_core::logging;

/// Load a product CSV into the search index.
#[derive(Debug, Parser)]
#[command(name = "shopsearch-import", version)]
struct Args {
    /// CSV with header id,title,description,category,price (defaults to indexer.input_path)
    csv: Option<PathBuf>,
    /// Abort on the first bad record or failed document
    #[arg(long, conflicts_with = "best_effort")]
    strict: bool,
    /// Skip bad records and count failed documents
    #[arg(long)]
    best_effort: bool,
    #[arg(long)]
    batch_size: Option<usize>,
    /// Upsert into the existing index instead of recreating it
    #[arg(long)]
    no_reset: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info");
    let args = Args::parse();
    let mut config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    if args.strict {
        config.indexer.failure_mode = FailureMode::Strict;
    } else if args.best_effort {
        config.indexer.failure_mode = FailureMode::BestEffort;
    }
    if let Some(batch_size) = args.batch_size {
        config.indexer.batch_size = batch_size;
    }
    config.validate()?;
    let csv = args.csv.unwrap_or_else(|| expand_path(&config.indexer.input_path));

    let ctx = AppContext::from_config(config).await?;
    println!(
        "Importing {} into '{}' (batch size {}, {:?})",
        csv.display(),
        ctx.config.store.index_name,
        ctx.config.indexer.batch_size,
        ctx.config.indexer.failure_mode
    );
    let run = ctx.import_run().reset(!args.no_reset).show_progress(true);
    match run.run(&csv).await {
        Ok(report) => {
            println!(
                "✅ Imported {} of {} products in {} batches ({} skipped, {} failed) in {:.1?}",
                report.imported, report.total, report.batches, report.skipped, report.failed, report.elapsed
            );
            if report.ann_index {
                println!("📦 HNSW index built");
            }
            Ok(())
        }
        Err(abort) => {
            eprintln!(
                "❌ Import aborted during {:?}: {} ({} products committed)",
                abort.phase, abort.error, abort.report.imported
            );
            Err(abort.into())
        }
    }
}
