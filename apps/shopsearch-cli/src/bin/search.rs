use clap::Parser;

use shopsearch_cli::AppContext;
use shopsearch_core::config::Config;
use shopsearch_core::logging;
use shopsearch_pipeline::api::SearchResponse;
use shopsearch_pipeline::Expansion;

/// One-shot product search.
#[derive(Debug, Parser)]
#[command(name = "shopsearch-search", version)]
struct Args {
    query: String,
    #[arg(short, long)]
    k: Option<usize>,
    #[arg(long)]
    min_score: Option<f32>,
    /// Skip keyword expansion
    #[arg(long)]
    no_expand: bool,
    /// Print the API response body instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("warn");
    let args = Args::parse();
    let mut config = Config::load()?;
    if args.no_expand {
        config.expansion.enabled = false;
    }
    let k = args.k.unwrap_or(config.search.k);
    let min_score = args.min_score.unwrap_or(config.search.min_score);

    let ctx = AppContext::from_config(config).await?;
    let outcome = ctx.search_engine().search(&args.query, k, min_score).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&SearchResponse::from_outcome(args.query.trim(), outcome))?);
        return Ok(());
    }
    match &outcome.expansion {
        Expansion::Expanded(keywords) => println!("🤖 Expanded with: {keywords}"),
        Expansion::Fallback(reason) => println!("🤖 Expansion unavailable ({reason}), searching raw query"),
        Expansion::Disabled => {}
    }
    println!("🔎 {}", outcome.final_query);
    if outcome.results.is_empty() {
        println!("No products scored at or above {min_score:.2}");
    }
    for (rank, hit) in outcome.results.iter().enumerate() {
        println!("{:>2}. [{:.4}] {} ({:.2}) {} #{}", rank + 1, hit.score, hit.title, hit.price, hit.category, hit.id);
    }
    Ok(())
}
