use std::sync::Arc;
use tracing::info;

use shopsearch_cli::{server, AppContext};
use shopsearch_core::config::Config;
use shopsearch_core::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info");
    let config = Config::load()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let ctx = AppContext::from_config(config).await?;
    ctx.config.store.readiness.wait_for_store(ctx.store.as_ref()).await?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "serving search API");
    axum::serve(listener, server::router(Arc::new(ctx))).await?;
    Ok(())
}
