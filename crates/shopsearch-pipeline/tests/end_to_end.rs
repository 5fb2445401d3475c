use std::sync::Arc;
use std::time::Duration;

use shopsearch_core::config::Config;
use shopsearch_core::retry::RetryPolicy;
use shopsearch_core::traits::VectorStore;
use shopsearch_embed::FakeEmbedder;
use shopsearch_pipeline::api::SearchResponse;
use shopsearch_pipeline::{ImportRun, RunPhase, SearchEngine};
use shopsearch_vector::LanceStore;

const CATALOG: &str = "id,title,description,category,price\n\
1,Air Max Runner,lightweight running shoe with cushioned sole,Shoes,5400\n\
2,iPhone 15,smartphone with dual camera and long battery,Electronics,42000\n\
3,Ergonomic Wireless Mouse,quiet mouse for coding and office work,Accessories,3900\n\
4,Burr Coffee Grinder,stainless grinder with fifteen settings,Kitchen,2500\n\
5,Yoga Mat,non slip mat six millimetres thick,Sports,890\n";

#[tokio::test]
async fn mouse_for_coding_finds_the_mouse() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let csv = tmp.path().join("products.csv");
    std::fs::write(&csv, CATALOG)?;
    let db = tmp.path().join("lancedb");

    let mut config = Config::default();
    config.store.uri = db.to_string_lossy().to_string();
    config.store.readiness = RetryPolicy::fixed(2, Duration::from_millis(10));
    config.indexer.batch_size = 2;

    let store = Arc::new(LanceStore::connect(&config.store.uri).await?);
    let embedder = Arc::new(FakeEmbedder::new(128));

    let report = ImportRun::new(store.clone(), embedder.clone(), &config).run(&csv).await?;
    assert_eq!(report.phase, RunPhase::Done);
    assert_eq!(report.imported, 5);
    assert_eq!(report.batches, 3);
    assert_eq!(store.count(&config.store.index_name).await?, 5);

    let engine = SearchEngine::new(store.clone(), embedder.clone(), &config.store.index_name);
    let outcome = engine.search_with("mouse for coding", 3, 0.0, false).await?;
    assert_eq!(outcome.results.first().map(|h| h.id.as_str()), Some("3"));
    assert!(outcome.results.iter().all(|h| h.score >= 0.0));

    let body = serde_json::to_value(SearchResponse::from_outcome("mouse for coding", outcome))?;
    assert_eq!(body["data"][0]["title"], "Ergonomic Wireless Mouse");
    assert_eq!(body["ai_thought"], "mouse for coding");
    Ok(())
}

#[tokio::test]
async fn reimport_replaces_instead_of_duplicating() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let csv = tmp.path().join("products.csv");
    std::fs::write(&csv, CATALOG)?;

    let mut config = Config::default();
    config.store.uri = tmp.path().join("lancedb").to_string_lossy().to_string();
    config.store.readiness = RetryPolicy::fixed(1, Duration::from_millis(1));

    let store = Arc::new(LanceStore::connect(&config.store.uri).await?);
    let embedder = Arc::new(FakeEmbedder::new(64));
    let run = ImportRun::new(store.clone(), embedder.clone(), &config);
    run.run(&csv).await?;
    run.run(&csv).await?;
    assert_eq!(store.count(&config.store.index_name).await?, 5);

    let upsert_only = ImportRun::new(store.clone(), embedder, &config).reset(false);
    upsert_only.run(&csv).await?;
    assert_eq!(store.count(&config.store.index_name).await?, 5);
    Ok(())
}

#[tokio::test]
async fn three_product_catalog_ranks_the_mouse_first() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let csv = tmp.path().join("products.csv");
    std::fs::write(
        &csv,
        "id,title,description,category,price\n\
         1,Air Max,running shoe,Shoes,5400\n\
         2,iPhone,smartphone camera,Electronics,42000\n\
         3,Mouse,ergonomic wireless mouse,Accessories,3900\n",
    )?;

    let mut config = Config::default();
    config.store.uri = tmp.path().join("lancedb").to_string_lossy().to_string();
    config.store.readiness = RetryPolicy::fixed(1, Duration::from_millis(1));

    let store = Arc::new(LanceStore::connect(&config.store.uri).await?);
    // Hashed tokens collide below a few dozen dimensions.
    let embedder = Arc::new(FakeEmbedder::new(384));
    let report = ImportRun::new(store.clone(), embedder.clone(), &config).run(&csv).await?;
    assert_eq!(report.imported, 3);

    let engine = SearchEngine::new(store, embedder, &config.store.index_name);
    let outcome = engine.search_with("mouse for coding", 3, 0.0, false).await?;
    assert_eq!(outcome.results.first().map(|h| h.id.as_str()), Some("3"));
    assert!(outcome.results.len() <= 3);
    assert!(outcome.results.iter().all(|h| h.score >= 0.0));
    assert!(outcome.results.windows(2).all(|w| w[0].score >= w[1].score));
    Ok(())
}
