mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{product, products, FlakyEmbedder, MemoryStore};
use shopsearch_core::config::{Config, FailureMode};
use shopsearch_core::error::Error;
use shopsearch_core::retry::RetryPolicy;
use shopsearch_core::traits::VectorStore;
use shopsearch_embed::FakeEmbedder;
use shopsearch_pipeline::{BatchIndexer, ImportRun, RunPhase};

const INDEX: &str = "products";
const DIM: usize = 16;

fn indexer(store: &Arc<MemoryStore>, batch_size: usize, mode: FailureMode) -> BatchIndexer {
    BatchIndexer::new(store.clone(), Arc::new(FakeEmbedder::new(DIM)), INDEX, batch_size, mode)
}

#[tokio::test]
async fn issues_ceiling_n_over_b_bulk_calls() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    let report = indexer(&store, 3, FailureMode::Strict).run(products(7)).await.expect("run");

    assert_eq!(store.bulk_sizes(), vec![3, 3, 1]);
    assert_eq!(report.batches, 3);
    assert_eq!(report.imported, 7);
    assert_eq!(report.total, 7);
    assert_eq!(report.phase, RunPhase::Done);
    let mut ids = store.ids(INDEX);
    ids.sort_by_key(|id| id.parse::<u32>().unwrap());
    assert_eq!(ids, (1..=7).map(|i| i.to_string()).collect::<Vec<_>>());
}

#[tokio::test]
async fn exact_multiple_has_no_empty_trailing_flush() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    let report = indexer(&store, 3, FailureMode::BestEffort).run(products(6)).await.expect("run");
    assert_eq!(store.bulk_sizes(), vec![3, 3]);
    assert_eq!(report.batches, 2);
}

#[tokio::test]
async fn empty_input_writes_nothing() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    let report = indexer(&store, 3, FailureMode::Strict).run(Vec::new()).await.expect("run");
    assert!(store.bulk_sizes().is_empty());
    assert_eq!(report.imported, 0);
}

#[tokio::test]
async fn best_effort_skips_bad_records() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    let mut records = products(4);
    records.insert(2, Err(Error::InvalidRecord { line: 4, reason: "price must be a non-negative number".into() }));

    let report = indexer(&store, 2, FailureMode::BestEffort).run(records).await.expect("run");
    assert_eq!(report.skipped, 1);
    assert_eq!(report.imported, 4);
    assert_eq!(report.total, 5);
    assert_eq!(store.count(INDEX).await.unwrap(), 4);
}

#[tokio::test]
async fn best_effort_skips_embedding_failures() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    let embedder = FlakyEmbedder { inner: FakeEmbedder::new(DIM), trigger: "item2 ", short_vector: false };
    let indexer = BatchIndexer::new(store.clone(), Arc::new(embedder), INDEX, 10, FailureMode::BestEffort);

    let report = indexer.run(products(3)).await.expect("run");
    assert_eq!(report.skipped, 1);
    assert_eq!(store.ids(INDEX), vec!["1".to_string(), "3".to_string()]);
}

#[tokio::test]
async fn strict_aborts_with_committed_count() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    let mut records = products(5);
    records[3] = Err(Error::InvalidRecord { line: 5, reason: "bad".into() });

    let abort = indexer(&store, 2, FailureMode::Strict).run(records).await.expect_err("abort");
    assert_eq!(abort.phase, RunPhase::Streaming);
    assert_eq!(abort.report.phase, RunPhase::Failed);
    assert_eq!(abort.report.imported, 2);
    assert!(matches!(abort.error, Error::InvalidRecord { line: 5, .. }));
    assert_eq!(store.count(INDEX).await.unwrap(), 2);
}

#[tokio::test]
async fn partial_bulk_failure_is_counted_in_best_effort() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    store.fail_item("4");
    let report = indexer(&store, 3, FailureMode::BestEffort).run(products(6)).await.expect("run");
    assert_eq!(report.imported, 5);
    assert_eq!(report.failed, 1);
    assert_eq!(report.batches, 2);
    assert!(!store.ids(INDEX).contains(&"4".to_string()));
}

#[tokio::test]
async fn partial_bulk_failure_aborts_strict_run() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    store.fail_item("2");
    let abort = indexer(&store, 3, FailureMode::Strict).run(products(6)).await.expect_err("abort");
    assert_eq!(abort.phase, RunPhase::Flushing);
    assert_eq!(abort.report.imported, 2);
    assert_eq!(abort.report.failed, 1);
    assert_eq!(store.bulk_sizes(), vec![3]);
}

#[tokio::test]
async fn bulk_call_error_is_fatal_even_in_best_effort() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    store.fail_bulk.store(true, Ordering::SeqCst);
    let abort = indexer(&store, 2, FailureMode::BestEffort).run(products(3)).await.expect_err("abort");
    assert!(matches!(abort.error, Error::Store(_)));
    assert_eq!(abort.report.imported, 0);
}

#[tokio::test]
async fn input_read_failure_aborts_best_effort_run() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    let mut records = products(3);
    records.insert(2, Err(Error::Io(std::io::Error::other("disk read failed"))));
    records.push(Ok(product("4", "never read")));

    let abort = indexer(&store, 2, FailureMode::BestEffort).run(records).await.expect_err("abort");
    assert_eq!(abort.phase, RunPhase::Streaming);
    assert_eq!(abort.report.phase, RunPhase::Failed);
    assert_eq!(abort.report.skipped, 0);
    assert_eq!(abort.report.imported, 2);
    assert!(matches!(abort.error, Error::Io(_)));
    assert!(!store.ids(INDEX).contains(&"4".to_string()));
}

#[tokio::test]
async fn index_dimension_mismatch_stops_before_any_write() {
    let store = Arc::new(MemoryStore::with_index(INDEX, 8));
    let abort = indexer(&store, 2, FailureMode::BestEffort).run(products(3)).await.expect_err("abort");
    assert!(matches!(abort.error, Error::DimensionMismatch { expected: 8, actual: DIM, .. }));
    assert!(store.bulk_sizes().is_empty());
}

#[tokio::test]
async fn short_vector_stops_before_its_batch_is_written() {
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    let embedder = FlakyEmbedder { inner: FakeEmbedder::new(DIM), trigger: "item4 ", short_vector: true };
    let indexer = BatchIndexer::new(store.clone(), Arc::new(embedder), INDEX, 3, FailureMode::BestEffort);

    let abort = indexer.run(products(5)).await.expect_err("abort");
    assert!(matches!(abort.error, Error::DimensionMismatch { actual, .. } if actual == DIM - 1));
    // The first full batch was committed; the one holding item 4 never was.
    assert_eq!(store.bulk_sizes(), vec![3]);
    assert_eq!(abort.report.imported, 3);
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.store.index_name = INDEX.to_string();
    config.store.readiness = RetryPolicy::fixed(1, Duration::from_millis(1));
    config.indexer.batch_size = 2;
    config
}

fn write_csv(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("products.csv");
    std::fs::write(
        &path,
        "id,title,description,category,price\n\
         1,Air Max,running shoe,Shoes,5400\n\
         2,iPhone,smartphone,Electronics,42000\n\
         3,Mouse,ergonomic mouse,Accessories,abc\n\
         4,Grinder,coffee grinder,Kitchen,2500\n",
    )
    .expect("write csv");
    path
}

#[tokio::test]
async fn import_run_resets_and_counts() {
    let tmp = tempfile::tempdir().expect("tmp");
    let path = write_csv(&tmp);
    let store = Arc::new(MemoryStore::new());
    let run = ImportRun::new(store.clone(), Arc::new(FakeEmbedder::new(DIM)), &fast_config());

    let report = run.run(&path).await.expect("first run");
    assert_eq!(report.total, 4);
    assert_eq!(report.imported, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.phase, RunPhase::Done);
    assert_eq!(store.index_dimension(INDEX).await.unwrap(), Some(DIM));

    // Resetting again leaves the same document count, not double.
    let again = run.run(&path).await.expect("second run");
    assert_eq!(again.imported, 3);
    assert_eq!(store.count(INDEX).await.unwrap(), 3);
}

#[tokio::test]
async fn import_run_without_reset_keeps_existing_documents() {
    let tmp = tempfile::tempdir().expect("tmp");
    let path = write_csv(&tmp);
    let store = Arc::new(MemoryStore::with_index(INDEX, DIM));
    store.insert_raw(INDEX, shopsearch_core::types::IndexedDocument::from_record(product("99", "legacy"), vec![0.1; DIM]));

    let run = ImportRun::new(store.clone(), Arc::new(FakeEmbedder::new(DIM)), &fast_config()).reset(false);
    run.run(&path).await.expect("run");
    assert_eq!(store.count(INDEX).await.unwrap(), 4);
}

#[tokio::test]
async fn import_run_missing_file_fails_while_counting() {
    let tmp = tempfile::tempdir().expect("tmp");
    let store = Arc::new(MemoryStore::new());
    let run = ImportRun::new(store.clone(), Arc::new(FakeEmbedder::new(DIM)), &fast_config());

    let abort = run.run(&tmp.path().join("missing.csv")).await.expect_err("abort");
    assert_eq!(abort.phase, RunPhase::CountingInput);
    assert!(matches!(abort.error, Error::InputMissing(_)));
    assert!(!store.index_exists(INDEX).await.unwrap());
}

#[tokio::test]
async fn import_run_strict_mode_aborts_on_bad_row() {
    let tmp = tempfile::tempdir().expect("tmp");
    let path = write_csv(&tmp);
    let store = Arc::new(MemoryStore::new());
    let run = ImportRun::new(store.clone(), Arc::new(FakeEmbedder::new(DIM)), &fast_config())
        .failure_mode(FailureMode::Strict);

    let abort = run.run(&path).await.expect_err("abort");
    assert!(matches!(abort.error, Error::InvalidRecord { line: 4, .. }));
    assert_eq!(abort.report.imported, 2);
}
