//! Batch indexing of product records.
//!
//! [`BatchIndexer`] embeds records one at a time and writes them with bulk
//! upserts of at most `batch_size` documents; [`ImportRun`] drives a complete
//! import from a CSV file through the phases of [`RunPhase`].

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use shopsearch_core::config::{Config, FailureMode};
use shopsearch_core::error::{Error, Result};
use shopsearch_core::retry::RetryPolicy;
use shopsearch_core::source::CsvRecordSource;
use shopsearch_core::traits::{Embedder, VectorStore};
use shopsearch_core::types::{AnnConfig, IndexSchema, IndexedDocument, ProductRecord};

use crate::schema_manager::SchemaManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    CountingInput,
    ResettingIndex,
    Streaming,
    BatchFull,
    Flushing,
    FinalFlush,
    BuildingIndexes,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
    /// Records in the input, or records seen when the input was not counted.
    pub total: u64,
    pub imported: u64,
    pub skipped: u64,
    pub failed: u64,
    pub batches: u64,
    pub ann_index: bool,
    pub phase: RunPhase,
    pub elapsed: Duration,
}

impl Default for IndexReport {
    fn default() -> Self {
        Self {
            total: 0,
            imported: 0,
            skipped: 0,
            failed: 0,
            batches: 0,
            ann_index: false,
            phase: RunPhase::Init,
            elapsed: Duration::ZERO,
        }
    }
}

/// A fatal error together with the progress made before it. Documents counted
/// in `report.imported` are committed and stay in the index.
#[derive(Debug, thiserror::Error)]
#[error("indexing aborted during {phase:?} with {} documents committed: {error}", .report.imported)]
pub struct IndexAbort {
    pub phase: RunPhase,
    pub report: IndexReport,
    #[source]
    pub error: Error,
}

fn abort(mut report: IndexReport, phase: RunPhase, started: Instant, error: Error) -> IndexAbort {
    report.phase = RunPhase::Failed;
    report.elapsed = started.elapsed();
    error!(?phase, imported = report.imported, error = %error, "indexing aborted");
    IndexAbort { phase, report, error }
}

pub struct BatchIndexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    index: String,
    batch_size: usize,
    mode: FailureMode,
    progress: ProgressBar,
}

impl BatchIndexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        index: impl Into<String>,
        batch_size: usize,
        mode: FailureMode,
    ) -> Self {
        Self { store, embedder, index: index.into(), batch_size: batch_size.max(1), mode, progress: ProgressBar::hidden() }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Indexes `records` into an existing index.
    pub async fn run<I>(&self, records: I) -> std::result::Result<IndexReport, IndexAbort>
    where
        I: IntoIterator<Item = Result<ProductRecord>>,
    {
        self.run_with(records, IndexReport::default(), Instant::now()).await
    }

    pub(crate) async fn run_with<I>(
        &self,
        records: I,
        mut report: IndexReport,
        started: Instant,
    ) -> std::result::Result<IndexReport, IndexAbort>
    where
        I: IntoIterator<Item = Result<ProductRecord>>,
    {
        let dim = match self.store.index_dimension(&self.index).await {
            Ok(Some(dim)) => dim,
            Ok(None) => return Err(abort(report, RunPhase::Streaming, started, Error::NotFound(format!("index '{}'", self.index)))),
            Err(e) => return Err(abort(report, RunPhase::Streaming, started, e)),
        };
        if dim != self.embedder.dim() {
            let mismatch = Error::DimensionMismatch { index: self.index.clone(), expected: dim, actual: self.embedder.dim() };
            return Err(abort(report, RunPhase::Streaming, started, mismatch));
        }

        report.phase = RunPhase::Streaming;
        info!(index = %self.index, batch_size = self.batch_size, mode = ?self.mode, "streaming records");
        let mut batch: Vec<IndexedDocument> = Vec::with_capacity(self.batch_size);
        let mut seen = 0u64;

        for item in records {
            seen += 1;
            self.progress.inc(1);
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    if let Err(e) = self.skip_or_fail(&mut report, e) {
                        return Err(abort(report, RunPhase::Streaming, started, e));
                    }
                    continue;
                }
            };
            let vector = match self.embedder.embed(&record.embedding_text()) {
                Ok(vector) => vector,
                Err(e) => {
                    let e = Error::Embedding(format!("record '{}': {e:#}", record.id));
                    if let Err(e) = self.skip_or_fail(&mut report, e) {
                        return Err(abort(report, RunPhase::Streaming, started, e));
                    }
                    continue;
                }
            };
            if vector.len() != dim {
                let mismatch = Error::DimensionMismatch { index: self.index.clone(), expected: dim, actual: vector.len() };
                return Err(abort(report, RunPhase::Streaming, started, mismatch));
            }
            batch.push(IndexedDocument::from_record(record, vector));

            if batch.len() >= self.batch_size {
                report.phase = RunPhase::BatchFull;
                if let Err(e) = self.flush(&mut batch, &mut report).await {
                    return Err(abort(report, RunPhase::Flushing, started, e));
                }
                report.phase = RunPhase::Streaming;
            }
        }

        report.phase = RunPhase::FinalFlush;
        if !batch.is_empty() {
            if let Err(e) = self.flush(&mut batch, &mut report).await {
                return Err(abort(report, RunPhase::FinalFlush, started, e));
            }
        }

        report.total = report.total.max(seen);
        report.phase = RunPhase::Done;
        report.elapsed = started.elapsed();
        Ok(report)
    }

    fn skip_or_fail(&self, report: &mut IndexReport, error: Error) -> Result<()> {
        if self.mode == FailureMode::Strict || !error.is_record_level() {
            return Err(error);
        }
        report.skipped += 1;
        warn!(error = %error, skipped = report.skipped, "skipping record");
        self.update_message(report);
        Ok(())
    }

    async fn flush(&self, batch: &mut Vec<IndexedDocument>, report: &mut IndexReport) -> Result<()> {
        let docs = std::mem::replace(batch, Vec::with_capacity(self.batch_size));
        if report.phase == RunPhase::BatchFull {
            report.phase = RunPhase::Flushing;
        }
        let response = self.store.bulk_upsert(&self.index, &docs).await?;
        report.batches += 1;
        report.imported += response.succeeded() as u64;
        let failed = response.failed() as u64;
        report.failed += failed;
        for item in response.failures() {
            warn!(id = %item.id, error = item.error.as_deref().unwrap_or_default(), "bulk item failed");
        }
        info!(batch = report.batches, size = docs.len(), imported = report.imported, failed = report.failed, "flushed batch");
        self.update_message(report);
        if failed > 0 && self.mode == FailureMode::Strict {
            return Err(Error::Store(format!("{failed} of {} documents in batch {} failed", docs.len(), report.batches)));
        }
        Ok(())
    }

    fn update_message(&self, report: &IndexReport) {
        self.progress.set_message(format!(
            "imported {} | skipped {} | failed {}",
            report.imported, report.skipped, report.failed
        ));
    }
}

/// A complete CSV import: readiness check, row count, index reset, streaming,
/// final flush and secondary index build.
pub struct ImportRun {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    index: String,
    ann: AnnConfig,
    batch_size: usize,
    mode: FailureMode,
    readiness: RetryPolicy,
    reset: bool,
    show_progress: bool,
}

impl ImportRun {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, config: &Config) -> Self {
        Self {
            store,
            embedder,
            index: config.store.index_name.clone(),
            ann: config.ann.clone(),
            batch_size: config.indexer.batch_size,
            mode: config.indexer.failure_mode,
            readiness: config.store.readiness.clone(),
            reset: true,
            show_progress: false,
        }
    }

    /// With `false` the existing index is kept (created when missing) and
    /// records are upserted into it.
    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.mode = mode;
        self
    }

    pub async fn run(&self, path: &Path) -> std::result::Result<IndexReport, IndexAbort> {
        let started = Instant::now();
        let mut report = IndexReport::default();

        if let Err(e) = self.readiness.wait_for_store(self.store.as_ref()).await {
            return Err(abort(report, RunPhase::Init, started, e));
        }

        report.phase = RunPhase::CountingInput;
        let (source, total) = match CsvRecordSource::open(path).and_then(|s| s.count().map(|n| (s, n))) {
            Ok(counted) => counted,
            Err(e) => return Err(abort(report, RunPhase::CountingInput, started, e)),
        };
        report.total = total;
        info!(path = %path.display(), total, "counted input rows");

        report.phase = RunPhase::ResettingIndex;
        let schema = match self.prepare_index().await {
            Ok(schema) => schema,
            Err(e) => return Err(abort(report, RunPhase::ResettingIndex, started, e)),
        };

        let records = match source.records() {
            Ok(records) => records,
            Err(e) => return Err(abort(report, RunPhase::Streaming, started, e)),
        };
        let progress = self.progress_bar(total);
        let indexer = BatchIndexer::new(self.store.clone(), self.embedder.clone(), &self.index, self.batch_size, self.mode)
            .with_progress(progress.clone());
        let mut report = match indexer.run_with(records, report, started).await {
            Ok(report) => report,
            Err(aborted) => {
                progress.abandon();
                return Err(aborted);
            }
        };
        progress.finish_with_message(format!(
            "imported {} | skipped {} | failed {}",
            report.imported, report.skipped, report.failed
        ));

        report.phase = RunPhase::BuildingIndexes;
        match self.store.build_indexes(&schema).await {
            Ok(built) => report.ann_index = built,
            Err(e) => warn!(index = %self.index, error = %e, "secondary index build failed; searches fall back to flat scan"),
        }

        report.phase = RunPhase::Done;
        report.elapsed = started.elapsed();
        info!(
            index = %self.index,
            total = report.total,
            imported = report.imported,
            skipped = report.skipped,
            failed = report.failed,
            batches = report.batches,
            elapsed = ?report.elapsed,
            "import finished"
        );
        Ok(report)
    }

    async fn prepare_index(&self) -> Result<IndexSchema> {
        let manager = SchemaManager::new(self.store.clone());
        let dim = self.embedder.dim();
        if self.reset || !manager.exists(&self.index).await? {
            return manager.reset_index(&self.index, dim, self.ann.clone()).await;
        }
        manager.ensure_dimension(&self.index, dim).await?;
        Ok(IndexSchema::products(&self.index, dim, self.ann.clone()))
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} products ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
