//! End-to-end orchestration of a translation run
//!
//! For every file: load cache → plan → batch → translate concurrently →
//! validate → commit → save cache → write output. Files run in parallel and
//! share one pool of translator permits. Workers only talk to the translator;
//! the per-file coordinator owns the cache mapping and is the only task that
//! changes it.

use crate::batcher::{Batch, make_batches};
use crate::cache::CacheStore;
use crate::committer::Committer;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::mt::{
    MachineTranslator, MtError, MtResult, RetryPolicy, TranslationItem, TranslationRequest,
    translate_with_retry,
};
use crate::planner::{TranslateReason, plan};
use crate::record::SourceRecord;
use crate::resource::ResourceFile;
use crate::validator::{TranslationResult, Validator};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to one file during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub file: String,
    pub lines: usize,
    pub reused: usize,
    pub translated: usize,
    pub changed: usize,
    pub accepted: usize,
    pub fallback: usize,
    pub orphans: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// Source file was missing
    pub skipped: bool,
    /// Cancelled before every line was resolved; output not written
    pub interrupted: bool,
    pub written: bool,
    pub error: Option<String>,
}

impl FileReport {
    fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            ..Self::default()
        }
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.error {
            return write!(f, "{}: FAILED ({})", self.file, err);
        }
        if self.skipped {
            return write!(f, "{}: skipped (not found)", self.file);
        }
        write!(
            f,
            "{}: {} lines, {} cached, {} translated ({} changed), {} accepted, {} fallback, {} orphaned",
            self.file,
            self.lines,
            self.reused,
            self.translated,
            self.changed,
            self.accepted,
            self.fallback,
            self.orphans
        )?;
        if self.interrupted {
            write!(f, " [interrupted]")?;
        }
        Ok(())
    }
}

/// Reports for every file of a run, in configured order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn accepted(&self) -> usize {
        self.files.iter().map(|f| f.accepted).sum()
    }

    pub fn fallback(&self) -> usize {
        self.files.iter().map(|f| f.fallback).sum()
    }

    pub fn reused(&self) -> usize {
        self.files.iter().map(|f| f.reused).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.error.is_some())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn file(&self, name: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.file == name)
    }
}

/// Outcome a worker hands back to its file's coordinator
struct BatchOutcome {
    batch: Batch,
    /// `None` when the batch was never sent because the run was cancelled
    result: Option<MtResult<Vec<String>>>,
}

#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    translator: Arc<dyn MachineTranslator>,
    validator: Arc<Validator>,
    store: Arc<CacheStore>,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Validate `config` and open the cache store
    pub fn new(config: PipelineConfig, translator: Arc<dyn MachineTranslator>) -> Result<Self> {
        config.validate()?;
        let store = CacheStore::open(&config.cache_dir, &config.target_language)?;

        Ok(Self {
            validator: Arc::new(Validator::new(config.validation.clone())),
            store: Arc::new(store),
            permits: Arc::new(Semaphore::new(config.parallelism_limit)),
            retry: config.retry_policy(),
            translator,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token that stops the run from dispatching further batches
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive cancellation from an externally owned token
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process every configured file concurrently
    ///
    /// A failing file is recorded in its report; it never aborts the others.
    pub async fn run(&self) -> RunSummary {
        let files = self.config.files_to_process();
        info!(
            files = files.len(),
            target_language = %self.config.target_language,
            model = %self.config.model,
            provider = self.translator.provider_name(),
            "starting translation run"
        );

        let mut tasks = JoinSet::new();
        for (position, file) in files.iter().enumerate() {
            let pipeline = self.clone();
            let file = file.clone();
            tasks.spawn(async move {
                let report = match pipeline.process_file(&file).await {
                    Ok(report) => report,
                    Err(e) => {
                        error!(file = %file, error = %e, "file failed");
                        FileReport {
                            error: Some(e.to_string()),
                            ..FileReport::new(&file)
                        }
                    }
                };
                (position, report)
            });
        }

        let mut reports: Vec<(usize, FileReport)> = Vec::with_capacity(files.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => reports.push(entry),
                Err(e) => error!(error = %e, "file task panicked"),
            }
        }
        // Panicked tasks lose their report; put a failure in its place
        for (position, file) in files.iter().enumerate() {
            if !reports.iter().any(|(p, _)| *p == position) {
                reports.push((
                    position,
                    FileReport {
                        error: Some("file task panicked".to_string()),
                        ..FileReport::new(file)
                    },
                ));
            }
        }
        reports.sort_by_key(|(position, _)| *position);

        let summary = RunSummary {
            files: reports.into_iter().map(|(_, report)| report).collect(),
        };
        info!(
            accepted = summary.accepted(),
            fallback = summary.fallback(),
            reused = summary.reused(),
            failed_files = summary.failed().count(),
            "translation run finished"
        );
        summary
    }

    /// Run the whole pipeline for a single source file
    pub async fn process_file(&self, file: &str) -> Result<FileReport> {
        let mut report = FileReport::new(file);
        if self.cancel.is_cancelled() {
            report.interrupted = true;
            return Ok(report);
        }

        let source_path = self.config.source_path(file);
        if !source_path.exists() {
            warn!(file, path = %source_path.display(), "source file not found, skipping");
            report.skipped = true;
            return Ok(report);
        }

        let resource = ResourceFile::read(&source_path)?;
        let records = resource.records();
        let lang = self.store.target_language();

        let mut cache = self.store.load_or_recover(file)?;
        let plan = plan(&records, &cache, lang);
        let batches = make_batches(plan.to_translate(), self.config.batch_limits());

        report.lines = records.len();
        report.reused = plan.reuse_count();
        report.translated = plan.translate_count();
        report.changed = plan.count_reason(TranslateReason::SourceChanged);
        report.orphans = plan.orphans.len();
        report.batches = batches.len();
        if !plan.orphans.is_empty() {
            debug!(file, orphans = ?plan.orphans, "cached keys no longer in source");
        }
        info!(
            file,
            lines = report.lines,
            reused = report.reused,
            translate = report.translated,
            batches = report.batches,
            "planned"
        );

        let (mut workers, mut in_flight) = self.dispatch(file, batches);

        let (output, complete) = {
            let mut committer = Committer::new(&mut cache, lang, &self.config.model);
            while let Some(joined) = workers.join_next_with_id().await {
                let resolved = match joined {
                    Ok((id, outcome)) => {
                        in_flight.remove(&id);
                        self.resolve(file, outcome, &mut report)
                    }
                    Err(e) => {
                        error!(file, error = %e, "batch worker panicked");
                        in_flight.remove(&e.id()).map(|batch| {
                            let err = MtError::Unavailable(format!("batch worker panicked: {e}"));
                            self.fail_batch(file, batch, err, &mut report)
                        })
                    }
                };
                if let Some(results) = resolved {
                    committer.commit_all(results);
                }
            }

            let stats = committer.stats();
            report.accepted = stats.accepted;
            report.fallback = stats.fallback;
            (committer.assemble(&plan), committer.is_complete(&plan))
        };

        self.store.save(&cache)?;

        if !complete || self.cancel.is_cancelled() {
            report.interrupted = true;
            warn!(file, "run interrupted, output not written");
            return Ok(report);
        }

        let output_path = self.config.output_path(file);
        resource.write(&output_path, &output)?;
        report.written = true;
        info!(
            file,
            path = %output_path.display(),
            accepted = report.accepted,
            fallback = report.fallback,
            "output written"
        );
        Ok(report)
    }

    /// Spawn one worker per batch; each waits for a run-wide permit
    ///
    /// The returned map keeps a copy of every batch by task id so that a
    /// worker which panics can still have its lines resolved.
    fn dispatch(
        &self,
        file: &str,
        batches: Vec<Batch>,
    ) -> (JoinSet<BatchOutcome>, HashMap<Id, Batch>) {
        let mut workers = JoinSet::new();
        let mut in_flight = HashMap::with_capacity(batches.len());
        for batch in batches {
            let kept = batch.clone();
            let request = self.request_for(&batch.records);
            let translator = Arc::clone(&self.translator);
            let permits = Arc::clone(&self.permits);
            let cancel = self.cancel.clone();
            let retry = self.retry;
            let file = file.to_string();

            let handle = workers.spawn(async move {
                let permit = tokio::select! {
                    _ = cancel.cancelled() => None,
                    permit = permits.acquire_owned() => permit.ok(),
                };
                if permit.is_none() || cancel.is_cancelled() {
                    return BatchOutcome {
                        batch,
                        result: None,
                    };
                }

                debug!(
                    file = %file,
                    batch = batch.index,
                    lines = batch.len(),
                    chars = batch.char_count(),
                    "sending batch"
                );
                let result =
                    translate_with_retry(translator.as_ref(), &request, &retry, &cancel).await;
                BatchOutcome {
                    batch,
                    result: Some(result),
                }
            });
            in_flight.insert(handle.id(), kept);
        }
        (workers, in_flight)
    }

    fn request_for(&self, records: &[SourceRecord]) -> TranslationRequest {
        let items = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let mut item = TranslationItem::new(i.to_string(), record.text.clone());
                if let Some(context) = &record.context {
                    item = item.with_context(context.clone());
                }
                if let Some(budget) = self.validator.budget_for(&record.text) {
                    item = item.with_budget(budget);
                }
                item
            })
            .collect();

        TranslationRequest {
            items,
            target_language: self.config.target_language.clone(),
            model: self.config.model.clone(),
        }
    }

    /// Turn a worker's outcome into per-line results
    ///
    /// Returns `None` for batches that should stay unresolved (never sent, or
    /// cut short by cancellation).
    fn resolve(
        &self,
        file: &str,
        outcome: BatchOutcome,
        report: &mut FileReport,
    ) -> Option<Vec<TranslationResult>> {
        let BatchOutcome { batch, result } = outcome;
        let index = batch.index;

        let outputs = match result? {
            Ok(outputs) => outputs,
            Err(_) if self.cancel.is_cancelled() => {
                debug!(file, batch = index, "batch abandoned after cancellation");
                return None;
            }
            Err(e) => return Some(self.fail_batch(file, batch, e, report)),
        };

        if outputs.len() != batch.len() {
            let err = MtError::BatchLengthMismatch {
                expected: batch.len(),
                actual: outputs.len(),
            };
            return Some(self.fail_batch(file, batch, err, report));
        }

        let results = self.validator.validate_batch(batch.records, outputs);
        debug!(
            file,
            batch = index,
            accepted = results.iter().filter(|r| r.accepted()).count(),
            "batch validated"
        );
        Some(results)
    }

    fn fail_batch(
        &self,
        file: &str,
        batch: Batch,
        err: MtError,
        report: &mut FileReport,
    ) -> Vec<TranslationResult> {
        report.failed_batches += 1;
        warn!(
            file,
            batch = batch.index,
            lines = batch.len(),
            error = %err,
            "batch failed, falling back to source text"
        );
        let message = err.to_string();
        batch
            .records
            .into_iter()
            .map(|record| TranslationResult::batch_failed(record, message.clone()))
            .collect()
    }
}
