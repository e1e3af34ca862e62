use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use super::error::PipelineError;
use super::merge;
use super::types::{GroupFailure, ProgressUpdate, RunOptions, RunSummary, StopFlag};
use crate::batching::{CompletedGroup, CrowdPenalty, InferenceBatcher};
use crate::cache::ResultStore;
use crate::classifier::PatchClassifier;
use crate::detection::{self, DetectionParameters, Extraction, ExtractionError, GroupPaths};
use crate::hashing::{ParamsHash, params_hash};
use crate::storage::{CacheRecord, RecordStatus};

type StageResult = (String, Result<Extraction, ExtractionError>);

/// Schedules stage A, feeds the batcher and writes every finished group through the store.
///
/// The orchestrator is the only writer of records during a run.
pub struct Pipeline {
    store: ResultStore,
    classifier: Arc<dyn PatchClassifier>,
    params: Arc<DetectionParameters>,
    options: RunOptions,
    stop: StopFlag,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("stopped", &self.stop.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Mutable state of one run.
struct RunState<'a> {
    hash: ParamsHash,
    summary: RunSummary,
    progress: &'a mut (dyn FnMut(ProgressUpdate) + Send),
}

impl RunState<'_> {
    fn report(&mut self, label: String) {
        (self.progress)(ProgressUpdate {
            processed: self.summary.finished(),
            total: self.summary.total,
            label,
        });
    }
}

impl Pipeline {
    pub fn new(
        store: ResultStore,
        classifier: Arc<dyn PatchClassifier>,
        params: DetectionParameters,
        options: RunOptions,
    ) -> Self {
        Self {
            store,
            classifier,
            params: Arc::new(params),
            options,
            stop: StopFlag::new(),
        }
    }

    /// Handle for cancelling a run from another task.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn params(&self) -> &DetectionParameters {
        &self.params
    }

    /// Processes every group once, in name order.
    #[instrument(skip_all, fields(groups = groups.len(), workers = self.options.workers))]
    pub async fn run<F>(
        &self,
        groups: &BTreeMap<String, GroupPaths>,
        mut on_progress: F,
    ) -> Result<RunSummary, PipelineError>
    where
        F: FnMut(ProgressUpdate) + Send,
    {
        self.params.validate()?;

        let mut state = RunState {
            hash: params_hash(&self.params),
            summary: RunSummary::new(groups.len()),
            progress: &mut on_progress,
        };
        let mut tasks: JoinSet<StageResult> = JoinSet::new();

        let outcome = self.drive(groups, &mut tasks, &mut state).await;
        if let Err(ref e) = outcome {
            tasks.abort_all();
            error!(error = %e, "Run aborted");
        }
        outcome?;

        let summary = state.summary;
        info!(
            processed = summary.processed,
            cache_hits = summary.cache_hits,
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            cancelled = summary.cancelled,
            "Run finished"
        );
        Ok(summary)
    }

    async fn drive(
        &self,
        groups: &BTreeMap<String, GroupPaths>,
        tasks: &mut JoinSet<StageResult>,
        state: &mut RunState<'_>,
    ) -> Result<(), PipelineError> {
        let workers = self.options.workers.max(1);
        let mut batcher = InferenceBatcher::new(
            Arc::clone(&self.classifier),
            self.options.infer_chunk,
            CrowdPenalty::from_params(&self.params),
        );

        for (name, paths) in groups {
            if self.stop.is_stopped() {
                state.summary.cancelled = true;
                break;
            }

            if let Some(record) = self.cached(name, &state.hash) {
                debug!(group = %name, "Reusing cached record");
                state.summary.cache_hits += 1;
                state.summary.results.insert(name.clone(), record);
                state.report(format!("cached: {name}"));
                continue;
            }

            while tasks.len() >= workers {
                let Some(joined) = tasks.join_next().await else {
                    break;
                };
                batcher = self.absorb(joined, batcher, state).await?;
            }

            if self.stop.is_stopped() {
                state.summary.cancelled = true;
                break;
            }

            let params = Arc::clone(&self.params);
            let (name, paths) = (name.clone(), paths.clone());
            tasks.spawn_blocking(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    detection::extract_features(&name, &paths, &params)
                }))
                .unwrap_or_else(|_| {
                    Err(ExtractionError::Failed {
                        reason: "stage A panicked".to_string(),
                    })
                });
                (name, result)
            });
        }

        while !tasks.is_empty() {
            if self.stop.is_stopped() {
                state.summary.cancelled = true;
                tasks.abort_all();
                break;
            }
            let Some(joined) = tasks.join_next().await else {
                break;
            };
            batcher = self.absorb(joined, batcher, state).await?;
        }

        if state.summary.cancelled {
            warn!(
                pending = batcher.pending_len(),
                open_groups = batcher.open_groups(),
                "Run cancelled, unscored groups are not persisted"
            );
            return Ok(());
        }

        let (batcher, completed) = flush_off_thread(batcher, true).await?;
        for group in completed {
            self.persist(group, state)?;
        }

        let stats = batcher.stats();
        debug!(
            chunks = stats.chunks,
            patches = stats.patches,
            penalized_groups = stats.penalized_groups,
            "Inference finished"
        );
        Ok(())
    }

    /// Returns the stored record if it can stand in for a recomputation.
    fn cached(&self, name: &str, hash: &ParamsHash) -> Option<CacheRecord> {
        match self.store.get(name) {
            Ok(Some(record)) if record.is_authoritative_for(hash) => Some(record),
            Ok(_) => None,
            Err(e) => {
                warn!(group = %name, error = %e, "Stored record unreadable, recomputing");
                None
            }
        }
    }

    /// Routes one finished stage-A task into the batcher and persists any completed groups.
    async fn absorb(
        &self,
        joined: Result<StageResult, JoinError>,
        mut batcher: InferenceBatcher,
        state: &mut RunState<'_>,
    ) -> Result<InferenceBatcher, PipelineError> {
        let (name, result) = joined?;

        let extraction = match result {
            Ok(extraction) => extraction,
            Err(e) => {
                let failure = GroupFailure {
                    group: name.clone(),
                    error: e.to_string(),
                };
                if e.is_input_error() {
                    warn!(group = %name, error = %e, "Skipping group with unreadable input");
                    state.summary.skipped.push(failure);
                    state.report(format!("skipped: {name}"));
                } else {
                    warn!(group = %name, error = %e, "Feature extraction failed");
                    state.summary.failed.push(failure);
                    state.report(format!("failed: {name}"));
                }
                return Ok(batcher);
            }
        };

        if let Some(group) = batcher.submit(extraction) {
            self.persist(group, state)?;
        }

        if batcher.should_flush() {
            let (returned, completed) = flush_off_thread(batcher, false).await?;
            batcher = returned;
            for group in completed {
                self.persist(group, state)?;
            }
        }

        Ok(batcher)
    }

    /// Merges curated history into a scored group and writes it.
    fn persist(&self, group: CompletedGroup, state: &mut RunState<'_>) -> Result<(), PipelineError> {
        let previous = self.store.get(&group.name).unwrap_or_else(|e| {
            warn!(group = %group.name, error = %e, "Previous record unreadable, dropping its curated candidates");
            None
        });

        let n_scored = group.candidates.len();
        let candidates = merge::reconcile(group.candidates, previous.as_ref());
        let record = CacheRecord::new(
            RecordStatus::Unseen,
            candidates,
            Some(group.crop_rect),
            state.hash,
        );

        debug!(
            group = %group.name,
            n_raw = group.n_raw,
            n_scored,
            n_final = record.candidates_count,
            max_ai = record.max_ai,
            "Persisting group"
        );

        self.store.put(&group.name, record.clone())?;
        state.summary.processed += 1;
        state.summary.results.insert(group.name.clone(), record);
        state.report(format!("scored: {}", group.name));
        Ok(())
    }
}

/// Runs a flush on the blocking pool; the classifier never executes on an async worker.
async fn flush_off_thread(
    mut batcher: InferenceBatcher,
    force: bool,
) -> Result<(InferenceBatcher, Vec<CompletedGroup>), PipelineError> {
    let (batcher, result) = tokio::task::spawn_blocking(move || {
        let result = batcher.flush(force);
        (batcher, result)
    })
    .await?;
    Ok((batcher, result?))
}
