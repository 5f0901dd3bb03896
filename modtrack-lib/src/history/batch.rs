use super::{HistoryRecord, HistoryTracker, Progress, RepositoryProbe, TrackOptions};
use crate::Result;
use crate::checkpoint::{CheckpointMetadata, CheckpointStore, Checkpointer, SaveStrategy};
use crate::model::{HistoryKey, ModuleKey, VersionSequence};
use chrono::Utc;
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use ohno::EnrichableExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use strum::{Display, EnumString};

const LOG_TARGET: &str = "   history";

/// What to do when the governor reports that a batch would exhaust the quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QuotaPolicy {
    /// Sleep until the quota resets, then carry on.
    #[default]
    Wait,

    /// Checkpoint and return, leaving the rest for a later resume.
    Stop,

    /// Ignore the warning.
    Proceed,
}

/// Settings for [`HistoryTracker::first_appearance_batch`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Checkpoint key. Reusing an id resumes the earlier run.
    pub operation_id: String,
    pub checkpoints: CheckpointStore,
    pub strategy: SaveStrategy,

    /// Delete the checkpoint once every module has been processed.
    pub auto_cleanup: bool,

    pub track: TrackOptions,

    /// Upper bound on modules per batch. The governor may shrink it.
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub on_quota_exhausted: QuotaPolicy,
}

impl BatchOptions {
    #[must_use]
    pub fn new(operation_id: impl Into<String>, checkpoints: CheckpointStore) -> Self {
        Self {
            operation_id: operation_id.into(),
            checkpoints,
            strategy: SaveStrategy::Progress(10),
            auto_cleanup: true,
            track: TrackOptions::default(),
            batch_size: 20,
            batch_pause: Duration::ZERO,
            on_quota_exhausted: QuotaPolicy::Wait,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Complete,

    /// Stopped early to protect the quota. Rerun with the same operation id to resume.
    Suspended { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Records of every processed module, including those restored from the checkpoint.
    pub records: Vec<HistoryRecord>,
    pub status: BatchStatus,
}

impl BatchReport {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.status, BatchStatus::Complete)
    }
}

/// Checkpointed state of a batch run.
///
/// `processed` holds file paths; a path without a matching record is refilled from
/// the history cache on resume.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BatchState {
    #[serde(default)]
    processed: Vec<String>,

    #[serde(default)]
    records: Vec<HistoryRecord>,
}

impl<P: RepositoryProbe> HistoryTracker<P> {
    /// Resolve the first appearance of many modules, in governor-sized batches.
    ///
    /// Progress is checkpointed under `options.operation_id`; a rerun with the same id
    /// skips modules that were already processed. A module missing at HEAD is
    /// recorded as unresolved and the run continues. A failing external call saves
    /// a checkpoint and aborts the run.
    pub async fn first_appearance_batch(
        &self,
        modules: &[ModuleKey],
        versions: &VersionSequence,
        options: &BatchOptions,
        progress: &dyn Progress,
    ) -> Result<BatchReport> {
        let mut checkpointer = Checkpointer::new(options.checkpoints.clone(), options.strategy.clone(), &options.operation_id);
        let mut state = self.restore(&checkpointer)?;

        let done: HashSet<String> = state.processed.iter().cloned().collect();
        let mut seen = HashSet::new();
        let modules: Vec<&ModuleKey> = modules.iter().filter(|m| seen.insert(*m)).collect();
        self.conventions().ensure_distinct(modules.iter().copied())?;
        let pending: Vec<&ModuleKey> = modules
            .iter()
            .copied()
            .filter(|m| !done.contains(self.history_key(m).file_path()))
            .collect();

        let total = modules.len() as u64;
        let already_done = total - pending.len() as u64;
        let completed = Arc::new(AtomicU64::new(already_done));
        if already_done > 0 {
            let notice = format!("Resuming '{}': {already_done} of {total} modules already processed", options.operation_id);
            log::info!(target: LOG_TARGET, "{notice}");
            progress.println(&notice);
        }

        let counter = Arc::clone(&completed);
        progress.set_phase("History");
        progress.set_determinate(Box::new(move || {
            let current = counter.load(Ordering::Relaxed);
            (total, current, format!("{current}/{total} modules"))
        }));

        let mut errors = 0;
        let per_module = probes_per_module(versions.len(), options.track.resolve_commits);
        let mut remaining = pending.as_slice();

        while !remaining.is_empty() {
            let mut size = self.governor().recommended_batch_size(options.batch_size).min(remaining.len());
            let check = self.governor().check_safety(size as u64 * per_module);

            if !check.safe {
                let suspend = match options.on_quota_exhausted {
                    QuotaPolicy::Wait => match self.wait_for_quota(size, per_module, progress).await {
                        Ok(fits) => {
                            size = fits;
                            None
                        }
                        Err(reason) => Some(reason),
                    },
                    QuotaPolicy::Stop => Some(check.reason),
                    QuotaPolicy::Proceed => {
                        log::warn!(target: LOG_TARGET, "Proceeding despite: {}", check.reason);
                        None
                    }
                };

                if let Some(reason) = suspend {
                    log::warn!(target: LOG_TARGET, "Suspending '{}': {reason}", options.operation_id);
                    let metadata = self.metadata(total, &state, errors);
                    checkpointer.save_now(&reason, &state, metadata)?;
                    progress.done();
                    return Ok(BatchReport {
                        records: state.records,
                        status: BatchStatus::Suspended { reason },
                    });
                }

                progress.set_phase("History");
                let counter = Arc::clone(&completed);
                progress.set_determinate(Box::new(move || {
                    let current = counter.load(Ordering::Relaxed);
                    (total, current, format!("{current}/{total} modules"))
                }));
            }

            let (batch, rest) = remaining.split_at(size);
            log::debug!(target: LOG_TARGET, "Processing batch of {size} modules, {} left after it", rest.len());

            for &module in batch {
                let record = match self.track(module, versions, &options.track).await {
                    Ok(record) => record,
                    Err(e) => {
                        errors += 1;
                        let path = self.history_key(module);
                        let metadata = self.metadata(total, &state, errors);
                        checkpointer.save_now(&format!("error while tracking {module}"), &state, metadata)?;
                        progress.done();
                        return Err(e.enrich_with(|| format!("tracking history of {module} at '{path}'")));
                    }
                };

                if record.is_unresolved() {
                    progress.println(&format!("{module}: file not found at HEAD ({})", record.file_path));
                }

                state.processed.push(record.file_path.file_path().to_string());
                state.records.push(record);
                let _ = completed.fetch_add(1, Ordering::Relaxed);

                checkpointer.record_progress(1);
                let quota_fraction = self.governor().snapshot().map(|q| q.remaining_fraction());
                let metadata = self.metadata(total, &state, errors);
                let _ = checkpointer.maybe_save(&state, metadata, quota_fraction)?;
            }

            remaining = rest;
            if !remaining.is_empty() && !options.batch_pause.is_zero() {
                log::debug!(target: LOG_TARGET, "Pausing {:?} between batches", options.batch_pause);
                tokio::time::sleep(options.batch_pause).await;
            }
        }

        checkpointer.complete(options.auto_cleanup)?;
        progress.done();

        Ok(BatchReport {
            records: state.records,
            status: BatchStatus::Complete,
        })
    }

    fn restore(&self, checkpointer: &Checkpointer) -> Result<BatchState> {
        let Some(checkpoint) = checkpointer.resume()? else {
            return Ok(BatchState::default());
        };

        let mut state: BatchState = match checkpoint.state_as() {
            Ok(state) => state,
            Err(e) => {
                log::warn!(
                    target: LOG_TARGET,
                    "Starting '{}' afresh, its checkpoint state is unusable: {e:#}",
                    checkpointer.operation_id()
                );
                return Ok(BatchState::default());
            }
        };

        let recorded: HashSet<String> = state.records.iter().map(|r| r.file_path.file_path().to_string()).collect();
        let mut processed = Vec::with_capacity(state.processed.len());

        for path in state.processed.drain(..) {
            if recorded.contains(&path) {
                processed.push(path);
                continue;
            }

            match self.cache().get(&HistoryKey::new(path.as_str()))? {
                Some(record) => {
                    state.records.push(record);
                    processed.push(path);
                }
                None => log::debug!(target: LOG_TARGET, "No record for checkpointed path '{path}', it will be tracked again"),
            }
        }

        state.processed = processed;
        Ok(state)
    }

    /// Find a batch size the quota can carry, sleeping through resets until at least one module fits.
    ///
    /// Fails with the reason when the pacing policy does not allow pausing.
    async fn wait_for_quota(&self, size: usize, per_module: u64, progress: &dyn Progress) -> core::result::Result<usize, String> {
        let governor = self.governor();
        loop {
            let check = governor.check_safety(size as u64 * per_module);
            if check.safe {
                return Ok(size);
            }

            if let Some(fits) = (1..size).rev().find(|&n| governor.check_safety(n as u64 * per_module).safe) {
                log::info!(target: LOG_TARGET, "Shrinking batch from {size} to {fits} modules: {}", check.reason);
                return Ok(fits);
            }

            let until_reset = governor.snapshot().map_or(Duration::ZERO, |q| q.until_reset(Utc::now()));
            let pause = until_reset.min(governor.policy().max_pause);
            if pause.is_zero() && !until_reset.is_zero() {
                return Err(format!("{}, and pausing for the reset is disabled", check.reason));
            }

            log::info!(target: LOG_TARGET, "Waiting {pause:?} for the quota to reset: {}", check.reason);
            progress.set_phase("Waiting");
            let secs = pause.as_secs();
            progress.set_indeterminate(Box::new(move || format!("rate limited, resuming in about {secs}s")));
            tokio::time::sleep(pause).await;

            if pause >= until_reset {
                governor.forget_quota();
            }
        }
    }

    fn metadata(&self, total: u64, state: &BatchState, errors: u64) -> CheckpointMetadata {
        let quota = self.governor().snapshot();
        CheckpointMetadata {
            total_items: Some(total),
            processed_items: state.processed.len() as u64,
            error_count: errors,
            quota_remaining: quota.as_ref().map(|q| q.remaining),
            quota_limit: quota.as_ref().map(|q| q.limit),
            tool: Some(env!("CARGO_PKG_NAME").to_string()),
            operation_kind: Some("history".to_string()),
            ..CheckpointMetadata::default()
        }
    }
}

/// Upper bound on the external calls one module can cost.
fn probes_per_module(versions: usize, resolve_commits: bool) -> u64 {
    let search = u64::from(usize::BITS - versions.leading_zeros());
    1 + search + u64::from(resolve_commits)
}
