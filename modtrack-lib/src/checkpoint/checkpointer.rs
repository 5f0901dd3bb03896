use super::{Checkpoint, CheckpointMetadata, CheckpointStore, SaveContext, SaveDecision, SaveStrategy};
use crate::Result;
use serde::Serialize;
use std::time::Instant;

const LOG_TARGET: &str = "checkpoint";

/// Drives checkpointing for one running operation.
///
/// Tracks time and items since the last save and asks the strategy whether the
/// next call to [`maybe_save`](Self::maybe_save) should persist.
#[derive(Debug)]
pub struct Checkpointer {
    store: CheckpointStore,
    strategy: SaveStrategy,
    operation_id: String,
    last_save: Instant,
    items_since_save: u64,
}

impl Checkpointer {
    #[must_use]
    pub fn new(store: CheckpointStore, strategy: SaveStrategy, operation_id: impl Into<String>) -> Self {
        Self {
            store,
            strategy,
            operation_id: operation_id.into(),
            last_save: Instant::now(),
            items_since_save: 0,
        }
    }

    #[must_use]
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// The checkpoint left behind by an earlier, interrupted run.
    pub fn resume(&self) -> Result<Option<Checkpoint>> {
        self.store.load(&self.operation_id)
    }

    pub const fn record_progress(&mut self, items: u64) {
        self.items_since_save += items;
    }

    /// Save if the strategy asks for it. Returns the decision when a save happened.
    pub fn maybe_save<S: Serialize>(
        &mut self,
        state: &S,
        metadata: CheckpointMetadata,
        quota_remaining_fraction: Option<f64>,
    ) -> Result<Option<SaveDecision>> {
        let ctx = SaveContext {
            since_last_save: self.last_save.elapsed(),
            items_since_save: self.items_since_save,
            quota_remaining_fraction,
        };

        let decision = self.strategy.should_save(&ctx);
        if !decision.save {
            return Ok(None);
        }

        self.save_now(&decision.reason, state, metadata)?;
        Ok(Some(decision))
    }

    /// Save unconditionally, e.g. before surfacing an error.
    pub fn save_now<S: Serialize>(&mut self, reason: &str, state: &S, mut metadata: CheckpointMetadata) -> Result<()> {
        metadata.last_save_reason = Some(reason.to_string());
        let _ = self.store.save(&self.operation_id, state, metadata)?;
        log::debug!(target: LOG_TARGET, "Checkpointed '{}': {reason}", self.operation_id);

        self.last_save = Instant::now();
        self.items_since_save = 0;
        Ok(())
    }

    /// Mark the operation complete, deleting its checkpoint when `auto_cleanup` is set.
    pub fn complete(self, auto_cleanup: bool) -> Result<()> {
        if auto_cleanup {
            let _ = self.store.finalize(&self.operation_id)?;
        } else {
            log::debug!(target: LOG_TARGET, "Keeping checkpoint '{}' after completion", self.operation_id);
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use core::time::Duration;

    fn meta(processed: u64) -> CheckpointMetadata {
        CheckpointMetadata {
            processed_items: processed,
            ..CheckpointMetadata::default()
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn saves_when_strategy_fires() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        let mut cp = Checkpointer::new(store.clone(), SaveStrategy::Progress(3), "op");

        for i in 1..=2 {
            cp.record_progress(1);
            assert!(cp.maybe_save(&i, meta(i), None).unwrap().is_none());
        }
        assert!(store.load("op").unwrap().is_none());

        cp.record_progress(1);
        let decision = cp.maybe_save(&3, meta(3), None).unwrap().unwrap();
        assert!(decision.reason.starts_with("progress"));

        let saved = store.load("op").unwrap().unwrap();
        assert_eq!(saved.metadata.processed_items, 3);
        assert_eq!(saved.metadata.last_save_reason.as_deref(), Some(decision.reason.as_str()));

        // counter restarts after a save
        cp.record_progress(1);
        assert!(cp.maybe_save(&4, meta(4), None).unwrap().is_none());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn quota_strategy_uses_supplied_fraction() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cp = Checkpointer::new(CheckpointStore::new(tmp.path()), SaveStrategy::Quota(0.2), "op");

        assert!(cp.maybe_save(&(), meta(0), Some(0.5)).unwrap().is_none());
        assert!(cp.maybe_save(&(), meta(0), Some(0.1)).unwrap().is_some());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn resume_sees_previous_run() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        let mut first = Checkpointer::new(store.clone(), SaveStrategy::Interval(Duration::from_secs(3600)), "op");
        first.save_now("interrupted", &vec!["a", "b"], meta(2)).unwrap();
        drop(first);

        let second = Checkpointer::new(store, SaveStrategy::Interval(Duration::from_secs(3600)), "op");
        let checkpoint = second.resume().unwrap().unwrap();
        assert_eq!(checkpoint.state_as::<Vec<String>>().unwrap(), vec!["a", "b"]);
        assert_eq!(checkpoint.metadata.last_save_reason.as_deref(), Some("interrupted"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn complete_honours_auto_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        let mut cp = Checkpointer::new(store.clone(), SaveStrategy::Progress(1), "kept");
        cp.save_now("done", &(), meta(1)).unwrap();
        cp.complete(false).unwrap();
        assert!(store.load("kept").unwrap().is_some());

        let mut cp = Checkpointer::new(store.clone(), SaveStrategy::Progress(1), "cleaned");
        cp.save_now("done", &(), meta(1)).unwrap();
        cp.complete(true).unwrap();
        assert!(store.load("cleaned").unwrap().is_none());
    }
}
