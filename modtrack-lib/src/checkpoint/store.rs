use super::record::{CHECKPOINT_VERSION, Decoded, decode};
use super::{Checkpoint, CheckpointMetadata};
use crate::Result;
use crate::store::{Entry, JsonStore};
use chrono::Utc;
use ohno::IntoAppError;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

const LOG_TARGET: &str = "checkpoint";

/// Persists checkpoints keyed by operation id.
///
/// Different operation ids never interfere. Saves for the same id are serialized
/// through a per-id file lock, so concurrent writers see last-writer-wins.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    store: JsonStore,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::from_store(JsonStore::new(dir))
    }

    #[must_use]
    pub const fn from_store(store: JsonStore) -> Self {
        Self { store }
    }

    /// Write a checkpoint for `operation_id`, replacing any previous one.
    ///
    /// The original creation time is kept and `save_count` is advanced.
    pub fn save<S: Serialize>(&self, operation_id: &str, state: &S, mut metadata: CheckpointMetadata) -> Result<Checkpoint> {
        let state = serde_json::to_value(state).into_app_err_with(|| format!("encoding state of checkpoint '{operation_id}'"))?;

        let _lock = self.store.lock(operation_id)?;
        let now = Utc::now();
        let previous = self.load(operation_id)?;

        let created_at = previous.as_ref().map_or(now, |p| p.created_at);
        metadata.save_count = previous.as_ref().map_or(0, |p| p.metadata.save_count) + 1;

        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            operation_id: operation_id.to_string(),
            state,
            metadata,
            created_at,
            updated_at: now,
        };

        self.store
            .set(operation_id, &checkpoint)
            .into_app_err_with(|| format!("saving checkpoint '{operation_id}'"))?;

        log::debug!(
            target: LOG_TARGET,
            "Saved checkpoint '{operation_id}' (save #{}, {} items processed)",
            checkpoint.metadata.save_count,
            checkpoint.metadata.processed_items
        );

        Ok(checkpoint)
    }

    /// The most recent checkpoint for `operation_id`.
    ///
    /// Unreadable checkpoints are reported as absent, so the operation restarts.
    /// Only a checkpoint written by a newer schema is an error.
    pub fn load(&self, operation_id: &str) -> Result<Option<Checkpoint>> {
        let raw = match self.store.get::<Value>(operation_id)? {
            Entry::Found(raw) => raw,
            Entry::Missing => return Ok(None),
            Entry::Corrupt(reason) => {
                log::warn!(target: LOG_TARGET, "Ignoring unreadable checkpoint '{operation_id}': {reason}");
                return Ok(None);
            }
        };

        match decode(raw, operation_id)? {
            Decoded::Current(checkpoint) => Ok(Some(checkpoint)),
            Decoded::Migrated { from, checkpoint } => {
                log::info!(target: LOG_TARGET, "Migrated checkpoint '{operation_id}' from schema version {from}");
                Ok(Some(checkpoint))
            }
            Decoded::Corrupt(reason) => {
                log::warn!(target: LOG_TARGET, "Ignoring malformed checkpoint '{operation_id}': {reason}");
                Ok(None)
            }
        }
    }

    /// Delete the checkpoint of a completed operation. Deleting twice is fine.
    pub fn finalize(&self, operation_id: &str) -> Result<bool> {
        let _lock = self.store.lock(operation_id)?;
        let removed = self.store.delete(operation_id)?;
        if removed {
            log::debug!(target: LOG_TARGET, "Finalized checkpoint '{operation_id}'");
        }

        Ok(removed)
    }

    /// Ids of every operation that currently has a checkpoint.
    pub fn list_operations(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    /// Progress counters of an operation, if it has a checkpoint.
    pub fn status(&self, operation_id: &str) -> Result<Option<CheckpointMetadata>> {
        Ok(self.load(operation_id)?.map(|c| c.metadata))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Progress {
        done: Vec<String>,
    }

    fn progress(items: &[&str]) -> Progress {
        Progress {
            done: items.iter().map(ToString::to_string).collect(),
        }
    }

    fn meta(processed: u64, total: u64) -> CheckpointMetadata {
        CheckpointMetadata {
            processed_items: processed,
            total_items: Some(total),
            ..CheckpointMetadata::default()
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        let _ = store.save("op", &progress(&["a", "b"]), meta(2, 10)).unwrap();
        let loaded = store.load("op").unwrap().unwrap();

        assert_eq!(loaded.operation_id, "op");
        assert_eq!(loaded.state_as::<Progress>().unwrap(), progress(&["a", "b"]));
        assert_eq!(loaded.metadata.processed_items, 2);
        assert_eq!(loaded.metadata.total_items, Some(10));
        assert_eq!(loaded.metadata.save_count, 1);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn finalize_removes_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        let _ = store.save("op", &progress(&["a"]), meta(1, 2)).unwrap();
        assert!(store.finalize("op").unwrap());
        assert!(store.load("op").unwrap().is_none());
        assert!(!store.finalize("op").unwrap());
        assert!(!store.finalize("never-existed").unwrap());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn resave_keeps_creation_time_and_counts_saves() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        let first = store.save("op", &progress(&["a"]), meta(1, 3)).unwrap();
        let second = store.save("op", &progress(&["a", "b"]), meta(2, 3)).unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.metadata.save_count, 2);
        assert_eq!(store.load("op").unwrap().unwrap().state_as::<Progress>().unwrap(), progress(&["a", "b"]));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn corrupt_checkpoint_reads_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        fs::write(tmp.path().join("op.json"), "{\"version\": 2, \"operation_id\": \"op\", \"sta").unwrap();
        assert!(store.load("op").unwrap().is_none());

        // and a fresh save replaces it
        let _ = store.save("op", &progress(&[]), meta(0, 1)).unwrap();
        assert!(store.load("op").unwrap().is_some());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn legacy_checkpoint_is_migrated_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        fs::write(
            tmp.path().join("legacy.json"),
            r#"{"processed_files": ["x", "y", "z"], "files_data": {}, "timestamp": 1700000000}"#,
        )
        .unwrap();

        let status = store.status("legacy").unwrap().unwrap();
        assert_eq!(status.processed_items, 3);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn newer_schema_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        fs::write(tmp.path().join("future.json"), r#"{"version": 3}"#).unwrap();
        let _ = store.load("future").unwrap_err();
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn lists_operations_and_status() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        let _ = store.save("history:prebid/Prebid.js", &progress(&[]), meta(750, 1000)).unwrap();
        let _ = store.save("compare:prebid-server", &progress(&[]), meta(1, 4)).unwrap();

        assert_eq!(
            store.list_operations().unwrap(),
            vec!["compare:prebid-server".to_string(), "history:prebid/Prebid.js".to_string()]
        );

        let status = store.status("history:prebid/Prebid.js").unwrap().unwrap();
        assert_eq!(status.processed_items, 750);
        assert_eq!(status.total_items, Some(1000));
        assert!(store.status("missing").unwrap().is_none());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn concurrent_saves_for_distinct_operations() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(CheckpointStore::new(tmp.path()));

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..5 {
                        let _ = store.save(&format!("op-{i}"), &progress(&[]), meta(n, 5)).unwrap();
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(store.list_operations().unwrap().len(), 8);
        for i in 0..8 {
            let status = store.status(&format!("op-{i}")).unwrap().unwrap();
            assert_eq!(status.processed_items, 4);
            assert_eq!(status.save_count, 5);
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn concurrent_saves_for_one_operation_keep_a_consistent_count() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(CheckpointStore::new(tmp.path()));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..5 {
                        let _ = store.save("shared", &progress(&[]), meta(n, 5)).unwrap();
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(store.status("shared").unwrap().unwrap().save_count, 20);
    }
}
