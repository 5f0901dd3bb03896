use super::{HistoryOutcome, HistoryRecord};
use crate::Result;
use crate::model::HistoryKey;
use crate::store::{Entry, JsonStore};
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "   history";

/// Layout version of cached records. Records of any other version are ignored.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CachedRecord {
    version: u32,

    #[serde(flatten)]
    record: HistoryRecord,
}

/// Counts describing one repository's history cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub repository: String,
    pub entries: usize,
    pub found: usize,
    pub not_found: usize,
    pub unresolved: usize,

    /// Entries that could not be read or were written by another layout version.
    pub unreadable: usize,
}

/// Persisted history records of one repository, keyed by file path.
#[derive(Debug, Clone)]
pub struct HistoryCache {
    repository: String,
    store: JsonStore,
}

impl HistoryCache {
    /// The cache of `repository` inside `root`. Each repository gets its own namespace.
    #[must_use]
    pub fn new(root: &JsonStore, repository: impl Into<String>) -> Self {
        let repository = repository.into();
        Self {
            store: root.namespace(&repository),
            repository,
        }
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn get(&self, key: &HistoryKey) -> Result<Option<HistoryRecord>> {
        match self.store.get::<CachedRecord>(key.file_path())? {
            Entry::Found(cached) if cached.version == CACHE_VERSION => Ok(Some(cached.record)),
            Entry::Found(cached) => {
                log::debug!(
                    target: LOG_TARGET,
                    "Ignoring cached history for '{key}' written by layout version {}",
                    cached.version
                );
                Ok(None)
            }
            Entry::Missing => Ok(None),
            Entry::Corrupt(reason) => {
                log::warn!(target: LOG_TARGET, "Ignoring unreadable cached history for '{key}': {reason}");
                Ok(None)
            }
        }
    }

    pub fn put(&self, record: &HistoryRecord) -> Result<()> {
        let cached = CachedRecord {
            version: CACHE_VERSION,
            record: record.clone(),
        };
        self.store.set(record.file_path.file_path(), &cached)
    }

    pub fn remove(&self, key: &HistoryKey) -> Result<bool> {
        self.store.delete(key.file_path())
    }

    /// Drop every cached record of this repository, returning how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.store.clear()?;
        log::info!(target: LOG_TARGET, "Cleared {removed} cached history records for {}", self.repository);
        Ok(removed)
    }

    pub fn info(&self) -> Result<CacheInfo> {
        let mut info = CacheInfo {
            repository: self.repository.clone(),
            ..CacheInfo::default()
        };

        for key in self.store.keys()? {
            info.entries += 1;
            match self.store.get::<CachedRecord>(&key)? {
                Entry::Found(cached) if cached.version == CACHE_VERSION => match cached.record.outcome {
                    HistoryOutcome::Found { .. } => info.found += 1,
                    HistoryOutcome::NotFound => info.not_found += 1,
                    HistoryOutcome::Unresolved { .. } => info.unresolved += 1,
                },
                _ => info.unreadable += 1,
            }
        }

        Ok(info)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::ModuleKey;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn record(name: &str, category: &str, path: &str, outcome: HistoryOutcome) -> HistoryRecord {
        HistoryRecord {
            module: ModuleKey::new(name, category),
            file_path: HistoryKey::new(path),
            outcome,
            probes: 3,
            resolved_at: Utc::now(),
        }
    }

    fn found(version: &str) -> HistoryOutcome {
        HistoryOutcome::Found {
            first_version: version.into(),
            version_index: 4,
            first_commit_id: Some("abc123".into()),
            first_commit_date: None,
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn put_then_get() {
        let dir = TempDir::new().unwrap();
        let cache = HistoryCache::new(&JsonStore::new(dir.path()), "prebid/Prebid.js");

        let rec = record("foo", "Bid Adapters", "modules/fooBidAdapter.js", found("v5.0.0"));
        cache.put(&rec).unwrap();

        assert_eq!(cache.get(&rec.file_path).unwrap(), Some(rec.clone()));
        assert!(cache.remove(&rec.file_path).unwrap());
        assert_eq!(cache.get(&rec.file_path).unwrap(), None);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn same_name_different_category_does_not_collide() {
        let dir = TempDir::new().unwrap();
        let cache = HistoryCache::new(&JsonStore::new(dir.path()), "prebid/Prebid.js");

        let bid = record("criteo", "Bid Adapters", "modules/criteoBidAdapter.js", found("v1.0.0"));
        let analytics = record("criteo", "Analytics Adapters", "modules/criteoAnalyticsAdapter.js", found("v2.0.0"));
        cache.put(&bid).unwrap();
        cache.put(&analytics).unwrap();

        assert_eq!(cache.get(&bid.file_path).unwrap().unwrap().first_version(), Some("v1.0.0"));
        assert_eq!(cache.get(&analytics.file_path).unwrap().unwrap().first_version(), Some("v2.0.0"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn repositories_are_isolated() {
        let dir = TempDir::new().unwrap();
        let root = JsonStore::new(dir.path());
        let js = HistoryCache::new(&root, "prebid/Prebid.js");
        let other = HistoryCache::new(&root, "someone/fork");

        let rec = record("foo", "Bid Adapters", "modules/fooBidAdapter.js", HistoryOutcome::NotFound);
        js.put(&rec).unwrap();

        assert_eq!(other.get(&rec.file_path).unwrap(), None);
        assert_eq!(other.clear().unwrap(), 0);
        assert!(js.get(&rec.file_path).unwrap().is_some());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn info_counts_outcomes() {
        let dir = TempDir::new().unwrap();
        let cache = HistoryCache::new(&JsonStore::new(dir.path()), "prebid/Prebid.js");

        cache.put(&record("a", "Bid Adapters", "modules/aBidAdapter.js", found("1.0.0"))).unwrap();
        cache.put(&record("b", "Bid Adapters", "modules/bBidAdapter.js", HistoryOutcome::NotFound)).unwrap();
        let reason = "missing at HEAD".to_string();
        cache
            .put(&record("c", "Bid Adapters", "modules/cBidAdapter.js", HistoryOutcome::Unresolved { reason }))
            .unwrap();

        let info = cache.info().unwrap();
        assert_eq!((info.entries, info.found, info.not_found, info.unresolved, info.unreadable), (3, 1, 1, 1, 0));

        assert_eq!(cache.clear().unwrap(), 3);
        assert_eq!(cache.info().unwrap().entries, 0);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn foreign_layout_versions_are_misses() {
        let dir = TempDir::new().unwrap();
        let root = JsonStore::new(dir.path());
        let cache = HistoryCache::new(&root, "prebid/Prebid.js");

        let rec = record("foo", "Bid Adapters", "modules/fooBidAdapter.js", found("v5.0.0"));
        let mut doc = serde_json::to_value(CachedRecord {
            version: CACHE_VERSION,
            record: rec.clone(),
        })
        .unwrap();
        doc["version"] = serde_json::json!(99);
        root.namespace("prebid/Prebid.js").set(rec.file_path.file_path(), &doc).unwrap();

        assert_eq!(cache.get(&rec.file_path).unwrap(), None);
        assert_eq!(cache.info().unwrap().unreadable, 1);

        fs::write(root.namespace("prebid/Prebid.js").dir().join("garbage.json"), "{ nope").unwrap();
        assert_eq!(cache.info().unwrap().unreadable, 2);
    }
}
