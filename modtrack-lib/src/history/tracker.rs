use super::{HistoryCache, HistoryOutcome, HistoryRecord, PathConvention, ProbeOutcome, RepositoryProbe};
use crate::Result;
use crate::governor::RateGovernor;
use crate::model::{HistoryKey, ModuleKey, VersionSequence, VersionTag};
use chrono::Utc;
use std::sync::Arc;

const LOG_TARGET: &str = "   history";

/// Knobs for a single lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackOptions {
    /// Ignore cached records and search again.
    pub force_refresh: bool,

    /// Ref used for the up-front existence check. Defaults to the newest version searched.
    pub head_ref: Option<String>,

    /// Also look up the commit that added the file.
    pub resolve_commits: bool,
}

/// Finds the first version in which each module's file exists.
///
/// Lookups consult the cache first. A miss costs one existence check at HEAD plus a
/// binary search over the version sequence, so about `log2(n) + 1` external calls,
/// all paced by the shared [`RateGovernor`].
#[derive(Debug)]
pub struct HistoryTracker<P> {
    probe: P,
    governor: Arc<RateGovernor>,
    cache: HistoryCache,
    conventions: PathConvention,
}

impl<P: RepositoryProbe> HistoryTracker<P> {
    #[must_use]
    pub const fn new(probe: P, governor: Arc<RateGovernor>, cache: HistoryCache, conventions: PathConvention) -> Self {
        Self {
            probe,
            governor,
            cache,
            conventions,
        }
    }

    #[must_use]
    pub const fn probe(&self) -> &P {
        &self.probe
    }

    #[must_use]
    pub const fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    #[must_use]
    pub const fn cache(&self) -> &HistoryCache {
        &self.cache
    }

    #[must_use]
    pub const fn conventions(&self) -> &PathConvention {
        &self.conventions
    }

    #[must_use]
    pub fn history_key(&self, module: &ModuleKey) -> HistoryKey {
        self.conventions.history_key(module)
    }

    /// The first version of `versions` in which the module's file exists.
    ///
    /// `versions` must be in ascending order, and the file is assumed to stay once added.
    pub async fn first_appearance(
        &self,
        name: &str,
        category: &str,
        versions: &VersionSequence,
        options: &TrackOptions,
    ) -> Result<HistoryRecord> {
        self.track(&ModuleKey::new(name, category), versions, options).await
    }

    pub(super) async fn track(&self, module: &ModuleKey, versions: &VersionSequence, options: &TrackOptions) -> Result<HistoryRecord> {
        let key = self.conventions.history_key(module);

        if !options.force_refresh
            && let Some(mut record) = self.cache.get(&key)?
        {
            if record.module == *module {
                log::debug!(target: LOG_TARGET, "Cache hit for {module} at '{key}'");
                record.probes = 0;
                return Ok(record);
            }

            log::debug!(target: LOG_TARGET, "Cached record at '{key}' belongs to {}, searching again for {module}", record.module);
        }

        let mut probes = 0;
        let head_ref = options.head_ref.as_deref().or_else(|| versions.last().map(VersionTag::raw));
        let Some(head_ref) = head_ref else {
            log::debug!(target: LOG_TARGET, "No versions to search for {module}");
            return Ok(record(module, key, HistoryOutcome::NotFound, probes));
        };

        if !self.exists(head_ref, &key, &mut probes).await? {
            let reason = format!("'{key}' does not exist at {head_ref}");
            log::debug!(target: LOG_TARGET, "{module}: {reason}");
            let record = record(module, key, HistoryOutcome::Unresolved { reason }, probes);
            self.cache.put(&record)?;
            return Ok(record);
        }

        let index = self.search(versions, head_ref, &key, &mut probes).await?;
        let outcome = match versions.get(index) {
            None => HistoryOutcome::NotFound,
            Some(tag) => {
                let commit = if options.resolve_commits {
                    probes += 1;
                    self.governor
                        .execute_governed(|| self.probe.introducing_commit(key.file_path(), tag.raw()))
                        .await?
                } else {
                    None
                };

                HistoryOutcome::Found {
                    first_version: tag.raw().to_string(),
                    version_index: index,
                    first_commit_id: commit.as_ref().map(|c| c.id.clone()),
                    first_commit_date: commit.and_then(|c| c.date),
                }
            }
        };

        log::debug!(target: LOG_TARGET, "{module}: {outcome:?} after {probes} probes");
        let record = record(module, key, outcome, probes);
        self.cache.put(&record)?;
        Ok(record)
    }

    /// Lower-bound search for the first version at which `key` exists.
    ///
    /// Returns `versions.len()` when it exists in none of them. When the HEAD check
    /// already covered the newest version, that version is not probed again.
    async fn search(&self, versions: &VersionSequence, head_ref: &str, key: &HistoryKey, probes: &mut u32) -> Result<usize> {
        let head_is_last = versions.last().is_some_and(|tag| tag.raw() == head_ref);

        let mut lo = 0;
        let mut hi = if head_is_last { versions.len() - 1 } else { versions.len() };

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let Some(tag) = versions.get(mid) else {
                break;
            };

            if self.exists(tag.raw(), key, probes).await? {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        Ok(lo)
    }

    async fn exists(&self, git_ref: &str, key: &HistoryKey, probes: &mut u32) -> Result<bool> {
        *probes += 1;
        let outcome = self
            .governor
            .execute_governed(|| self.probe.path_exists(git_ref, key.file_path()))
            .await?;

        Ok(outcome == ProbeOutcome::Present)
    }
}

fn record(module: &ModuleKey, file_path: HistoryKey, outcome: HistoryOutcome, probes: u32) -> HistoryRecord {
    HistoryRecord {
        module: module.clone(),
        file_path,
        outcome,
        probes,
        resolved_at: Utc::now(),
    }
}
