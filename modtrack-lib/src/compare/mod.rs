//! Set-difference analysis over snapshots.
//!
//! Three modes are supported, each with its own result type:
//!
//! - version comparison: two snapshots of one repository ([`compare_versions`]);
//! - repository comparison: snapshots of two different repositories ([`compare_repositories`]);
//! - cumulative comparison: a chronological run of snapshots of one repository ([`compare_cumulative`]).
//!
//! [`compare`] dispatches a [`ComparisonRequest`] to the matching mode, and
//! [`ComparisonStatistics`] summarizes any result.

mod cumulative;
mod renames;
mod repositories;
mod statistics;
mod versions;

pub use cumulative::{ChangeKind, CumulativeCategory, CumulativeComparison, LifecycleEvent, ModuleLifecycle, Outcome, compare_cumulative};
pub use renames::{RenameCandidate, RenameMethod, RenameRules, detect_renames};
pub use repositories::{RepositoryComparison, RepositoryDiff, compare_repositories};
pub use statistics::{CategoryStats, ComparisonStatistics};
pub use versions::{VersionComparison, VersionDiff, compare_versions};

use crate::Result;
use crate::model::Snapshot;
use serde::Serialize;
use strum::Display;

/// Identifies the snapshot a comparison side came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRef {
    pub repository: String,
    pub version: String,
}

impl SnapshotRef {
    #[must_use]
    pub fn of(snapshot: &Snapshot) -> Self {
        Self {
            repository: snapshot.repository().to_string(),
            version: snapshot.version().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComparisonMode {
    Version,
    Repository,
    Cumulative,
}

/// What to compare.
#[derive(Debug, Clone, Copy)]
pub enum ComparisonRequest<'a> {
    Versions { source: &'a Snapshot, target: &'a Snapshot },
    Repositories { source: &'a Snapshot, target: &'a Snapshot },
    Cumulative { snapshots: &'a [Snapshot] },
}

impl ComparisonRequest<'_> {
    #[must_use]
    pub const fn mode(&self) -> ComparisonMode {
        match self {
            Self::Versions { .. } => ComparisonMode::Version,
            Self::Repositories { .. } => ComparisonMode::Repository,
            Self::Cumulative { .. } => ComparisonMode::Cumulative,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ComparisonResult {
    Versions(VersionComparison),
    Repositories(RepositoryComparison),
    Cumulative(CumulativeComparison),
}

impl ComparisonResult {
    #[must_use]
    pub const fn mode(&self) -> ComparisonMode {
        match self {
            Self::Versions(_) => ComparisonMode::Version,
            Self::Repositories(_) => ComparisonMode::Repository,
            Self::Cumulative(_) => ComparisonMode::Cumulative,
        }
    }

    #[must_use]
    pub fn statistics(&self) -> ComparisonStatistics {
        self.into()
    }
}

/// Run the comparison described by `request`.
pub fn compare(request: ComparisonRequest<'_>) -> Result<ComparisonResult> {
    match request {
        ComparisonRequest::Versions { source, target } => compare_versions(source, target).map(ComparisonResult::Versions),
        ComparisonRequest::Repositories { source, target } => Ok(ComparisonResult::Repositories(compare_repositories(source, target))),
        ComparisonRequest::Cumulative { snapshots } => compare_cumulative(snapshots).map(ComparisonResult::Cumulative),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::model::ModuleInfo;

    fn snap(repository: &str, version: &str, names: &[&str]) -> Snapshot {
        Snapshot::new(repository, version, names.iter().map(|n| ModuleInfo::new(*n, "Bid Adapters")))
    }

    #[test]
    fn dispatches_by_mode() {
        let a = snap("prebid/Prebid.js", "9.0.0", &["a", "b"]);
        let b = snap("prebid/Prebid.js", "9.1.0", &["b", "c"]);
        let other = snap("prebid/prebid-server", "3.0.0", &["a"]);

        let request = ComparisonRequest::Versions { source: &a, target: &b };
        assert_eq!(request.mode(), ComparisonMode::Version);
        let result = compare(request).unwrap();
        assert_eq!(result.mode(), ComparisonMode::Version);
        assert_eq!(result.statistics().net_change(), 0);

        let result = compare(ComparisonRequest::Repositories { source: &a, target: &other }).unwrap();
        assert_eq!(result.mode(), ComparisonMode::Repository);

        let run = [a.clone(), b.clone()];
        let result = compare(ComparisonRequest::Cumulative { snapshots: &run }).unwrap();
        assert_eq!(result.mode(), ComparisonMode::Cumulative);
    }

    #[test]
    fn version_mode_rejects_mixed_repositories() {
        let a = snap("prebid/Prebid.js", "9.0.0", &[]);
        let b = snap("prebid/prebid-server", "3.0.0", &[]);
        let _ = compare(ComparisonRequest::Versions { source: &a, target: &b }).unwrap_err();
    }

    #[test]
    fn results_serialize_with_mode_tag() {
        let a = snap("r", "1.0.0", &["a"]);
        let b = snap("r", "2.0.0", &["b"]);
        let result = compare(ComparisonRequest::Versions { source: &a, target: &b }).unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["mode"], "versions");
        assert_eq!(json["source"]["version"], "1.0.0");
        assert_eq!(json["categories"]["Bid Adapters"]["added"][0]["name"], "b");
    }
}
