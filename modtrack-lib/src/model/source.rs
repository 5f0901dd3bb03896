use super::{Snapshot, VersionSequence};
use crate::Result;

/// Lists the released versions of a repository.
pub trait VersionSource: Send + Sync {
    /// All semver tags, ascending. Tags that are not semver are dropped.
    fn list_versions(&self) -> impl Future<Output = Result<VersionSequence>> + Send;

    fn default_branch(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Produces the module inventory of a repository at a given ref.
pub trait SnapshotSource: Send + Sync {
    fn fetch_snapshot(&self, git_ref: &str) -> impl Future<Output = Result<Snapshot>> + Send;
}
