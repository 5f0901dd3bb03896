use crate::Result;
use crate::governor::Metered;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a path exists at a given ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Present,
    Absent,
}

impl ProbeOutcome {
    #[must_use]
    pub const fn is_present(self) -> bool {
        matches!(self, Self::Present)
    }
}

/// The commit that first added a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub date: Option<DateTime<Utc>>,
}

/// Read-only access to a repository's file tree at arbitrary refs.
///
/// Every call is one external request. Implementations report the quota seen in the
/// response so the caller's governor can pace the next one.
pub trait RepositoryProbe: Send + Sync {
    fn path_exists(&self, git_ref: &str, path: &str) -> impl Future<Output = Result<Metered<ProbeOutcome>>> + Send;

    /// The oldest commit reachable from `git_ref` that touched `path`.
    fn introducing_commit(&self, path: &str, git_ref: &str) -> impl Future<Output = Result<Metered<Option<CommitInfo>>>> + Send;
}
