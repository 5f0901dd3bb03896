use super::client::GitHubClient;
use super::parsers::{DirEntry, EntryKind, ParserKind};
use crate::Result;
use crate::governor::{Metered, RateGovernor};
use crate::history::{CommitInfo, ProbeOutcome, RepositoryProbe};
use crate::model::{Snapshot, SnapshotSource, VersionSequence, VersionSource};
use std::collections::BTreeMap;
use std::sync::Arc;

const LOG_TARGET: &str = "    github";

/// One GitHub repository, seen through the collaborator traits.
///
/// Listing and snapshot calls are paced by the handle's governor. Probe calls are not,
/// since the history tracker already runs each of them through its own governor.
#[derive(Debug, Clone)]
pub struct RepoHandle {
    client: GitHubClient,
    repo: String,
    governor: Arc<RateGovernor>,
    parser: ParserKind,
    paths: BTreeMap<String, String>,
    default_branch: Option<String>,
}

impl RepoHandle {
    #[must_use]
    pub fn new(client: GitHubClient, repo: impl Into<String>, governor: Arc<RateGovernor>) -> Self {
        Self {
            client,
            repo: repo.into(),
            governor,
            parser: ParserKind::Default,
            paths: BTreeMap::new(),
            default_branch: None,
        }
    }

    /// Use `parser` on the given category → directory mapping when building snapshots.
    #[must_use]
    pub fn with_layout(mut self, parser: ParserKind, paths: BTreeMap<String, String>) -> Self {
        self.parser = parser;
        self.paths = paths;
        self
    }

    /// Skip the repository lookup for the default branch.
    #[must_use]
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    #[must_use]
    pub const fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    async fn list(&self, git_ref: &str, path: &str) -> Result<Option<Vec<DirEntry>>> {
        self.governor
            .execute_governed(|| self.client.list_directory(&self.repo, git_ref, path))
            .await
    }

    /// Entries `depth` levels below `path`. Only directories are descended into.
    async fn list_deep(&self, git_ref: &str, path: &str, depth: usize) -> Result<Vec<DirEntry>> {
        let mut level = self.list(git_ref, path).await?.unwrap_or_default();

        for _ in 1..depth {
            let mut next = Vec::new();
            for dir in level.iter().filter(|e| e.kind == EntryKind::Dir) {
                if let Some(children) = self.list(git_ref, &dir.path).await? {
                    next.extend(children);
                }
            }

            level = next;
        }

        Ok(level)
    }
}

impl VersionSource for RepoHandle {
    async fn list_versions(&self) -> Result<VersionSequence> {
        let mut url = self.client.tags_url(&self.repo)?;
        let mut tags = Vec::new();

        loop {
            let page = self.governor.execute_governed(|| self.client.tags_page(&self.repo, &url)).await?;
            tags.extend(page.items);

            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        log::debug!(target: LOG_TARGET, "Found {} tags in '{}'", tags.len(), self.repo);
        Ok(VersionSequence::from_unordered(tags))
    }

    async fn default_branch(&self) -> Result<String> {
        if let Some(branch) = &self.default_branch {
            return Ok(branch.clone());
        }

        self.governor.execute_governed(|| self.client.default_branch(&self.repo)).await
    }
}

impl SnapshotSource for RepoHandle {
    async fn fetch_snapshot(&self, git_ref: &str) -> Result<Snapshot> {
        let mut modules = Vec::new();

        for (category, path) in &self.paths {
            let depth = self.parser.listing_depth(category);
            let entries = self.list_deep(git_ref, path, depth).await?;
            if entries.is_empty() {
                log::debug!(target: LOG_TARGET, "Nothing under '{path}' of '{}' at '{git_ref}'", self.repo);
            }

            modules.extend(
                self.parser
                    .categorize(category, path, &entries)
                    .into_iter()
                    .map(|m| m.with_repository(&self.repo)),
            );
        }

        log::info!(target: LOG_TARGET, "Found {} modules in '{}' at '{git_ref}'", modules.len(), self.repo);
        Ok(Snapshot::new(&self.repo, git_ref, modules).taken_at(chrono::Utc::now()))
    }
}

impl RepositoryProbe for RepoHandle {
    async fn path_exists(&self, git_ref: &str, path: &str) -> Result<Metered<ProbeOutcome>> {
        self.client.path_exists(&self.repo, git_ref, path).await
    }

    async fn introducing_commit(&self, path: &str, git_ref: &str) -> Result<Metered<Option<CommitInfo>>> {
        let url = self.client.commits_url(&self.repo, path, git_ref)?;
        let first = self.client.commits_page(&self.repo, &url).await?;

        let Some(page) = first.value else {
            return Ok(Metered::new(None, first.quota));
        };

        // One commit per page, so the last page holds the oldest commit.
        match page.last {
            Some(last) if page.next.is_some() => {
                let oldest = self.client.commits_page(&self.repo, &last).await?;
                Ok(oldest.map(|p| p.and_then(|p| p.items.into_iter().next())))
            }
            _ => Ok(Metered::new(page.items.into_iter().next(), first.quota)),
        }
    }
}
