//! The REST endpoints the tool needs, one request per call.

use super::client::{GitHubClient, Page};
use super::parsers::DirEntry;
use crate::Result;
use crate::governor::Metered;
use crate::history::{CommitInfo, ProbeOutcome};
use chrono::{DateTime, Utc};
use ohno::{app_err, bail};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct TagRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Contents {
    Listing(Vec<DirEntry>),
    Single(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    committer: Option<Signature>,
    author: Option<Signature>,
}

#[derive(Debug, Deserialize)]
struct Signature {
    date: Option<DateTime<Utc>>,
}

impl From<CommitRef> for CommitInfo {
    fn from(c: CommitRef) -> Self {
        Self {
            id: c.sha,
            date: c.commit.committer.and_then(|s| s.date).or_else(|| c.commit.author.and_then(|s| s.date)),
        }
    }
}

/// Split an `owner/name` slug.
pub fn split_repo(repo: &str) -> Result<(&str, &str)> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok((owner, name)),
        _ => bail!("invalid repository '{repo}', expected 'owner/name'"),
    }
}

impl GitHubClient {
    /// First page of the tag listing of `repo`.
    pub fn tags_url(&self, repo: &str) -> Result<Url> {
        let (owner, name) = split_repo(repo)?;
        self.endpoint(["repos", owner, name, "tags"], &[("per_page", "100")])
    }

    /// One page of tag names, with the URL of the following page.
    pub async fn tags_page(&self, repo: &str, url: &Url) -> Result<Metered<Page<Vec<String>>>> {
        let page = self
            .get_json::<Vec<TagRef>>(url)
            .await
            .into_metered(|| format!("listing tags of '{repo}'"))?;

        match page.value {
            Some(p) => Ok(Metered::new(
                Page {
                    items: p.items.into_iter().map(|t| t.name).collect(),
                    next: p.next,
                    last: p.last,
                },
                page.quota,
            )),
            None => Err(app_err!("repository '{repo}' not found")),
        }
    }

    pub async fn default_branch(&self, repo: &str) -> Result<Metered<String>> {
        let (owner, name) = split_repo(repo)?;
        let url = self.endpoint(["repos", owner, name], &[])?;
        let info = self
            .get_json::<RepoInfo>(&url)
            .await
            .into_metered(|| format!("reading repository information of '{repo}'"))?;

        let quota = info.quota;
        let info = info.value.ok_or_else(|| app_err!("repository '{repo}' not found"))?;
        Ok(Metered::new(info.items.default_branch, quota))
    }

    /// Entries of the directory `path` at `git_ref`, or `None` when it does not exist there.
    pub async fn list_directory(&self, repo: &str, git_ref: &str, path: &str) -> Result<Metered<Option<Vec<DirEntry>>>> {
        let url = self.contents_url(repo, git_ref, path)?;
        let listing = self
            .get_json::<Contents>(&url)
            .await
            .into_metered(|| format!("listing '{path}' of '{repo}' at '{git_ref}'"))?;

        Ok(listing.map(|contents| {
            contents.and_then(|page| match page.items {
                Contents::Listing(entries) => Some(entries),
                Contents::Single(_) => None,
            })
        }))
    }

    pub async fn path_exists(&self, repo: &str, git_ref: &str, path: &str) -> Result<Metered<ProbeOutcome>> {
        let url = self.contents_url(repo, git_ref, path)?;
        let found = self
            .api_call(&url)
            .await
            .into_metered(|| format!("checking '{path}' of '{repo}' at '{git_ref}'"))?;

        Ok(found.map(|resp| if resp.is_some() { ProbeOutcome::Present } else { ProbeOutcome::Absent }))
    }

    /// First page of the history of `path` reachable from `git_ref`, one commit per page.
    pub fn commits_url(&self, repo: &str, path: &str, git_ref: &str) -> Result<Url> {
        let (owner, name) = split_repo(repo)?;
        self.endpoint(
            ["repos", owner, name, "commits"],
            &[("path", path), ("sha", git_ref), ("per_page", "1")],
        )
    }

    /// One page of commit history. `None` when the ref does not exist.
    pub async fn commits_page(&self, repo: &str, url: &Url) -> Result<Metered<Option<Page<Vec<CommitInfo>>>>> {
        let page = self
            .get_json::<Vec<CommitRef>>(url)
            .await
            .into_metered(|| format!("reading commit history of '{repo}'"))?;

        Ok(page.map(|p| {
            p.map(|p| Page {
                items: p.items.into_iter().map(CommitInfo::from).collect(),
                next: p.next,
                last: p.last,
            })
        }))
    }

    fn contents_url(&self, repo: &str, git_ref: &str, path: &str) -> Result<Url> {
        let (owner, name) = split_repo(repo)?;
        let segments = ["repos", owner, name, "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        self.endpoint(segments, &[("ref", git_ref)])
    }
}
