//! GitHub as the source of versions, snapshots and file history.
//!
//! [`GitHubClient`] issues single REST requests and classifies the responses, reading the
//! `x-ratelimit-*` headers of each into a [`QuotaStatus`](crate::governor::QuotaStatus).
//! [`RepoHandle`] binds a client to one repository and implements the collaborator traits
//! used by the comparator and the history tracker.

mod client;
mod endpoints;
mod handle;
mod parsers;

pub use client::{ApiResult, DEFAULT_API_URL, GitHubClient, Page};
pub use endpoints::split_repo;
pub use handle::RepoHandle;
pub use parsers::{DirEntry, EntryKind, ParserKind};
