//! First-appearance tracking of modules across a repository's versions.
//!
//! Each module maps to a file path through a [`PathConvention`]. The
//! [`HistoryTracker`] checks that the file exists at HEAD, then binary-searches the
//! version sequence for the first version containing it. Results are cached per
//! repository, keyed by file path, and batch runs are checkpointed so they can be
//! resumed after an interruption.

mod batch;
mod cache;
mod paths;
mod probe;
mod progress;
mod record;
mod tracker;

pub use batch::{BatchOptions, BatchReport, BatchStatus, QuotaPolicy};
pub use cache::{CACHE_VERSION, CacheInfo, HistoryCache};
pub use paths::PathConvention;
pub use probe::{CommitInfo, ProbeOutcome, RepositoryProbe};
pub use progress::Progress;
pub use record::{HistoryOutcome, HistoryRecord, introduced_in_major, timeline};
pub use tracker::{HistoryTracker, TrackOptions};
