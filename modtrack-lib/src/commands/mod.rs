//! Command-line interface and orchestration for modtrack
//!
//! Each subcommand lives in its own file and follows the same pattern: resolve the
//! repository from the configuration, obtain a [`RepoHandle`](crate::github::RepoHandle)
//! sharing one rate governor, run the library operation, then render the result to the
//! console and optionally to a JSON file.
//!
//! - **init** / **validate**: write or check the TOML configuration
//! - **versions**: release catalog of a repository
//! - **compare** / **compare-repos**: the comparator engine
//! - **history**: checkpointed first-appearance search
//! - **checkpoints** / **cache**: housekeeping of persisted state

mod cache;
mod checkpoints;
mod common;
mod compare;
mod config;
mod history;
mod host;
mod init;
mod progress_reporter;
mod run;
mod validate;
mod versions;

#[cfg(debug_assertions)]
pub use config::Config;

pub use cache::{CacheCommand, manage_cache};
pub use checkpoints::{CheckpointsCommand, manage_checkpoints};
pub use compare::{CompareArgs, CompareReposArgs, compare_repos, compare_versions};
pub use history::{HistoryArgs, trace_history};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use progress_reporter::ProgressReporter;
pub use run::run;
pub use validate::validate_config;
pub use versions::{VersionsArgs, list_versions};
