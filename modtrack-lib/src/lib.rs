#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for modtrack
//!
//! This library holds all of the functionality behind the `modtrack` tool, which compares
//! the module inventories of the Prebid repositories across versions and across
//! repositories, and traces the release in which every module first appeared.
//!
//! # Module Organization
//!
//! - [`governor`]: Pacing and quota accounting for GitHub API calls
//! - [`store`]: Durable JSON key-value storage
//! - [`checkpoint`]: Resumable progress records for long operations
//! - [`model`]: Modules, snapshots, and version sequences
//! - [`compare`]: Set differences between snapshots
//! - [`history`]: First-appearance search with caching and checkpoints
//! - [`github`]: GitHub-backed sources for versions, snapshots, and probes
//! - [`reports`]: Console and JSON output
//! - [`commands`]: Command-line interface and orchestration

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod checkpoint;
pub mod compare;
pub mod github;
pub mod governor;
pub mod history;
pub mod model;
pub mod store;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod reports;
#[cfg(not(any(debug_assertions, test)))]
mod reports;

pub use crate::commands::{Host, run};
