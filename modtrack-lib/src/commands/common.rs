//! Shared argument handling and setup for all commands.

use super::ProgressReporter;
use super::config::{Config, RepositoryConfig};
use crate::Result;
use crate::checkpoint::CheckpointStore;
use crate::github::{DEFAULT_API_URL, GitHubClient, RepoHandle};
use crate::governor::RateGovernor;
use crate::history::HistoryCache;
use crate::model::VersionSource;
use crate::store::JsonStore;
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use core::time::Duration;
use directories::BaseDirs;
use ohno::IntoAppError;
use std::path::PathBuf;
use std::sync::Arc;

const LOG_TARGET: &str = "  commands";

/// When to color console output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color even when redirected
    Always,

    /// Plain text only
    Never,

    /// Color only when writing to a terminal
    Auto,
}

/// Verbosity of diagnostic logging on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Silent
    None,

    /// Errors only
    Error,

    /// Warnings and errors
    Warn,

    /// Progress milestones, warnings and errors
    Info,

    /// Individual requests, pacing delays and cache hits
    Debug,

    /// Everything
    Trace,
}

/// Arguments accepted by every command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", global = true, hide_env_values = true)]
    pub github_token: Option<String>,

    /// Path to configuration file (default is the built-in configuration)
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding the history cache and checkpoints
    #[arg(long, value_name = "PATH", global = true)]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Base URL of the GitHub REST API
    #[arg(long, value_name = "URL", default_value = DEFAULT_API_URL, global = true, hide = true)]
    pub api_url: String,

    /// When to color output
    #[arg(long, value_name = "WHEN", default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Diagnostic logging verbosity
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

/// Everything a command needs once arguments and configuration are resolved.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub cache_dir: PathBuf,
    pub governor: Arc<RateGovernor>,
    client: GitHubClient,
    log_level: LogLevel,
    color: ColorMode,
}

impl Context {
    pub fn new(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let config = Config::load(args.config.as_deref())?;

        let cache_dir = if let Some(cache_path) = &args.cache_dir {
            cache_path.as_std_path().to_path_buf()
        } else {
            BaseDirs::new()
                .into_app_err("could not determine cache directory")?
                .cache_dir()
                .join("modtrack")
        };

        log::debug!(target: LOG_TARGET, "Using cache directory '{}'", cache_dir.display());

        Ok(Self {
            governor: Arc::new(RateGovernor::new(config.pacing.clone())),
            client: GitHubClient::new(args.github_token.as_deref(), &args.api_url)?,
            config,
            cache_dir,
            log_level: args.log_level,
            color: args.color,
        })
    }

    /// A handle on a configured repository, looked up by id or slug.
    pub fn repository(&self, id: &str) -> Result<(&RepositoryConfig, RepoHandle)> {
        let (_, repo) = self.config.repository(id)?;

        let mut handle = RepoHandle::new(self.client.clone(), &repo.repo, Arc::clone(&self.governor))
            .with_layout(repo.parser, repo.paths.clone());
        if let Some(branch) = &repo.default_branch {
            handle = handle.with_default_branch(branch);
        }

        Ok((repo, handle))
    }

    /// The version to use when none is given: the override, else the newest release, else the default branch.
    pub async fn default_version(&self, repo: &RepositoryConfig, handle: &RepoHandle) -> Result<String> {
        if let Some(version) = &repo.version_override {
            return Ok(version.clone());
        }

        match handle.list_versions().await?.releases_only().last() {
            Some(tag) => Ok(tag.raw().to_string()),
            None => handle.default_branch().await,
        }
    }

    #[must_use]
    pub fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(self.cache_dir.join("checkpoints"))
    }

    #[must_use]
    pub fn history_cache(&self, repo: &str) -> HistoryCache {
        HistoryCache::new(&JsonStore::new(self.cache_dir.join("history")), repo)
    }

    #[must_use]
    pub fn progress(&self) -> ProgressReporter {
        let delay = if self.log_level == LogLevel::None {
            Duration::from_millis(300)
        } else {
            Duration::from_hours(365 * 24)
        };

        ProgressReporter::new(delay, use_colors(self.color, Stream::Stderr))
    }

    #[must_use]
    pub fn use_colors(&self) -> bool {
        use_colors(self.color, Stream::Stdout)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn use_colors(mode: ColorMode, stream: Stream) -> bool {
    use std::io::{IsTerminal, stderr, stdout};

    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => match stream {
            Stream::Stdout => stdout().is_terminal(),
            Stream::Stderr => stderr().is_terminal(),
        },
    }
}

/// Install `env_logger`; `RUST_LOG` still takes precedence
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}
