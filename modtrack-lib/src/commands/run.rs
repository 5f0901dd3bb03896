//! Command dispatch logic for modtrack

use super::common::{CommonArgs, Context};
use super::{
    CacheCommand, CheckpointsCommand, CompareArgs, CompareReposArgs, HistoryArgs, InitArgs, VersionsArgs, compare_repos, compare_versions,
    init_config, list_versions, manage_cache, manage_checkpoints, trace_history, validate_config,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use std::io::Write;

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "modtrack", version, author, long_about = None)]
#[command(about = "Compare Prebid module inventories and trace when each module first appeared")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a default configuration file
    Init(InitArgs),

    /// Validate a configuration file
    Validate,

    /// List the releases of a repository
    Versions(VersionsArgs),

    /// Compare two versions of one repository, or every version between them
    Compare(Box<CompareArgs>),

    /// Compare the modules of two repositories
    CompareRepos(Box<CompareReposArgs>),

    /// Find the release in which each module first appeared
    History(Box<HistoryArgs>),

    /// Inspect or clear saved progress of interrupted runs
    Checkpoints {
        #[command(subcommand)]
        command: CheckpointsCommand,
    },

    /// Inspect or clear the history cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

/// Parse `args` and run the selected command
///
/// Failures are reported on the host's error stream and terminate with exit code 1.
///
/// # Errors
///
/// Returns the error of the failed command
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);

    let result = dispatch(host, &cli).await;
    if let Err(e) = &result {
        let _ = writeln!(host.error(), "❌ {e:#}");
        host.exit(1);
    }

    result
}

async fn dispatch<H: Host>(host: &mut H, cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Init(args) => return init_config(host, args),
        Command::Validate => return validate_config(host, cli.common.config.as_deref()),
        _ => {}
    }

    let ctx = Context::new(&cli.common)?;

    match &cli.command {
        Command::Versions(args) => list_versions(host, &ctx, args).await,
        Command::Compare(args) => compare_versions(host, &ctx, args).await,
        Command::CompareRepos(args) => compare_repos(host, &ctx, args).await,
        Command::History(args) => trace_history(host, &ctx, args).await,
        Command::Checkpoints { command } => manage_checkpoints(host, &ctx, command),
        Command::Cache { command } => manage_cache(host, &ctx, command),
        Command::Init(_) | Command::Validate => Ok(()),
    }
}
