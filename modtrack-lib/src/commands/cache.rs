use super::Host;
use super::common::Context;
use crate::Result;
use crate::reports::render_cache_info;
use clap::Subcommand;
use std::io::Write;

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Summarize the history cache of a repository
    Info {
        /// Repository id or `owner/name`
        #[arg(value_name = "REPO")]
        repo: String,
    },

    /// Delete the history cache of a repository
    Clear {
        /// Repository id or `owner/name`
        #[arg(value_name = "REPO")]
        repo: String,
    },
}

pub fn manage_cache<H: Host>(host: &mut H, ctx: &Context, command: &CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Info { repo } => {
            let (_, repo) = ctx.config.repository(repo)?;
            let info = ctx.history_cache(&repo.repo).info()?;

            let mut text = String::new();
            render_cache_info(&info, &mut text)?;
            let _ = write!(host.output(), "{text}");
        }

        CacheCommand::Clear { repo } => {
            let (_, repo) = ctx.config.repository(repo)?;
            let removed = ctx.history_cache(&repo.repo).clear()?;
            let _ = writeln!(host.output(), "Removed {removed} cached records of '{}'", repo.repo);
        }
    }

    Ok(())
}
