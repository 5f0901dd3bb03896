use super::Host;
use super::common::Context;
use crate::Result;
use crate::reports::render_checkpoint;
use clap::Subcommand;
use ohno::bail;
use std::io::Write;

#[derive(Subcommand, Debug)]
pub enum CheckpointsCommand {
    /// List saved checkpoints
    List,

    /// Show the progress recorded by one checkpoint
    Status {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Delete a checkpoint so the next run starts over
    Clear {
        #[arg(value_name = "ID")]
        id: String,
    },
}

pub fn manage_checkpoints<H: Host>(host: &mut H, ctx: &Context, command: &CheckpointsCommand) -> Result<()> {
    let store = ctx.checkpoints();

    match command {
        CheckpointsCommand::List => {
            let ids = store.list_operations()?;
            let mut out = host.output();
            if ids.is_empty() {
                let _ = writeln!(out, "No checkpoints");
            }

            for id in ids {
                match store.status(&id)? {
                    Some(m) => {
                        let total = m.total_items.map_or_else(|| "?".to_string(), |t| t.to_string());
                        let _ = writeln!(out, "{id:<40} {}/{total}", m.processed_items);
                    }
                    None => {
                        let _ = writeln!(out, "{id:<40} unreadable");
                    }
                }
            }
        }

        CheckpointsCommand::Status { id } => {
            let Some(checkpoint) = store.load(id)? else {
                bail!("no checkpoint named '{id}'");
            };

            let mut text = String::new();
            render_checkpoint(&checkpoint, &mut text)?;
            let _ = write!(host.output(), "{text}");
        }

        CheckpointsCommand::Clear { id } => {
            if store.finalize(id)? {
                let _ = writeln!(host.output(), "Removed checkpoint '{id}'");
            } else {
                let _ = writeln!(host.output(), "No checkpoint named '{id}'");
            }
        }
    }

    Ok(())
}
