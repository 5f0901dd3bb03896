use super::Host;
use super::common::Context;
use crate::Result;
use crate::history::{BatchOptions, HistoryTracker, Progress, TrackOptions};
use crate::model::{ModuleKey, SnapshotSource, VersionSource};
use crate::reports::{render_history, write_json_file};
use camino::Utf8PathBuf;
use clap::Parser;
use ohno::bail;
use std::io::Write;
use std::sync::Arc;

const LOG_TARGET: &str = "  commands";

#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Repository id or `owner/name`
    #[arg(value_name = "REPO")]
    pub repo: String,

    /// Only trace modules of these categories
    #[arg(long, value_name = "CATEGORY")]
    pub category: Vec<String>,

    /// Ignore cached records and search again
    #[arg(long)]
    pub force_refresh: bool,

    /// Checkpoint id; rerunning with the same id resumes an interrupted run
    #[arg(long, value_name = "ID")]
    pub operation_id: Option<String>,

    /// Also find the commit that introduced each module
    #[arg(long)]
    pub resolve_commits: bool,

    /// Write the records to a JSON file
    #[arg(long, value_name = "PATH")]
    pub json: Option<Utf8PathBuf>,
}

pub async fn trace_history<H: Host>(host: &mut H, ctx: &Context, args: &HistoryArgs) -> Result<()> {
    let (repo, handle) = ctx.repository(&args.repo)?;
    let settings = &ctx.config.history;

    let head = match (&settings.head_ref, &repo.version_override) {
        (Some(head), _) | (None, Some(head)) => head.clone(),
        (None, None) => handle.default_branch().await?,
    };

    let snapshot = handle.fetch_snapshot(&head).await?;
    let modules: Vec<ModuleKey> = snapshot
        .iter()
        .filter(|m| args.category.is_empty() || args.category.iter().any(|c| c == &m.category))
        .map(|m| m.key())
        .collect();

    if modules.is_empty() {
        bail!("no modules found in '{}' at '{head}'", handle.repo());
    }

    let versions = handle.list_versions().await?.releases_only();
    log::info!(target: LOG_TARGET, "Tracing {} modules over {} releases", modules.len(), versions.len());

    let operation_id = args
        .operation_id
        .clone()
        .unwrap_or_else(|| format!("history-{}", handle.repo().replace('/', "-")));

    let mut options = BatchOptions::new(operation_id, ctx.checkpoints());
    options.strategy = ctx.config.checkpoint.strategy();
    options.auto_cleanup = ctx.config.checkpoint.auto_cleanup;
    options.batch_size = settings.batch_size;
    options.batch_pause = settings.batch_pause;
    options.on_quota_exhausted = settings.on_quota_exhausted;
    options.track = TrackOptions {
        force_refresh: args.force_refresh,
        head_ref: Some(head),
        resolve_commits: args.resolve_commits || settings.resolve_commits,
    };

    let cache = ctx.history_cache(handle.repo());
    let tracker = HistoryTracker::new(handle, Arc::clone(&ctx.governor), cache, settings.conventions.clone());

    let progress = ctx.progress();
    let report = tracker.first_appearance_batch(&modules, &versions, &options, &progress).await;
    progress.done();
    let report = report?;

    if let Some(path) = &args.json {
        write_json_file(&report, path)?;
    }

    let mut text = String::new();
    render_history(&report, ctx.use_colors(), &mut text)?;
    let _ = write!(host.output(), "{text}");
    Ok(())
}
