use super::Host;
use super::common::Context;
use crate::Result;
use crate::compare::{ComparisonRequest, ComparisonResult, compare, detect_renames};
use crate::history::Progress;
use crate::model::{Snapshot, SnapshotSource, VersionSource};
use crate::reports::{render_comparison, render_renames, write_json_file};
use camino::Utf8PathBuf;
use clap::Parser;
use core::sync::atomic::{AtomicU64, Ordering};
use ohno::{EnrichableExt, bail};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Repository id or `owner/name`
    #[arg(value_name = "REPO")]
    pub repo: String,

    /// Older version
    #[arg(long, value_name = "VERSION")]
    pub from: String,

    /// Newer version (default is the latest release)
    #[arg(long, value_name = "VERSION")]
    pub to: Option<String>,

    /// Analyze every release between the two versions, not just the endpoints
    #[arg(long)]
    pub cumulative: bool,

    /// Suggest removed modules that reappeared under a new name
    #[arg(long, conflicts_with = "cumulative")]
    pub renames: bool,

    /// Write the comparison to a JSON file
    #[arg(long, value_name = "PATH")]
    pub json: Option<Utf8PathBuf>,
}

#[derive(Parser, Debug)]
pub struct CompareReposArgs {
    /// Source repository id or `owner/name`
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Target repository id or `owner/name`
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Version of the source repository (default is its latest release)
    #[arg(long, value_name = "VERSION")]
    pub source_version: Option<String>,

    /// Version of the target repository (default is its latest release)
    #[arg(long, value_name = "VERSION")]
    pub target_version: Option<String>,

    /// Write the comparison to a JSON file
    #[arg(long, value_name = "PATH")]
    pub json: Option<Utf8PathBuf>,
}

#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    #[serde(flatten)]
    result: &'a ComparisonResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    renames: Option<T>,
}

pub async fn compare_versions<H: Host>(host: &mut H, ctx: &Context, args: &CompareArgs) -> Result<()> {
    let (repo, handle) = ctx.repository(&args.repo)?;
    let to = match &args.to {
        Some(v) => v.clone(),
        None => ctx.default_version(repo, &handle).await?,
    };

    let result = if args.cumulative {
        let versions = handle.list_versions().await?.between(&args.from, &to)?;
        if versions.len() < 2 {
            bail!("a cumulative comparison needs at least two versions between '{}' and '{to}'", args.from);
        }

        let progress = ctx.progress();
        progress.set_phase("Fetching");
        let fetched = Arc::new(AtomicU64::new(0));
        let total = versions.len() as u64;
        let counter = Arc::clone(&fetched);
        progress.set_determinate(Box::new(move || (total, counter.load(Ordering::Relaxed), "snapshots".to_string())));

        let mut snapshots = Vec::with_capacity(versions.len());
        for tag in versions.iter() {
            let snapshot = handle.fetch_snapshot(tag.raw()).await;
            match snapshot {
                Ok(s) => snapshots.push(s),
                Err(e) => {
                    progress.done();
                    return Err(e.enrich(format!("fetching '{}' at '{tag}'", handle.repo())));
                }
            }

            let _ = fetched.fetch_add(1, Ordering::Relaxed);
        }

        progress.done();
        compare(ComparisonRequest::Cumulative { snapshots: &snapshots })?
    } else {
        let source = handle.fetch_snapshot(&args.from).await?;
        let target = handle.fetch_snapshot(&to).await?;
        compare(ComparisonRequest::Versions {
            source: &source,
            target: &target,
        })?
    };

    let renames = match (&result, args.renames) {
        (ComparisonResult::Versions(c), true) => Some(detect_renames(c, &ctx.config.renames)),
        _ => None,
    };

    if let Some(path) = &args.json {
        write_json_file(&Report { result: &result, renames: renames.as_ref() }, path)?;
    }

    let mut text = String::new();
    render_comparison(&result, ctx.use_colors(), &mut text)?;
    if let Some(renames) = &renames {
        render_renames(renames, &mut text)?;
    }

    let _ = write!(host.output(), "{text}");
    Ok(())
}

pub async fn compare_repos<H: Host>(host: &mut H, ctx: &Context, args: &CompareReposArgs) -> Result<()> {
    let source = snapshot_of(ctx, &args.source, args.source_version.as_deref()).await?;
    let target = snapshot_of(ctx, &args.target, args.target_version.as_deref()).await?;

    let result = compare(ComparisonRequest::Repositories {
        source: &source,
        target: &target,
    })?;

    if let Some(path) = &args.json {
        write_json_file(&result, path)?;
    }

    let mut text = String::new();
    render_comparison(&result, ctx.use_colors(), &mut text)?;
    let _ = write!(host.output(), "{text}");
    Ok(())
}

async fn snapshot_of(ctx: &Context, id: &str, version: Option<&str>) -> Result<Snapshot> {
    let (repo, handle) = ctx.repository(id)?;
    let version = match version {
        Some(v) => v.to_string(),
        None => ctx.default_version(repo, &handle).await?,
    };

    handle.fetch_snapshot(&version).await
}
