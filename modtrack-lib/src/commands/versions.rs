use super::Host;
use super::common::Context;
use crate::Result;
use crate::model::{VersionCatalog, VersionSource};
use crate::reports::{render_catalog, write_json_file};
use camino::Utf8PathBuf;
use chrono::Utc;
use clap::Parser;
use ohno::bail;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct VersionsArgs {
    /// Repository id or `owner/name`
    #[arg(value_name = "REPO")]
    pub repo: String,

    /// List every release of one major version
    #[arg(long, value_name = "N")]
    pub major: Option<u64>,

    /// How many recent releases to show
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub latest: usize,

    /// Write the version catalog to a JSON file
    #[arg(long, value_name = "PATH")]
    pub json: Option<Utf8PathBuf>,
}

pub async fn list_versions<H: Host>(host: &mut H, ctx: &Context, args: &VersionsArgs) -> Result<()> {
    let (_, handle) = ctx.repository(&args.repo)?;
    let versions = handle.list_versions().await?;
    let branch = handle.default_branch().await?;
    let catalog = VersionCatalog::build(handle.repo(), branch, &versions, args.latest, Utc::now());

    if let Some(path) = &args.json {
        write_json_file(&catalog, path)?;
    }

    let mut text = String::new();
    if let Some(major) = args.major {
        let line = versions.for_major(major).releases_only();
        if line.is_empty() {
            bail!("'{}' has no {major}.x releases", handle.repo());
        }

        for tag in line.iter() {
            text.push_str(tag.raw());
            text.push('\n');
        }
    } else {
        render_catalog(&catalog, ctx.use_colors(), &mut text)?;
    }

    let _ = write!(host.output(), "{text}");
    Ok(())
}
