use crate::Result;
use crate::checkpoint::Checkpoint;
use crate::compare::{
    ComparisonResult, ComparisonStatistics, CumulativeComparison, ModuleLifecycle, Outcome, RenameCandidate, RepositoryComparison,
    VersionComparison,
};
use crate::history::{BatchReport, BatchStatus, CacheInfo, HistoryOutcome, timeline};
use crate::model::{ModuleInfo, VersionCatalog};
use core::fmt::Write;
use owo_colors::OwoColorize;

fn added(text: &str, use_colors: bool) -> String {
    if use_colors { text.green().to_string() } else { text.to_string() }
}

fn removed(text: &str, use_colors: bool) -> String {
    if use_colors { text.red().to_string() } else { text.to_string() }
}

fn heading(text: &str, use_colors: bool) -> String {
    if use_colors { text.bold().to_string() } else { text.to_string() }
}

fn signed(n: i64) -> String {
    if n > 0 { format!("+{n}") } else { n.to_string() }
}

pub fn render_comparison<W: Write>(result: &ComparisonResult, use_colors: bool, writer: &mut W) -> Result<()> {
    match result {
        ComparisonResult::Versions(c) => versions(c, use_colors, writer)?,
        ComparisonResult::Repositories(c) => repositories(c, use_colors, writer)?,
        ComparisonResult::Cumulative(c) => cumulative(c, use_colors, writer)?,
    }

    summary(&result.statistics(), use_colors, writer)
}

fn versions<W: Write>(c: &VersionComparison, use_colors: bool, writer: &mut W) -> Result<()> {
    let title = format!("{} {} → {}", c.source.repository, c.source.version, c.target.version);
    writeln!(writer, "{}", heading(&title, use_colors))?;

    for (category, diff) in &c.categories {
        writeln!(writer)?;
        writeln!(
            writer,
            "{category}: {} → {} (+{}, -{})",
            diff.removed.len() + diff.unchanged.len(),
            diff.added.len() + diff.unchanged.len(),
            diff.added.len(),
            diff.removed.len()
        )?;

        list(writer, "+", &diff.added, |s| added(s, use_colors))?;
        list(writer, "-", &diff.removed, |s| removed(s, use_colors))?;
    }

    Ok(())
}

fn repositories<W: Write>(c: &RepositoryComparison, use_colors: bool, writer: &mut W) -> Result<()> {
    let title = format!(
        "{} {} ↔ {} {}",
        c.source.repository, c.source.version, c.target.repository, c.target.version
    );
    writeln!(writer, "{}", heading(&title, use_colors))?;
    writeln!(writer, "Overall overlap: {:.1}%", c.overlap_percentage())?;

    for (category, diff) in &c.categories {
        writeln!(writer)?;
        writeln!(
            writer,
            "{category}: {} shared, {} only in {}, {} only in {} ({:.1}% overlap)",
            diff.in_both.len(),
            diff.only_in_source.len(),
            c.source.repository,
            diff.only_in_target.len(),
            c.target.repository,
            diff.overlap_percentage()
        )?;

        list(writer, "<", &diff.only_in_source, |s| removed(s, use_colors))?;
        list(writer, ">", &diff.only_in_target, |s| added(s, use_colors))?;
    }

    if !c.unique_categories_source.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Categories only in {}: {}", c.source.repository, c.unique_categories_source.join(", "))?;
    }

    if !c.unique_categories_target.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Categories only in {}: {}", c.target.repository, c.unique_categories_target.join(", "))?;
    }

    Ok(())
}

fn cumulative<W: Write>(c: &CumulativeComparison, use_colors: bool, writer: &mut W) -> Result<()> {
    let title = format!(
        "{} {} → {} across {} versions",
        c.repository,
        c.first_version(),
        c.last_version(),
        c.versions_analyzed.len()
    );
    writeln!(writer, "{}", heading(&title, use_colors))?;

    for (category, cat) in &c.categories {
        writeln!(writer)?;
        writeln!(writer, "{category}: {} → {} ({} stable)", cat.start_total, cat.end_total, cat.stable)?;

        for change in &cat.changes {
            writeln!(writer, "  {}", lifecycle(change, use_colors))?;
        }
    }

    Ok(())
}

fn lifecycle(change: &ModuleLifecycle, use_colors: bool) -> String {
    let name = &change.module.name;
    let churn = if change.is_transient() {
        format!(" [{} changes]", change.events.len())
    } else {
        String::new()
    };

    match change.outcome {
        Outcome::Added => added(&format!("+ {name} (added in {}){churn}", change.added_in().unwrap_or("?")), use_colors),
        Outcome::Removed => removed(&format!("- {name} (removed in {}){churn}", change.removed_in().unwrap_or("?")), use_colors),
        Outcome::Unchanged => format!("= {name} (present at both ends){churn}"),
        Outcome::Transient => format!(
            "~ {name} (added in {}, removed in {}){churn}",
            change.added_in().unwrap_or("?"),
            change.removed_in().unwrap_or("?")
        ),
    }
}

fn summary<W: Write>(stats: &ComparisonStatistics, use_colors: bool, writer: &mut W) -> Result<()> {
    let t = &stats.totals;
    writeln!(writer)?;
    writeln!(
        writer,
        "{} {} → {}: {} added, {} removed, {} unchanged, net {} ({:+.1}%)",
        heading("Total", use_colors),
        t.source_total,
        t.target_total,
        added(&t.added.to_string(), use_colors),
        removed(&t.removed.to_string(), use_colors),
        t.unchanged,
        signed(t.net_change),
        t.growth_percentage
    )?;

    if t.transient > 0 {
        writeln!(writer, "{} modules churned along the way", t.transient)?;
    }

    if let Some(top) = stats.most_changed.first()
        && stats.category(top).is_some_and(|c| c.total_changes() > 0)
    {
        writeln!(writer, "Most changed category: {top}")?;
    }

    Ok(())
}

fn list<W: Write>(writer: &mut W, marker: &str, modules: &[ModuleInfo], paint: impl Fn(&str) -> String) -> Result<()> {
    for module in modules {
        writeln!(writer, "  {}", paint(&format!("{marker} {}", module.name)))?;
    }

    Ok(())
}

pub fn render_renames<W: Write>(candidates: &[RenameCandidate], writer: &mut W) -> Result<()> {
    if candidates.is_empty() {
        return Ok(());
    }

    writeln!(writer)?;
    writeln!(writer, "Possible renames:")?;
    for c in candidates {
        writeln!(
            writer,
            "  {} → {} ({}, {}, score {:.2})",
            c.old.name, c.new.name, c.category, c.method, c.score
        )?;
    }

    Ok(())
}

pub fn render_history<W: Write>(report: &BatchReport, use_colors: bool, writer: &mut W) -> Result<()> {
    for (major, records) in timeline(&report.records) {
        writeln!(writer, "{}", heading(&format!("Introduced in {major}.x ({})", records.len()), use_colors))?;
        for record in records {
            writeln!(writer, "  {} {}", record.first_version().unwrap_or("?"), record.module)?;
        }

        writeln!(writer)?;
    }

    let not_found: Vec<_> = report.records.iter().filter(|r| r.outcome == HistoryOutcome::NotFound).collect();
    if !not_found.is_empty() {
        writeln!(writer, "{}", heading("Not in any release", use_colors))?;
        for record in not_found {
            writeln!(writer, "  {}", record.module)?;
        }

        writeln!(writer)?;
    }

    let unresolved: Vec<_> = report.records.iter().filter(|r| r.is_unresolved()).collect();
    if !unresolved.is_empty() {
        writeln!(writer, "{}", heading("Unresolved", use_colors))?;
        for record in unresolved {
            writeln!(writer, "  {}", removed(&format!("{} ({})", record.module, record.file_path), use_colors))?;
        }

        writeln!(writer)?;
    }

    let probes: u64 = report.records.iter().map(|r| u64::from(r.probes)).sum();
    writeln!(writer, "{} modules, {probes} requests", report.records.len())?;

    if let BatchStatus::Suspended { reason } = &report.status {
        writeln!(writer, "Suspended: {reason}. Run again with the same operation id to resume.")?;
    }

    Ok(())
}

pub fn render_catalog<W: Write>(catalog: &VersionCatalog, use_colors: bool, writer: &mut W) -> Result<()> {
    let title = format!("{} (default branch {})", catalog.repository, catalog.default_branch);
    writeln!(writer, "{}", heading(&title, use_colors))?;

    for line in catalog.majors.values() {
        if line.first == line.last {
            writeln!(writer, "  {}.x: {}", line.major, line.first)?;
        } else {
            writeln!(writer, "  {}.x: {} … {}", line.major, line.first, line.last)?;
        }
    }

    if !catalog.latest.is_empty() {
        writeln!(writer, "Latest: {}", catalog.latest.join(", "))?;
    }

    Ok(())
}

pub fn render_checkpoint<W: Write>(checkpoint: &Checkpoint, writer: &mut W) -> Result<()> {
    let m = &checkpoint.metadata;
    writeln!(writer, "{}", checkpoint.operation_id)?;
    if let Some(kind) = &m.operation_kind {
        writeln!(writer, "  operation: {kind}")?;
    }

    match (m.total_items, m.progress_fraction()) {
        (Some(total), Some(fraction)) => writeln!(writer, "  progress:  {}/{total} ({:.1}%)", m.processed_items, fraction * 100.0)?,
        _ => writeln!(writer, "  progress:  {}", m.processed_items)?,
    }

    writeln!(writer, "  errors:    {}", m.error_count)?;
    if let (Some(remaining), Some(limit)) = (m.quota_remaining, m.quota_limit) {
        writeln!(writer, "  quota:     {remaining}/{limit}")?;
    }

    writeln!(writer, "  saves:     {}", m.save_count)?;
    if let Some(reason) = &m.last_save_reason {
        writeln!(writer, "  last save: {reason}")?;
    }

    writeln!(writer, "  created:   {}", checkpoint.created_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(writer, "  updated:   {}", checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    Ok(())
}

pub fn render_cache_info<W: Write>(info: &CacheInfo, writer: &mut W) -> Result<()> {
    writeln!(writer, "{}", info.repository)?;
    writeln!(writer, "  entries:    {}", info.entries)?;
    writeln!(writer, "  found:      {}", info.found)?;
    writeln!(writer, "  not found:  {}", info.not_found)?;
    writeln!(writer, "  unresolved: {}", info.unresolved)?;
    if info.unreadable > 0 {
        writeln!(writer, "  unreadable: {}", info.unreadable)?;
    }

    Ok(())
}
