use crate::Result;
use crate::model::{ModuleInfo, ModuleKey, Snapshot, VersionSequence};
use ohno::{EnrichableExt, bail};
use serde::Serialize;
use std::collections::BTreeMap;

/// One change in a module's presence between consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    pub kind: ChangeKind,
    pub version: String,
}

/// Final classification, decided by presence in the first and last snapshots only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Absent at the start, present at the end.
    Added,

    /// Present at the start, absent at the end.
    Removed,

    /// Present at both ends, with churn in between.
    Unchanged,

    /// Absent at both ends but present somewhere in between.
    Transient,
}

/// The presence history of one module across the analyzed versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleLifecycle {
    pub module: ModuleInfo,
    pub present_at_start: bool,
    pub present_at_end: bool,
    pub events: Vec<LifecycleEvent>,
    pub outcome: Outcome,
}

impl ModuleLifecycle {
    /// Whether the module churned: more than a single add or remove.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.events.len() >= 2
    }

    /// Version at which the module was first seen being added.
    #[must_use]
    pub fn added_in(&self) -> Option<&str> {
        self.events
            .iter()
            .find(|e| e.kind == ChangeKind::Added)
            .map(|e| e.version.as_str())
    }

    /// Version at which the module was last seen being removed.
    #[must_use]
    pub fn removed_in(&self) -> Option<&str> {
        self.events
            .iter()
            .rev()
            .find(|e| e.kind == ChangeKind::Removed)
            .map(|e| e.version.as_str())
    }
}

/// Per-category outcome of a cumulative comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CumulativeCategory {
    /// Modules with at least one change, sorted by name.
    pub changes: Vec<ModuleLifecycle>,

    /// Modules present in every snapshot.
    pub stable: usize,

    pub start_total: usize,
    pub end_total: usize,
}

impl CumulativeCategory {
    fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &ModuleLifecycle> {
        self.changes.iter().filter(move |c| c.outcome == outcome)
    }
}

/// Difference analysis across a chronological run of snapshots of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CumulativeComparison {
    pub repository: String,
    pub versions_analyzed: Vec<String>,
    pub categories: BTreeMap<String, CumulativeCategory>,
}

impl CumulativeComparison {
    /// Modules absent at the first version and present at the last.
    pub fn added(&self) -> impl Iterator<Item = &ModuleLifecycle> {
        self.categories.values().flat_map(|c| c.with_outcome(Outcome::Added))
    }

    /// Modules present at the first version and absent at the last.
    pub fn removed(&self) -> impl Iterator<Item = &ModuleLifecycle> {
        self.categories.values().flat_map(|c| c.with_outcome(Outcome::Removed))
    }

    /// Changed modules that are present at the last version.
    pub fn still_present(&self) -> impl Iterator<Item = &ModuleLifecycle> {
        self.categories
            .values()
            .flat_map(|c| c.changes.iter())
            .filter(|c| c.present_at_end)
    }

    /// Modules that churned, whatever their final state.
    pub fn transient(&self) -> impl Iterator<Item = &ModuleLifecycle> {
        self.categories
            .values()
            .flat_map(|c| c.changes.iter())
            .filter(|c| c.is_transient())
    }

    #[must_use]
    pub fn first_version(&self) -> &str {
        self.versions_analyzed.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn last_version(&self) -> &str {
        self.versions_analyzed.last().map_or("", String::as_str)
    }
}

#[derive(Debug)]
struct Track {
    module: ModuleInfo,
    present: bool,
    present_at_start: bool,
    events: Vec<LifecycleEvent>,
}

/// Walk snapshots in the order given, recording every appearance and disappearance.
///
/// The snapshots must come from one repository, with strictly ascending semantic
/// versions; anything else is rejected rather than reordered.
pub fn compare_cumulative(snapshots: &[Snapshot]) -> Result<CumulativeComparison> {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        bail!("cumulative comparison needs at least two snapshots, got none");
    };

    if snapshots.len() < 2 {
        bail!("cumulative comparison needs at least two snapshots, got 1");
    }

    if let Some(other) = snapshots.iter().find(|s| s.repository() != first.repository()) {
        bail!(
            "cumulative comparison needs snapshots of one repository, got '{}' and '{}'",
            first.repository(),
            other.repository()
        );
    }

    let _ = VersionSequence::new(snapshots.iter().map(Snapshot::version))
        .map_err(|e| e.enrich("cumulative comparison needs snapshots in ascending version order"))?;

    let mut tracks: BTreeMap<ModuleKey, Track> = BTreeMap::new();

    for (index, snapshot) in snapshots.iter().enumerate() {
        for module in snapshot.iter() {
            let track = tracks.entry(module.key()).or_insert_with(|| Track {
                module: module.clone(),
                present: false,
                present_at_start: index == 0,
                events: Vec::new(),
            });

            if !track.present && index > 0 {
                track.events.push(LifecycleEvent {
                    kind: ChangeKind::Added,
                    version: snapshot.version().to_string(),
                });
            }

            track.present = true;
            track.module = module.clone();
        }

        for (key, track) in &mut tracks {
            if track.present && !snapshot.contains(key) {
                track.present = false;
                track.events.push(LifecycleEvent {
                    kind: ChangeKind::Removed,
                    version: snapshot.version().to_string(),
                });
            }
        }
    }

    let mut categories: BTreeMap<String, CumulativeCategory> = BTreeMap::new();
    for category in first.categories().chain(last.categories()) {
        let entry = categories.entry(category.to_string()).or_default();
        entry.start_total = first.modules(category).len();
        entry.end_total = last.modules(category).len();
    }

    for (key, track) in tracks {
        let category = categories.entry(key.category).or_default();

        if track.events.is_empty() {
            category.stable += 1;
            continue;
        }

        let outcome = match (track.present_at_start, track.present) {
            (false, true) => Outcome::Added,
            (true, false) => Outcome::Removed,
            (true, true) => Outcome::Unchanged,
            (false, false) => Outcome::Transient,
        };

        category.changes.push(ModuleLifecycle {
            module: track.module,
            present_at_start: track.present_at_start,
            present_at_end: track.present,
            events: track.events,
            outcome,
        });
    }

    Ok(CumulativeComparison {
        repository: first.repository().to_string(),
        versions_analyzed: snapshots.iter().map(|s| s.version().to_string()).collect(),
        categories,
    })
}
