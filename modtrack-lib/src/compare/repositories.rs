use super::SnapshotRef;
use super::versions::diff_categories;
use crate::model::{ModuleInfo, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-category outcome of a repository comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryDiff {
    pub only_in_source: Vec<ModuleInfo>,
    pub only_in_target: Vec<ModuleInfo>,

    /// Reported as they appear in the target repository.
    pub in_both: Vec<ModuleInfo>,
}

impl RepositoryDiff {
    #[must_use]
    pub fn total(&self) -> usize {
        self.only_in_source.len() + self.only_in_target.len() + self.in_both.len()
    }

    /// Share of the category's modules found in both repositories, as a percentage.
    #[must_use]
    pub fn overlap_percentage(&self) -> f64 {
        percentage(self.in_both.len(), self.total())
    }
}

/// Two repositories compared module by module. Category sets need not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryComparison {
    pub source: SnapshotRef,
    pub target: SnapshotRef,
    pub categories: BTreeMap<String, RepositoryDiff>,
    pub unique_categories_source: Vec<String>,
    pub unique_categories_target: Vec<String>,
    pub common_categories: Vec<String>,
}

impl RepositoryComparison {
    #[must_use]
    pub fn overlap_percentage(&self) -> f64 {
        let both = self.categories.values().map(|d| d.in_both.len()).sum();
        let total = self.categories.values().map(RepositoryDiff::total).sum();
        percentage(both, total)
    }
}

#[must_use]
pub fn compare_repositories(source: &Snapshot, target: &Snapshot) -> RepositoryComparison {
    let mut unique_categories_source = Vec::new();
    let mut unique_categories_target = Vec::new();
    let mut common_categories = Vec::new();

    let categories = diff_categories(source, target)
        .into_iter()
        .map(|(category, diff)| {
            let in_source = !source.modules(&category).is_empty();
            let in_target = !target.modules(&category).is_empty();
            match (in_source, in_target) {
                (true, true) => common_categories.push(category.clone()),
                (true, false) => unique_categories_source.push(category.clone()),
                (false, _) => unique_categories_target.push(category.clone()),
            }

            let diff = RepositoryDiff {
                only_in_source: diff.removed,
                only_in_target: diff.added,
                in_both: diff.unchanged,
            };
            (category, diff)
        })
        .collect();

    RepositoryComparison {
        source: SnapshotRef::of(source),
        target: SnapshotRef::of(target),
        categories,
        unique_categories_source,
        unique_categories_target,
        common_categories,
    }
}

#[expect(clippy::cast_precision_loss, reason = "module counts are far below 2^52")]
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }

    part as f64 / whole as f64 * 100.0
}
