use super::cumulative::{CumulativeCategory, CumulativeComparison, Outcome};
use super::repositories::RepositoryComparison;
use super::versions::VersionComparison;
use super::ComparisonResult;
use serde::Serialize;
use std::cmp::Ordering;

/// Counts for a single category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub source_total: usize,
    pub target_total: usize,
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,

    /// Entities that churned. Always zero outside cumulative comparisons.
    pub transient: usize,

    pub net_change: i64,
    pub growth_percentage: f64,
}

impl CategoryStats {
    fn new(category: &str, source_total: usize, target_total: usize, added: usize, removed: usize, unchanged: usize) -> Self {
        let net_change = signed(added) - signed(removed);
        Self {
            category: category.to_string(),
            source_total,
            target_total,
            added,
            removed,
            unchanged,
            transient: 0,
            net_change,
            growth_percentage: growth(net_change, source_total),
        }
    }

    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.added + self.removed
    }
}

/// Aggregate view over any comparison result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonStatistics {
    /// Per-category counts, in category name order.
    pub categories: Vec<CategoryStats>,

    /// Sums over all categories, reported under the category name `"total"`.
    pub totals: CategoryStats,

    /// Category names ranked by added + removed, descending.
    pub most_changed: Vec<String>,

    /// Category names ranked by growth percentage, descending.
    pub fastest_growing: Vec<String>,
}

impl ComparisonStatistics {
    #[must_use]
    pub const fn net_change(&self) -> i64 {
        self.totals.net_change
    }

    #[must_use]
    pub const fn growth_percentage(&self) -> f64 {
        self.totals.growth_percentage
    }

    #[must_use]
    pub fn category(&self, name: &str) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.category == name)
    }

    fn from_categories(categories: Vec<CategoryStats>) -> Self {
        let mut totals = CategoryStats {
            category: "total".to_string(),
            ..CategoryStats::default()
        };

        for c in &categories {
            totals.source_total += c.source_total;
            totals.target_total += c.target_total;
            totals.added += c.added;
            totals.removed += c.removed;
            totals.unchanged += c.unchanged;
            totals.transient += c.transient;
        }

        totals.net_change = signed(totals.added) - signed(totals.removed);
        totals.growth_percentage = growth(totals.net_change, totals.source_total);

        let most_changed = rank(&categories, |a, b| b.total_changes().cmp(&a.total_changes()));
        let fastest_growing = rank(&categories, |a, b| b.growth_percentage.total_cmp(&a.growth_percentage));

        Self {
            categories,
            totals,
            most_changed,
            fastest_growing,
        }
    }
}

impl From<&VersionComparison> for ComparisonStatistics {
    fn from(cmp: &VersionComparison) -> Self {
        Self::from_categories(
            cmp.categories
                .iter()
                .map(|(name, d)| {
                    CategoryStats::new(
                        name,
                        d.removed.len() + d.unchanged.len(),
                        d.added.len() + d.unchanged.len(),
                        d.added.len(),
                        d.removed.len(),
                        d.unchanged.len(),
                    )
                })
                .collect(),
        )
    }
}

impl From<&RepositoryComparison> for ComparisonStatistics {
    fn from(cmp: &RepositoryComparison) -> Self {
        Self::from_categories(
            cmp.categories
                .iter()
                .map(|(name, d)| {
                    CategoryStats::new(
                        name,
                        d.only_in_source.len() + d.in_both.len(),
                        d.only_in_target.len() + d.in_both.len(),
                        d.only_in_target.len(),
                        d.only_in_source.len(),
                        d.in_both.len(),
                    )
                })
                .collect(),
        )
    }
}

impl From<&CumulativeComparison> for ComparisonStatistics {
    fn from(cmp: &CumulativeComparison) -> Self {
        Self::from_categories(cmp.categories.iter().map(|(name, c)| cumulative_stats(name, c)).collect())
    }
}

impl From<&ComparisonResult> for ComparisonStatistics {
    fn from(result: &ComparisonResult) -> Self {
        match result {
            ComparisonResult::Versions(cmp) => cmp.into(),
            ComparisonResult::Repositories(cmp) => cmp.into(),
            ComparisonResult::Cumulative(cmp) => cmp.into(),
        }
    }
}

fn cumulative_stats(name: &str, category: &CumulativeCategory) -> CategoryStats {
    let count = |outcome: Outcome| category.changes.iter().filter(|c| c.outcome == outcome).count();

    let mut stats = CategoryStats::new(
        name,
        category.start_total,
        category.end_total,
        count(Outcome::Added),
        count(Outcome::Removed),
        category.stable + count(Outcome::Unchanged),
    );
    stats.transient = category.changes.iter().filter(|c| c.is_transient()).count();
    stats
}

fn rank(categories: &[CategoryStats], order: impl Fn(&CategoryStats, &CategoryStats) -> Ordering) -> Vec<String> {
    let mut ranked: Vec<&CategoryStats> = categories.iter().collect();
    ranked.sort_by(|a, b| order(a, b).then_with(|| a.category.cmp(&b.category)));
    ranked.into_iter().map(|c| c.category.clone()).collect()
}

#[expect(clippy::cast_possible_wrap, reason = "module counts are far below i64::MAX")]
const fn signed(n: usize) -> i64 {
    n as i64
}

#[expect(clippy::cast_precision_loss, reason = "module counts are far below 2^52")]
fn growth(net_change: i64, source_total: usize) -> f64 {
    net_change as f64 / source_total.max(1) as f64 * 100.0
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::compare::{compare_cumulative, compare_repositories, compare_versions};
    use crate::model::{ModuleInfo, Snapshot};

    fn snap(repository: &str, version: &str, modules: &[(&str, &str)]) -> Snapshot {
        Snapshot::new(
            repository,
            version,
            modules.iter().map(|(name, category)| ModuleInfo::new(*name, *category)),
        )
    }

    #[test]
    fn version_statistics() {
        let a = snap("r", "1.0.0", &[("x", "Bid Adapters"), ("y", "Bid Adapters"), ("u", "User ID Modules")]);
        let b = snap("r", "2.0.0", &[("x", "Bid Adapters"), ("z", "Bid Adapters"), ("w", "Bid Adapters"), ("u", "User ID Modules")]);

        let stats = ComparisonStatistics::from(&compare_versions(&a, &b).unwrap());
        let bids = stats.category("Bid Adapters").unwrap();
        assert_eq!((bids.added, bids.removed, bids.unchanged), (2, 1, 1));
        assert_eq!((bids.source_total, bids.target_total), (2, 3));
        assert_eq!(bids.net_change, 1);
        assert!((bids.growth_percentage - 50.0).abs() < 1e-9);

        assert_eq!(stats.net_change(), 1);
        assert_eq!(stats.totals.source_total, 3);
        assert_eq!(stats.most_changed, vec!["Bid Adapters", "User ID Modules"]);
    }

    #[test]
    fn growth_from_empty_category_uses_unit_denominator() {
        let a = snap("r", "1.0.0", &[]);
        let b = snap("r", "2.0.0", &[("x", "Bid Adapters"), ("y", "Bid Adapters")]);

        let stats = ComparisonStatistics::from(&compare_versions(&a, &b).unwrap());
        let bids = stats.category("Bid Adapters").unwrap();
        assert!((bids.growth_percentage - 200.0).abs() < 1e-9);
    }

    #[test]
    fn ties_are_broken_by_category_name() {
        let a = snap("r", "1.0.0", &[("a", "Zeta"), ("b", "Alpha"), ("c", "Mid"), ("d", "Mid")]);
        let b = snap("r", "2.0.0", &[("a2", "Zeta"), ("b2", "Alpha"), ("c", "Mid"), ("d", "Mid")]);

        let stats = ComparisonStatistics::from(&compare_versions(&a, &b).unwrap());
        assert_eq!(stats.most_changed, vec!["Alpha", "Zeta", "Mid"]);
        assert_eq!(stats.fastest_growing, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn fastest_growing_is_descending() {
        let a = snap("r", "1.0.0", &[("a", "Shrinking"), ("b", "Shrinking"), ("c", "Growing")]);
        let b = snap("r", "2.0.0", &[("c", "Growing"), ("d", "Growing")]);

        let stats = ComparisonStatistics::from(&compare_versions(&a, &b).unwrap());
        assert_eq!(stats.fastest_growing, vec!["Growing", "Shrinking"]);
        assert_eq!(stats.category("Shrinking").unwrap().net_change, -2);
    }

    #[test]
    fn repository_statistics_map_buckets() {
        let js = snap("prebid/Prebid.js", "9.0.0", &[("a", "Bid Adapters"), ("b", "Bid Adapters")]);
        let go = snap("prebid/prebid-server", "3.0.0", &[("b", "Bid Adapters"), ("c", "Bid Adapters"), ("d", "Bid Adapters")]);

        let stats = ComparisonStatistics::from(&compare_repositories(&js, &go));
        let bids = stats.category("Bid Adapters").unwrap();
        assert_eq!((bids.added, bids.removed, bids.unchanged), (2, 1, 1));
    }

    #[test]
    fn cumulative_statistics_count_transients() {
        let run = [
            snap("r", "1.0.0", &[("a", "Bid Adapters")]),
            snap("r", "1.1.0", &[("a", "Bid Adapters"), ("t", "Bid Adapters")]),
            snap("r", "1.2.0", &[("a", "Bid Adapters"), ("n", "Bid Adapters")]),
        ];

        let stats = ComparisonStatistics::from(&compare_cumulative(&run).unwrap());
        let bids = stats.category("Bid Adapters").unwrap();
        assert_eq!((bids.added, bids.removed, bids.unchanged, bids.transient), (1, 0, 1, 1));
        assert_eq!((bids.source_total, bids.target_total), (1, 2));
    }
}
