use super::SnapshotRef;
use crate::Result;
use crate::model::{ModuleInfo, Snapshot};
use ohno::bail;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Per-category outcome of a version comparison. The three lists never share a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionDiff {
    pub added: Vec<ModuleInfo>,
    pub removed: Vec<ModuleInfo>,
    pub unchanged: Vec<ModuleInfo>,
}

impl VersionDiff {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Two versions of the same repository compared module by module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionComparison {
    pub source: SnapshotRef,
    pub target: SnapshotRef,
    pub categories: BTreeMap<String, VersionDiff>,
}

impl VersionComparison {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.categories.values().any(VersionDiff::has_changes)
    }
}

/// Compare two snapshots of one repository.
///
/// Unchanged modules are reported as they appear in `target`.
pub fn compare_versions(source: &Snapshot, target: &Snapshot) -> Result<VersionComparison> {
    if source.repository() != target.repository() {
        bail!(
            "version comparison needs two snapshots of one repository, got '{}' and '{}'",
            source.repository(),
            target.repository()
        );
    }

    Ok(VersionComparison {
        source: SnapshotRef::of(source),
        target: SnapshotRef::of(target),
        categories: diff_categories(source, target),
    })
}

pub(super) fn diff_categories(source: &Snapshot, target: &Snapshot) -> BTreeMap<String, VersionDiff> {
    let names: BTreeSet<&str> = source.categories().chain(target.categories()).collect();

    names
        .into_iter()
        .map(|category| {
            let mut diff = VersionDiff::default();

            for module in source.modules(category) {
                match target.get(&module.key()) {
                    Some(current) => diff.unchanged.push(current.clone()),
                    None => diff.removed.push(module.clone()),
                }
            }

            diff.added = target
                .modules(category)
                .iter()
                .filter(|m| !source.contains(&m.key()))
                .cloned()
                .collect();

            (category.to_string(), diff)
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn snap(version: &str, modules: &[(&str, &str)]) -> Snapshot {
        Snapshot::new(
            "prebid/Prebid.js",
            version,
            modules.iter().map(|(name, category)| ModuleInfo::new(*name, *category)),
        )
    }

    fn names(modules: &[ModuleInfo]) -> Vec<&str> {
        modules.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn added_removed_unchanged() {
        let a = snap("1.0.0", &[("foo", "Bidders"), ("bar", "Bidders")]);
        let b = snap("2.0.0", &[("bar", "Bidders"), ("baz", "Bidders")]);

        let cmp = compare_versions(&a, &b).unwrap();
        let diff = &cmp.categories["Bidders"];
        assert_eq!(names(&diff.added), vec!["baz"]);
        assert_eq!(names(&diff.removed), vec!["foo"]);
        assert_eq!(names(&diff.unchanged), vec!["bar"]);
        assert!(cmp.has_changes());
    }

    #[test]
    fn category_missing_on_one_side() {
        let a = snap("1.0.0", &[("ga", "Analytics Adapters")]);
        let b = snap("2.0.0", &[("foo", "Bid Adapters")]);

        let cmp = compare_versions(&a, &b).unwrap();
        assert_eq!(names(&cmp.categories["Analytics Adapters"].removed), vec!["ga"]);
        assert_eq!(names(&cmp.categories["Bid Adapters"].added), vec!["foo"]);
        assert!(cmp.categories["Bid Adapters"].removed.is_empty());
    }

    #[test]
    fn empty_sides() {
        let empty = snap("1.0.0", &[]);
        let full = snap("2.0.0", &[("a", "X"), ("b", "X")]);

        let grow = compare_versions(&empty, &full).unwrap();
        assert_eq!(grow.categories["X"].added.len(), 2);

        let shrink = compare_versions(&full, &empty).unwrap();
        assert_eq!(shrink.categories["X"].removed.len(), 2);

        let nothing = compare_versions(&empty, &empty).unwrap();
        assert!(nothing.categories.is_empty());
    }

    #[test]
    fn same_name_in_other_category_is_not_a_match() {
        let a = snap("1.0.0", &[("criteo", "Bid Adapters")]);
        let b = snap("2.0.0", &[("criteo", "Analytics Adapters")]);

        let cmp = compare_versions(&a, &b).unwrap();
        assert_eq!(names(&cmp.categories["Bid Adapters"].removed), vec!["criteo"]);
        assert_eq!(names(&cmp.categories["Analytics Adapters"].added), vec!["criteo"]);
    }

    #[test]
    fn unchanged_reports_target_details() {
        let a = Snapshot::new("r", "1.0.0", [ModuleInfo::new("foo", "X").with_path("modules/foo.js")]);
        let b = Snapshot::new("r", "2.0.0", [ModuleInfo::new("foo", "X").with_path("modules/foo.ts")]);

        let cmp = compare_versions(&a, &b).unwrap();
        assert_eq!(cmp.categories["X"].unchanged[0].path.as_deref(), Some("modules/foo.ts"));
    }

    #[test]
    fn different_repositories_are_rejected() {
        let a = Snapshot::new("prebid/Prebid.js", "1.0.0", []);
        let b = Snapshot::new("prebid/prebid-server", "1.0.0", []);
        let _ = compare_versions(&a, &b).unwrap_err();
    }
}
