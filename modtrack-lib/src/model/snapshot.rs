use super::{ModuleInfo, ModuleKey};
use crate::Result;
use chrono::{DateTime, Utc};
use ohno::bail;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

const LOG_TARGET: &str = "  snapshot";

/// The modules of one repository at one version, grouped by category.
///
/// Immutable once built. Within a snapshot every [`ModuleKey`] appears at most once;
/// modules in a category are kept sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    repository: String,
    version: String,
    taken_at: Option<DateTime<Utc>>,
    categories: BTreeMap<String, Vec<ModuleInfo>>,
}

impl Snapshot {
    /// Build a snapshot, dropping repeated `(name, category)` pairs.
    ///
    /// The first occurrence of a pair wins; later duplicates are discarded.
    #[must_use]
    pub fn new(repository: impl Into<String>, version: impl Into<String>, modules: impl IntoIterator<Item = ModuleInfo>) -> Self {
        let repository = repository.into();
        let version = version.into();
        let (categories, dropped) = group(modules);

        if dropped > 0 {
            log::debug!(target: LOG_TARGET, "Dropped {dropped} duplicate module(s) from {repository}@{version}");
        }

        Self {
            repository,
            version,
            taken_at: None,
            categories,
        }
    }

    /// Build a snapshot, rejecting input that repeats a `(name, category)` pair.
    pub fn strict(
        repository: impl Into<String>,
        version: impl Into<String>,
        modules: impl IntoIterator<Item = ModuleInfo>,
    ) -> Result<Self> {
        let repository = repository.into();
        let version = version.into();

        let mut seen = HashSet::new();
        let mut collected = Vec::new();
        for module in modules {
            if !seen.insert(module.key()) {
                bail!("duplicate module {} in snapshot of {repository}@{version}", module.key());
            }
            collected.push(module);
        }

        Ok(Self::new(repository, version, collected))
    }

    /// Record when the snapshot was taken.
    #[must_use]
    pub const fn taken_at(mut self, when: DateTime<Utc>) -> Self {
        self.taken_at = Some(when);
        self
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }

    /// Category names, sorted.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Modules of one category, sorted by name; empty for unknown categories.
    #[must_use]
    pub fn modules(&self, category: &str) -> &[ModuleInfo] {
        self.categories.get(category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Comparison identities of one category, sorted by name.
    pub fn keys<'a>(&'a self, category: &'a str) -> impl Iterator<Item = ModuleKey> + 'a {
        self.modules(category).iter().map(ModuleInfo::key)
    }

    /// Every module, ordered by category then name.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.categories.values().flatten()
    }

    #[must_use]
    pub fn get(&self, key: &ModuleKey) -> Option<&ModuleInfo> {
        let modules = self.categories.get(&key.category)?;
        modules
            .binary_search_by(|m| m.name.as_str().cmp(&key.name))
            .ok()
            .map(|i| &modules[i])
    }

    #[must_use]
    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.values().all(Vec::is_empty)
    }
}

fn group(modules: impl IntoIterator<Item = ModuleInfo>) -> (BTreeMap<String, Vec<ModuleInfo>>, usize) {
    let mut seen = HashSet::new();
    let mut categories: BTreeMap<String, Vec<ModuleInfo>> = BTreeMap::new();
    let mut dropped = 0;

    for module in modules {
        if seen.insert(module.key()) {
            categories.entry(module.category.clone()).or_default().push(module);
        } else {
            dropped += 1;
        }
    }

    for modules in categories.values_mut() {
        modules.sort_by(|a, b| a.name.cmp(&b.name));
    }

    (categories, dropped)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn bidder(name: &str) -> ModuleInfo {
        ModuleInfo::new(name, "Bid Adapters")
    }

    #[test]
    fn groups_and_sorts() {
        let snapshot = Snapshot::new(
            "prebid/Prebid.js",
            "9.0.0",
            [bidder("rubicon"), ModuleInfo::new("ga", "Analytics Adapters"), bidder("appnexus")],
        );

        assert_eq!(snapshot.categories().collect::<Vec<_>>(), vec!["Analytics Adapters", "Bid Adapters"]);
        let names: Vec<_> = snapshot.modules("Bid Adapters").iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["appnexus", "rubicon"]);
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.modules("Nope").is_empty());
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let snapshot = Snapshot::new(
            "r",
            "1.0.0",
            [
                bidder("foo").with_path("modules/fooBidAdapter.js"),
                bidder("foo").with_path("modules/fooBidAdapter.ts"),
            ],
        );

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.modules("Bid Adapters")[0].path.as_deref(), Some("modules/fooBidAdapter.js"));
    }

    #[test]
    fn strict_rejects_duplicates() {
        let err = Snapshot::strict("r", "1.0.0", [bidder("foo"), bidder("foo")]).unwrap_err();
        assert!(err.to_string().contains("duplicate module foo"));

        let ok = Snapshot::strict("r", "1.0.0", [bidder("foo"), ModuleInfo::new("foo", "Analytics Adapters")]).unwrap();
        assert_eq!(ok.len(), 2);
    }

    #[test]
    fn lookup_by_key() {
        let snapshot = Snapshot::new("r", "1.0.0", [bidder("a"), bidder("b"), bidder("c")]);

        assert!(snapshot.contains(&ModuleKey::new("b", "Bid Adapters")));
        assert!(!snapshot.contains(&ModuleKey::new("b", "Analytics Adapters")));
        assert!(!snapshot.contains(&ModuleKey::new("B", "Bid Adapters")));
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = Snapshot::new("r", "1.0.0", []);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
        assert_eq!(snapshot.iter().count(), 0);
    }

    #[test]
    fn metadata() {
        let when = Utc::now();
        let snapshot = Snapshot::new("prebid/Prebid.js", "v9.1.0", []).taken_at(when);

        assert_eq!(snapshot.repository(), "prebid/Prebid.js");
        assert_eq!(snapshot.version(), "v9.1.0");
        assert_eq!(snapshot.timestamp(), Some(when));
    }
}
