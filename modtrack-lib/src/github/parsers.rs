//! Turning directory listings into module inventories.

use crate::model::{ModuleInfo, categories};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of a repository directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,

    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl DirEntry {
    #[cfg(test)]
    pub(crate) fn file(path: &str) -> Self {
        Self::of(path, EntryKind::File)
    }

    #[cfg(test)]
    pub(crate) fn dir(path: &str) -> Self {
        Self::of(path, EntryKind::Dir)
    }

    #[cfg(test)]
    fn of(path: &str, kind: EntryKind) -> Self {
        Self {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,

    #[serde(other)]
    Other,
}

/// How a repository lays out its modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParserKind {
    /// Prebid.js: one file per module under `modules/`, categorized by file name suffix.
    PrebidJs,

    /// Prebid Server (Go): one directory per module.
    PrebidServerGo,

    /// Prebid Server (Java): one directory per module.
    PrebidServerJava,

    /// Every entry under the configured path is a module.
    #[default]
    Default,
}

const JS_SUFFIXES: [(&str, &str); 4] = [
    ("BidAdapter", categories::BID_ADAPTERS),
    ("AnalyticsAdapter", categories::ANALYTICS_ADAPTERS),
    ("RtdProvider", categories::RTD_MODULES),
    ("IdSystem", categories::USER_ID_MODULES),
];

const GO_ANALYTICS_EXCLUDED: [&str; 3] = ["build", "clients", "filesystem"];
const JAVA_ANALYTICS_EXCLUDED: [&str; 1] = ["log"];

impl ParserKind {
    /// How many directory levels below a category path hold module names.
    #[must_use]
    pub fn listing_depth(self, category: &str) -> usize {
        if self == Self::PrebidServerGo && category == categories::GENERAL_MODULES {
            2
        } else {
            1
        }
    }

    /// Extract the modules of `category` from the listing of `base_path`.
    ///
    /// For two-level listings `entries` holds the second level. Results are sorted by name.
    #[must_use]
    pub fn categorize(self, category: &str, base_path: &str, entries: &[DirEntry]) -> Vec<ModuleInfo> {
        let mut modules = match self {
            Self::PrebidJs => prebid_js(base_path, entries),
            Self::PrebidServerGo if self.listing_depth(category) == 2 => nested(category, base_path, entries),
            Self::PrebidServerGo => directories(category, entries, |name| {
                if category == categories::ANALYTICS_ADAPTERS && GO_ANALYTICS_EXCLUDED.contains(&name) {
                    None
                } else {
                    Some(name.to_string())
                }
            }),
            Self::PrebidServerJava => directories(category, entries, |name| {
                if category == categories::ANALYTICS_ADAPTERS && JAVA_ANALYTICS_EXCLUDED.contains(&name) {
                    None
                } else if category == categories::GENERAL_MODULES {
                    Some(name.strip_prefix("pb-").unwrap_or(name).to_string())
                } else {
                    Some(name.to_string())
                }
            }),
            Self::Default => entries
                .iter()
                .map(|e| ModuleInfo::new(strip_extension(&e.name), category).with_path(&e.path))
                .collect(),
        };

        modules.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        modules
    }
}

fn prebid_js(base_path: &str, entries: &[DirEntry]) -> Vec<ModuleInfo> {
    let prefix = format!("{}/", base_path.trim_end_matches('/'));
    let mut seen: BTreeMap<(String, &str), (ModuleInfo, bool)> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.kind == EntryKind::File) {
        let relative = entry.path.strip_prefix(&prefix).unwrap_or(&entry.path);
        if relative.contains('/') || entry.name.ends_with(".d.ts") {
            continue;
        }

        let (stem, is_ts) = if let Some(stem) = entry.name.strip_suffix(".ts") {
            (stem, true)
        } else if let Some(stem) = entry.name.strip_suffix(".js") {
            (stem, false)
        } else {
            continue;
        };

        let (name, category) = JS_SUFFIXES
            .iter()
            .find_map(|(suffix, category)| stem.strip_suffix(suffix).map(|n| (n, *category)))
            .unwrap_or((stem, categories::OTHER_MODULES));

        if name.is_empty() {
            continue;
        }

        let key = (name.to_string(), category);
        if seen.get(&key).is_some_and(|(_, was_ts)| *was_ts && !is_ts) {
            continue;
        }

        let _ = seen.insert(key, (ModuleInfo::new(name, category).with_path(&entry.path), is_ts));
    }

    seen.into_values().map(|(m, _)| m).collect()
}

fn directories(category: &str, entries: &[DirEntry], name_of: impl Fn(&str) -> Option<String>) -> Vec<ModuleInfo> {
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::Dir)
        .filter_map(|e| name_of(&e.name).map(|name| ModuleInfo::new(name, category).with_path(&e.path)))
        .collect()
}

/// `vendor/module` directory pairs, named `vendor_module`.
fn nested(category: &str, base_path: &str, entries: &[DirEntry]) -> Vec<ModuleInfo> {
    let prefix = format!("{}/", base_path.trim_end_matches('/'));
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::Dir)
        .filter_map(|e| {
            let relative = e.path.strip_prefix(&prefix)?;
            let (vendor, module) = relative.split_once('/')?;
            if module.contains('/') {
                return None;
            }

            Some(ModuleInfo::new(format!("{vendor}_{module}"), category).with_path(&e.path))
        })
        .collect()
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn names(modules: &[ModuleInfo], category: &str) -> Vec<String> {
        modules.iter().filter(|m| m.category == category).map(|m| m.name.clone()).collect()
    }

    #[test]
    fn prebid_js_classifies_by_suffix() {
        let entries = [
            DirEntry::file("modules/appnexusBidAdapter.js"),
            DirEntry::file("modules/rubiconBidAdapter.ts"),
            DirEntry::file("modules/rubiconBidAdapter.js"),
            DirEntry::file("modules/atsAnalyticsAdapter.js"),
            DirEntry::file("modules/browsiRtdProvider.js"),
            DirEntry::file("modules/criteoIdSystem.js"),
            DirEntry::file("modules/consentManagement.js"),
            DirEntry::file("modules/types.d.ts"),
            DirEntry::file("modules/README.md"),
            DirEntry::file("modules/BidAdapter.js"),
            DirEntry::dir("modules/appnexusBidAdapter"),
        ];

        let modules = ParserKind::PrebidJs.categorize("Modules", "modules", &entries);

        assert_eq!(names(&modules, categories::BID_ADAPTERS), ["appnexus", "rubicon"]);
        assert_eq!(names(&modules, categories::ANALYTICS_ADAPTERS), ["ats"]);
        assert_eq!(names(&modules, categories::RTD_MODULES), ["browsi"]);
        assert_eq!(names(&modules, categories::USER_ID_MODULES), ["criteo"]);
        assert_eq!(names(&modules, categories::OTHER_MODULES), ["consentManagement"]);

        let rubicon = modules.iter().find(|m| m.name == "rubicon").unwrap();
        assert_eq!(rubicon.path.as_deref(), Some("modules/rubiconBidAdapter.ts"));
    }

    #[test]
    fn typescript_wins_regardless_of_order() {
        let entries = [DirEntry::file("modules/fooBidAdapter.ts"), DirEntry::file("modules/fooBidAdapter.js")];
        let modules = ParserKind::PrebidJs.categorize("Modules", "modules", &entries);
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].path.as_deref(), Some("modules/fooBidAdapter.ts"));
    }

    #[test]
    fn go_directories() {
        let analytics = [
            DirEntry::dir("analytics/pubstack"),
            DirEntry::dir("analytics/build"),
            DirEntry::dir("analytics/clients"),
            DirEntry::dir("analytics/filesystem"),
            DirEntry::file("analytics/core.go"),
        ];
        let modules = ParserKind::PrebidServerGo.categorize(categories::ANALYTICS_ADAPTERS, "analytics", &analytics);
        assert_eq!(names(&modules, categories::ANALYTICS_ADAPTERS), ["pubstack"]);

        let bidders = [DirEntry::dir("adapters/33across"), DirEntry::dir("adapters/appnexus")];
        let modules = ParserKind::PrebidServerGo.categorize(categories::BID_ADAPTERS, "adapters", &bidders);
        assert_eq!(names(&modules, categories::BID_ADAPTERS), ["33across", "appnexus"]);
    }

    #[test]
    fn go_general_modules_are_two_levels_deep() {
        assert_eq!(ParserKind::PrebidServerGo.listing_depth(categories::GENERAL_MODULES), 2);
        assert_eq!(ParserKind::PrebidServerGo.listing_depth(categories::BID_ADAPTERS), 1);
        assert_eq!(ParserKind::PrebidServerJava.listing_depth(categories::GENERAL_MODULES), 1);

        let entries = [
            DirEntry::dir("modules/prebid/ortb2blocking"),
            DirEntry::dir("modules/fiftyonedegrees/devicedetection"),
            DirEntry::file("modules/prebid/README.md"),
        ];
        let modules = ParserKind::PrebidServerGo.categorize(categories::GENERAL_MODULES, "modules", &entries);
        assert_eq!(
            names(&modules, categories::GENERAL_MODULES),
            ["fiftyonedegrees_devicedetection", "prebid_ortb2blocking"]
        );
    }

    #[test]
    fn java_rules() {
        let analytics = [DirEntry::dir("reporter/log"), DirEntry::dir("reporter/pubstack")];
        let modules = ParserKind::PrebidServerJava.categorize(categories::ANALYTICS_ADAPTERS, "reporter", &analytics);
        assert_eq!(names(&modules, categories::ANALYTICS_ADAPTERS), ["pubstack"]);

        let general = [DirEntry::dir("extra/modules/pb-richmedia-filter"), DirEntry::dir("extra/modules/ortb2-blocking")];
        let modules = ParserKind::PrebidServerJava.categorize(categories::GENERAL_MODULES, "extra/modules", &general);
        assert_eq!(names(&modules, categories::GENERAL_MODULES), ["ortb2-blocking", "richmedia-filter"]);
    }

    #[test]
    fn default_strips_extensions() {
        let entries = [DirEntry::file("docs/appnexus.md"), DirEntry::dir("docs/criteo"), DirEntry::file("docs/.hidden")];
        let modules = ParserKind::Default.categorize("Docs", "docs", &entries);
        assert_eq!(names(&modules, "Docs"), [".hidden", "appnexus", "criteo"]);
    }

    #[test]
    fn parses_contents_listing() {
        let json = r#"[
            {"name": "a.js", "path": "modules/a.js", "type": "file", "sha": "1"},
            {"name": "b", "path": "modules/b", "type": "dir", "sha": "2"},
            {"name": "c", "path": "modules/c", "type": "submodule", "sha": "3"}
        ]"#;
        let entries: Vec<DirEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[1].kind, EntryKind::Dir);
        assert_eq!(entries[2].kind, EntryKind::Other);
    }

    #[test]
    fn parser_names() {
        assert_eq!("prebid_server_go".parse::<ParserKind>().unwrap(), ParserKind::PrebidServerGo);
        assert_eq!(ParserKind::PrebidJs.to_string(), "prebid_js");
    }
}
