use crate::Result;
use crate::model::{HistoryKey, ModuleKey, categories};
use ohno::bail;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const NAME_PLACEHOLDER: &str = "{name}";

/// Maps a module's identity to the file that implements it.
///
/// Patterns are keyed by category and contain a `{name}` placeholder. Categories
/// without a pattern use `fallback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PathConvention {
    /// Directory the module files live in, relative to the repository root.
    pub directory: String,

    pub patterns: BTreeMap<String, String>,
    pub fallback: String,

    /// Lowercased module name to the spelling used in its file name.
    pub case_corrections: BTreeMap<String, String>,
}

impl Default for PathConvention {
    fn default() -> Self {
        let patterns = [
            (categories::BID_ADAPTERS, "{name}BidAdapter.js"),
            (categories::ANALYTICS_ADAPTERS, "{name}AnalyticsAdapter.js"),
            (categories::RTD_MODULES, "{name}RtdProvider.js"),
            (categories::USER_ID_MODULES, "{name}IdSystem.js"),
        ];

        Self {
            directory: "modules".to_string(),
            patterns: patterns.iter().map(|(c, p)| ((*c).to_string(), (*p).to_string())).collect(),
            fallback: "{name}.js".to_string(),
            case_corrections: [("a1media", "a1Media")]
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

impl PathConvention {
    /// Replace the pattern used for one category.
    #[must_use]
    pub fn with_pattern(mut self, category: impl Into<String>, pattern: impl Into<String>) -> Self {
        let _ = self.patterns.insert(category.into(), pattern.into());
        self
    }

    #[must_use]
    pub fn with_case_correction(mut self, name: &str, spelling: impl Into<String>) -> Self {
        let _ = self.case_corrections.insert(name.to_lowercase(), spelling.into());
        self
    }

    /// The file path a module is expected at, used as its history cache key.
    #[must_use]
    pub fn history_key(&self, module: &ModuleKey) -> HistoryKey {
        let name = self
            .case_corrections
            .get(&module.name.to_lowercase())
            .map_or(module.name.as_str(), String::as_str);

        let pattern = self.patterns.get(&module.category).unwrap_or(&self.fallback);
        let file = pattern.replace(NAME_PLACEHOLDER, name);

        let directory = self.directory.trim_end_matches('/');
        if directory.is_empty() {
            HistoryKey::new(file)
        } else {
            HistoryKey::new(format!("{directory}/{file}"))
        }
    }

    /// Fail when two distinct modules map to the same file, since they would share one history record.
    pub fn ensure_distinct<'a>(&self, modules: impl IntoIterator<Item = &'a ModuleKey>) -> Result<()> {
        let mut owners: HashMap<HistoryKey, &ModuleKey> = HashMap::new();
        for module in modules {
            let key = self.history_key(module);
            if let Some(&other) = owners.get(&key)
                && other != module
            {
                bail!(
                    "{other} and {module} both map to '{key}'; give one of these categories its own pattern under [history.conventions.patterns]"
                );
            }

            let _ = owners.insert(key, module);
        }

        Ok(())
    }
}
