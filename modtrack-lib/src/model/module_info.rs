use core::fmt;
use serde::{Deserialize, Serialize};

/// Category names used by the Prebid repositories.
pub mod categories {
    pub const BID_ADAPTERS: &str = "Bid Adapters";
    pub const ANALYTICS_ADAPTERS: &str = "Analytics Adapters";
    pub const RTD_MODULES: &str = "Real-Time Data Modules";
    pub const USER_ID_MODULES: &str = "User ID Modules";
    pub const OTHER_MODULES: &str = "Other Modules";
    pub const GENERAL_MODULES: &str = "General Modules";
    pub const PRIVACY_MODULES: &str = "Privacy Modules";
}

/// A named module belonging to a category, as found in one repository version.
///
/// `path` and `repository` are informational. Two modules are the same module when
/// their [`ModuleKey`]s are equal, wherever they were found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl ModuleInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            path: None,
            repository: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    #[must_use]
    pub fn key(&self) -> ModuleKey {
        ModuleKey::new(&self.name, &self.category)
    }
}

/// Identity of a module for comparison purposes: `(name, category)`.
///
/// Ordered by category first so sorted collections group naturally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleKey {
    pub category: String,
    pub name: String,
}

impl ModuleKey {
    #[must_use]
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.category)
    }
}

/// Key of a history record: the module's file path within its repository.
///
/// Not interchangeable with [`ModuleKey`]: a display identity is never a cache key.
/// Two modules sharing a name in categories with distinct file patterns live in
/// different files and so never share a key. Categories that fall back to the same
/// pattern can collide; `PathConvention::ensure_distinct` rejects such module sets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryKey {
    file_path: String,
}

impl HistoryKey {
    #[must_use]
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}

impl fmt::Display for HistoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_path)
    }
}
