//! The module data model: modules, snapshots of them, and version ordering.

mod catalog;
mod module_info;
mod snapshot;
mod source;
mod version;

pub use catalog::{MajorLine, VersionCatalog};
pub use module_info::{HistoryKey, ModuleInfo, ModuleKey, categories};
pub use snapshot::Snapshot;
pub use source::{SnapshotSource, VersionSource};
pub use version::{VersionSequence, VersionTag};
