use crate::model::{HistoryKey, ModuleKey, VersionTag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a history lookup concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HistoryOutcome {
    /// The module's file first exists at `first_version`.
    Found {
        first_version: String,

        /// Position of `first_version` in the sequence that was searched.
        version_index: usize,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_commit_id: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_commit_date: Option<DateTime<Utc>>,
    },

    /// The file exists at HEAD but in none of the known versions.
    NotFound,

    /// The file could not be located at HEAD, so no search was attempted.
    Unresolved { reason: String },
}

/// The earliest known appearance of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub module: ModuleKey,
    pub file_path: HistoryKey,
    pub outcome: HistoryOutcome,

    /// External calls spent producing this record. Zero for cache hits.
    pub probes: u32,

    pub resolved_at: DateTime<Utc>,
}

impl HistoryRecord {
    #[must_use]
    pub fn first_version(&self) -> Option<&str> {
        match &self.outcome {
            HistoryOutcome::Found { first_version, .. } => Some(first_version),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self.outcome, HistoryOutcome::Found { .. })
    }

    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self.outcome, HistoryOutcome::Unresolved { .. })
    }

    /// Major version the module was introduced in, when known and parseable.
    #[must_use]
    pub fn major(&self) -> Option<u64> {
        VersionTag::parse(self.first_version()?).ok().map(|tag| tag.major())
    }
}

/// Group found records by the major version that introduced them.
#[must_use]
pub fn timeline(records: &[HistoryRecord]) -> BTreeMap<u64, Vec<HistoryRecord>> {
    let mut by_major: BTreeMap<u64, Vec<HistoryRecord>> = BTreeMap::new();
    for record in records {
        if let Some(major) = record.major() {
            by_major.entry(major).or_default().push(record.clone());
        }
    }

    for records in by_major.values_mut() {
        records.sort_by(|a, b| a.module.cmp(&b.module));
    }

    by_major
}

/// Records of modules introduced during one major version line.
pub fn introduced_in_major(records: &[HistoryRecord], major: u64) -> impl Iterator<Item = &HistoryRecord> {
    records.iter().filter(move |r| r.major() == Some(major))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn record(name: &str, outcome: HistoryOutcome) -> HistoryRecord {
        HistoryRecord {
            module: ModuleKey::new(name, "Bid Adapters"),
            file_path: HistoryKey::new(format!("modules/{name}BidAdapter.js")),
            outcome,
            probes: 0,
            resolved_at: Utc::now(),
        }
    }

    fn found(name: &str, version: &str) -> HistoryRecord {
        record(
            name,
            HistoryOutcome::Found {
                first_version: version.to_string(),
                version_index: 0,
                first_commit_id: None,
                first_commit_date: None,
            },
        )
    }

    #[test]
    fn timeline_groups_by_major() {
        let records = [
            found("b", "v2.3.0"),
            found("a", "2.0.0"),
            found("c", "3.1.0"),
            record("d", HistoryOutcome::NotFound),
            record("e", HistoryOutcome::Unresolved { reason: "missing".into() }),
        ];

        let lines = timeline(&records);
        assert_eq!(lines.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(lines[&2].iter().map(|r| r.module.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

        assert_eq!(introduced_in_major(&records, 3).count(), 1);
        assert_eq!(introduced_in_major(&records, 9).count(), 0);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(found("foo", "v5.0.0")).unwrap();
        assert_eq!(json["outcome"]["status"], "found");
        assert_eq!(json["outcome"]["first_version"], "v5.0.0");
        assert_eq!(json["file_path"], "modules/fooBidAdapter.js");

        let back: HistoryRecord = serde_json::from_value(json).unwrap();
        assert!(back.is_found());
    }
}
