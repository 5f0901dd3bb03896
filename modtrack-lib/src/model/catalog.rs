use super::{VersionSequence, VersionTag};
use chrono::{DateTime, Utc};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First and last release of one major version line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MajorLine {
    pub major: u64,
    pub first: String,
    pub last: String,
}

/// Summary of a repository's releases, cheap to cache between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCatalog {
    pub repository: String,
    pub default_branch: String,
    pub majors: BTreeMap<u64, MajorLine>,

    /// Most recent versions, newest first.
    pub latest: Vec<String>,

    pub built_at: DateTime<Utc>,
}

impl VersionCatalog {
    #[must_use]
    pub fn build(
        repository: impl Into<String>,
        default_branch: impl Into<String>,
        versions: &VersionSequence,
        latest_count: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let releases = versions.releases_only();

        let mut majors: BTreeMap<u64, MajorLine> = BTreeMap::new();
        for tag in releases.iter() {
            let _ = majors
                .entry(tag.major())
                .and_modify(|line| line.last = tag.raw().to_string())
                .or_insert_with(|| MajorLine {
                    major: tag.major(),
                    first: tag.raw().to_string(),
                    last: tag.raw().to_string(),
                });
        }

        let latest = releases
            .iter()
            .rev()
            .take(latest_count)
            .map(|t| t.raw().to_string())
            .collect();

        Self {
            repository: repository.into(),
            default_branch: default_branch.into(),
            majors,
            latest,
            built_at: now,
        }
    }

    #[must_use]
    pub fn latest_major(&self) -> Option<u64> {
        self.majors.keys().next_back().copied()
    }

    #[must_use]
    pub fn major_line(&self, major: u64) -> Option<&MajorLine> {
        self.majors.get(&major)
    }

    /// Whether the catalog is older than `ttl`, or a newer major line has shipped since.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration, newest_known: Option<&VersionTag>) -> bool {
        let age = now.signed_duration_since(self.built_at).to_std().unwrap_or(Duration::ZERO);
        if age >= ttl {
            return true;
        }

        match (newest_known, self.latest_major()) {
            (Some(tag), Some(major)) => tag.major() > major,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn catalog(now: DateTime<Utc>) -> VersionCatalog {
        let versions = VersionSequence::new(["8.0.0", "8.1.0", "8.52.0", "9.0.0-rc.1", "9.0.0", "9.10.0", "10.0.0"]).unwrap();
        VersionCatalog::build("prebid/Prebid.js", "master", &versions, 3, now)
    }

    #[test]
    fn major_lines() {
        let catalog = catalog(Utc::now());

        assert_eq!(catalog.majors.len(), 3);
        let nine = catalog.major_line(9).unwrap();
        assert_eq!(nine.first, "9.0.0");
        assert_eq!(nine.last, "9.10.0");
        assert_eq!(catalog.latest_major(), Some(10));
    }

    #[test]
    fn latest_is_newest_first() {
        assert_eq!(catalog(Utc::now()).latest, vec!["10.0.0", "9.10.0", "9.0.0"]);
    }

    #[test]
    fn staleness() {
        let built = Utc::now();
        let catalog = catalog(built);
        let day = Duration::from_secs(86_400);

        assert!(!catalog.is_stale(built, day, None));
        assert!(catalog.is_stale(built + chrono::Duration::days(2), day, None));

        let newer = VersionTag::parse("11.0.0").unwrap();
        assert!(catalog.is_stale(built, day, Some(&newer)));

        let same_major = VersionTag::parse("10.3.0").unwrap();
        assert!(!catalog.is_stale(built, day, Some(&same_major)));
    }
}
