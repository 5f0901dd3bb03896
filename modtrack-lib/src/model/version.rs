use crate::Result;
use core::cmp::Ordering;
use core::fmt;
use ohno::{app_err, bail};
use regex::Regex;
use semver::{Prerelease, Version};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const LOG_TARGET: &str = "  versions";

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?(\d+)\.(\d+)(?:\.(\d+))?(?:-([0-9A-Za-z.-]+))?$").expect("invalid regex"));

/// A release tag together with its semantic version.
///
/// Accepts `1.2.3`, `v1.2.3`, `v1.2.3-rc.1` and two-part `1.2`. The raw tag is kept
/// because that is what the repository knows it by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag {
    raw: String,
    version: Version,
}

impl VersionTag {
    pub fn parse(raw: &str) -> Result<Self> {
        let caps = TAG_REGEX
            .captures(raw.trim())
            .ok_or_else(|| app_err!("'{raw}' is not a semantic version tag"))?;

        let number = |i: usize| -> Result<u64> {
            caps.get(i)
                .map_or(Ok(0), |m| m.as_str().parse())
                .map_err(|e| app_err!("version component in '{raw}' is out of range: {e}"))
        };

        let mut version = Version::new(number(1)?, number(2)?, number(3)?);
        if let Some(pre) = caps.get(4) {
            version.pre = Prerelease::new(pre.as_str()).map_err(|e| app_err!("invalid pre-release in '{raw}': {e}"))?;
        }

        Ok(Self {
            raw: raw.trim().to_string(),
            version,
        })
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub const fn major(&self) -> u64 {
        self.version.major
    }

    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }

    /// Semantic-version precedence, ignoring how the tag is spelled.
    #[must_use]
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.version.cmp_precedence(&other.version)
    }
}

impl PartialOrd for VersionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version).then_with(|| self.raw.cmp(&other.raw))
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for VersionTag {
    type Error = ohno::AppError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.raw
    }
}

/// Versions of one repository in strictly ascending semantic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionSequence {
    tags: Vec<VersionTag>,
}

impl VersionSequence {
    /// Accept versions that are already in order, failing on anything unparseable or out of order.
    pub fn new<S: AsRef<str>>(tags: impl IntoIterator<Item = S>) -> Result<Self> {
        let tags = tags
            .into_iter()
            .map(|t| VersionTag::parse(t.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Self::from_tags(tags)
    }

    pub fn from_tags(tags: Vec<VersionTag>) -> Result<Self> {
        for pair in tags.windows(2) {
            if let [earlier, later] = pair
                && earlier.precedence(later) != Ordering::Less
            {
                bail!("versions are not in ascending order: '{earlier}' does not precede '{later}'");
            }
        }

        Ok(Self { tags })
    }

    /// Sort arbitrary tags into a sequence, dropping non-version tags and repeats.
    #[must_use]
    pub fn from_unordered<S: AsRef<str>>(tags: impl IntoIterator<Item = S>) -> Self {
        let mut parsed: Vec<VersionTag> = tags
            .into_iter()
            .filter_map(|t| match VersionTag::parse(t.as_ref()) {
                Ok(tag) => Some(tag),
                Err(_) => {
                    log::trace!(target: LOG_TARGET, "Ignoring non-version tag '{}'", t.as_ref());
                    None
                }
            })
            .collect();

        parsed.sort();
        parsed.dedup_by(|later, earlier| later.precedence(earlier) == Ordering::Equal);

        Self { tags: parsed }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[VersionTag] {
        &self.tags
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &VersionTag> {
        self.tags.iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&VersionTag> {
        self.tags.get(index)
    }

    #[must_use]
    pub fn first(&self) -> Option<&VersionTag> {
        self.tags.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&VersionTag> {
        self.tags.last()
    }

    /// Index of a version, matched by raw tag or by semantic equality.
    #[must_use]
    pub fn position(&self, version: &str) -> Option<usize> {
        if let Some(i) = self.tags.iter().position(|t| t.raw == version) {
            return Some(i);
        }

        let wanted = VersionTag::parse(version).ok()?;
        self.tags.iter().position(|t| t.precedence(&wanted) == Ordering::Equal)
    }

    /// The inclusive run of versions from `from` to `to`.
    pub fn between(&self, from: &str, to: &str) -> Result<Self> {
        let start = self.position(from).ok_or_else(|| app_err!("unknown version '{from}'"))?;
        let end = self.position(to).ok_or_else(|| app_err!("unknown version '{to}'"))?;

        if start > end {
            bail!("version '{from}' comes after '{to}'");
        }

        Ok(Self {
            tags: self.tags[start..=end].to_vec(),
        })
    }

    /// Only the versions of one major release line.
    #[must_use]
    pub fn for_major(&self, major: u64) -> Self {
        Self {
            tags: self.tags.iter().filter(|t| t.major() == major).cloned().collect(),
        }
    }

    /// Drop pre-release versions.
    #[must_use]
    pub fn releases_only(&self) -> Self {
        Self {
            tags: self.tags.iter().filter(|t| !t.is_prerelease()).cloned().collect(),
        }
    }
}
