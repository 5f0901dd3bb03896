use crate::Result;
use crate::checkpoint::{Combinator, SaveStrategy};
use crate::compare::RenameRules;
use crate::github::{ParserKind, split_repo};
use crate::governor::PacingPolicy;
use crate::history::{PathConvention, QuotaPolicy};
use camino::Utf8Path;
use core::time::Duration;
use ohno::{IntoAppError, app_err, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Repositories by short id, e.g. `prebid-js`
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryConfig>,

    #[serde(default)]
    pub pacing: PacingPolicy,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub renames: RenameRules,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// GitHub slug, `owner/name`
    pub repo: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parser: ParserKind,

    /// Category to directory, relative to the repository root
    #[serde(default)]
    pub paths: BTreeMap<String, String>,

    /// Ref to use instead of the latest release when no version is given
    #[serde(default)]
    pub version_override: Option<String>,

    /// Skips the default branch lookup when set
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CheckpointConfig {
    /// Save at least this often, zero to disable
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Save after this many items, zero to disable
    pub every_items: u64,

    /// Save whenever the remaining quota fraction is at or below this, if set
    pub quota_fraction: Option<f64>,

    pub combinator: Combinator,

    /// Delete the checkpoint when a run completes
    pub auto_cleanup: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            every_items: 10,
            quota_fraction: Some(0.1),
            combinator: Combinator::Any,
            auto_cleanup: true,
        }
    }
}

impl CheckpointConfig {
    /// The save strategy these settings describe.
    #[must_use]
    pub fn strategy(&self) -> SaveStrategy {
        let mut strategies = Vec::new();
        if !self.interval.is_zero() {
            strategies.push(SaveStrategy::Interval(self.interval));
        }

        if self.every_items > 0 {
            strategies.push(SaveStrategy::Progress(self.every_items));
        }

        if let Some(fraction) = self.quota_fraction {
            strategies.push(SaveStrategy::Quota(fraction));
        }

        if strategies.len() == 1 {
            return strategies.remove(0);
        }

        SaveStrategy::Composite {
            combinator: self.combinator,
            strategies,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct HistoryConfig {
    /// Upper bound on modules per batch
    pub batch_size: usize,

    #[serde(with = "humantime_serde")]
    pub batch_pause: Duration,

    /// Also look up the commit that introduced each file
    pub resolve_commits: bool,

    pub on_quota_exhausted: QuotaPolicy,

    /// Ref for the existence check, defaults to the newest version searched
    pub head_ref: Option<String>,

    /// Where module files live, used to derive history keys
    pub conventions: PathConvention,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            batch_pause: Duration::ZERO,
            resolve_commits: false,
            on_quota_exhausted: QuotaPolicy::Wait,
            head_ref: None,
            conventions: PathConvention::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file, or the built-in default when no path is given
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let config: Self = match path {
            Some(path) => {
                let text = fs::read_to_string(path).into_app_err_with(|| format!("reading modtrack configuration file '{path}'"))?;
                toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{path}'"))?
            }
            None => toml::from_str(DEFAULT_CONFIG_TOML).into_app_err("parsing the built-in configuration")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Look up a repository by id, or by its `owner/name` slug
    ///
    /// # Errors
    ///
    /// Returns an error naming the known ids when nothing matches
    pub fn repository(&self, id: &str) -> Result<(&str, &RepositoryConfig)> {
        if let Some((key, repo)) = self.repositories.get_key_value(id) {
            return Ok((key, repo));
        }

        self.repositories
            .iter()
            .find(|(_, r)| r.repo.eq_ignore_ascii_case(id))
            .map(|(k, r)| (k.as_str(), r))
            .ok_or_else(|| {
                let known = self.repositories.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
                app_err!("unknown repository '{id}', configured repositories are: {known}")
            })
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        for (id, repo) in &self.repositories {
            if id.trim().is_empty() {
                bail!("repository ids must not be empty");
            }

            let _ = split_repo(&repo.repo).map_err(|e| app_err!("repository '{id}': {e}"))?;
        }

        self.pacing.validate()?;

        if let Some(fraction) = self.checkpoint.quota_fraction
            && !(0.0..=1.0).contains(&fraction)
        {
            bail!("checkpoint.quota_fraction must be between 0 and 1, got {fraction}");
        }

        if self.checkpoint.interval.is_zero() && self.checkpoint.every_items == 0 && self.checkpoint.quota_fraction.is_none() {
            bail!("checkpoint settings disable every save trigger");
        }

        if !(0.0..=1.0).contains(&self.renames.min_score) {
            bail!("renames.min_score must be between 0 and 1, got {}", self.renames.min_score);
        }

        if self.history.batch_size == 0 {
            bail!("history.batch_size must be at least 1");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.repositories.len(), 4);
        assert_eq!(config.repositories["prebid-server"].parser, ParserKind::PrebidServerGo);
        assert_eq!(config.pacing, PacingPolicy::default());
    }

    #[test]
    fn looks_up_by_id_or_slug() {
        let config = Config::default();
        assert_eq!(config.repository("prebid-js").unwrap().1.repo, "prebid/Prebid.js");
        assert_eq!(config.repository("prebid/prebid.js").unwrap().0, "prebid-js");

        let err = config.repository("nope").unwrap_err().to_string();
        assert!(err.contains("prebid-server-java"));
    }

    #[test]
    fn rejects_malformed_slugs() {
        let mut config = Config::default();
        config.repositories.get_mut("prebid-js").unwrap().repo = "Prebid.js".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut config = Config::default();
        config.history.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_pacing_thresholds() {
        let mut config = Config::default();
        config.pacing.moderate_usage = 0.9;
        config.pacing.aggressive_usage = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        let text = "[history]\nbatch_size = 5\nbatch_sise = 3\n";
        assert!(toml::from_str::<Config>(text).is_err());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: Config = toml::from_str("[history]\nbatch_size = 5\nbatch_pause = \"2s\"\n").unwrap();
        assert_eq!(config.history.batch_size, 5);
        assert_eq!(config.history.batch_pause, Duration::from_secs(2));
        assert_eq!(config.history.on_quota_exhausted, QuotaPolicy::Wait);
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn checkpoint_strategy() {
        let config = CheckpointConfig::default();
        match config.strategy() {
            SaveStrategy::Composite { combinator, strategies } => {
                assert_eq!(combinator, Combinator::Any);
                assert_eq!(strategies.len(), 3);
            }
            other => panic!("unexpected strategy {other:?}"),
        }

        let only_items = CheckpointConfig {
            interval: Duration::ZERO,
            quota_fraction: None,
            ..CheckpointConfig::default()
        };
        assert_eq!(only_items.strategy(), SaveStrategy::Progress(10));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn save_default_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let output_path = Utf8PathBuf::try_from(tmp.path().join("modtrack.toml")).unwrap();
        Config::save_default(&output_path).unwrap();
        let loaded = Config::load(Some(&output_path)).unwrap();
        assert_eq!(loaded.repositories.len(), Config::default().repositories.len());
    }

    #[test]
    fn load_without_path_uses_builtin() {
        let config = Config::load(None).unwrap();
        assert!(config.repositories.contains_key("prebid-js"));
    }
}
