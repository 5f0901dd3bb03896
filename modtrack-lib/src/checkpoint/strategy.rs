use core::time::Duration;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a save strategy gets to look at.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SaveContext {
    pub since_last_save: Duration,
    pub items_since_save: u64,

    /// Fraction of the API quota still available, when known.
    pub quota_remaining_fraction: Option<f64>,
}

/// Outcome of [`SaveStrategy::should_save`]. `reason` is empty when `save` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDecision {
    pub save: bool,
    pub reason: String,
}

impl SaveDecision {
    fn yes(reason: String) -> Self {
        Self { save: true, reason }
    }

    const fn no() -> Self {
        Self {
            save: false,
            reason: String::new(),
        }
    }
}

/// How a composite strategy combines its members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Save when any member says so.
    #[default]
    Any,

    /// Save only when every member says so.
    All,
}

/// Decides when a running operation should persist its progress.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveStrategy {
    /// At least this much time has passed since the last save.
    Interval(Duration),

    /// At least this many items were processed since the last save.
    Progress(u64),

    /// The remaining quota fraction is at or below this threshold.
    Quota(f64),

    Composite {
        combinator: Combinator,
        strategies: Vec<Self>,
    },
}

impl SaveStrategy {
    /// Pure decision function; calling it has no side effects.
    #[must_use]
    pub fn should_save(&self, ctx: &SaveContext) -> SaveDecision {
        match self {
            Self::Interval(interval) => {
                if ctx.since_last_save >= *interval {
                    SaveDecision::yes(format!(
                        "interval: {}s since last save >= {}s",
                        ctx.since_last_save.as_secs(),
                        interval.as_secs()
                    ))
                } else {
                    SaveDecision::no()
                }
            }

            Self::Progress(items) => {
                if ctx.items_since_save >= *items {
                    SaveDecision::yes(format!("progress: {} items since last save", ctx.items_since_save))
                } else {
                    SaveDecision::no()
                }
            }

            Self::Quota(threshold) => match ctx.quota_remaining_fraction {
                Some(fraction) if fraction <= *threshold => SaveDecision::yes(format!(
                    "quota: {:.1}% remaining <= {:.1}% threshold",
                    fraction * 100.0,
                    threshold * 100.0
                )),
                _ => SaveDecision::no(),
            },

            Self::Composite { combinator, strategies } => {
                if strategies.is_empty() {
                    return SaveDecision::no();
                }

                let decisions: Vec<_> = strategies.iter().map(|s| s.should_save(ctx)).collect();
                let save = match combinator {
                    Combinator::Any => decisions.iter().any(|d| d.save),
                    Combinator::All => decisions.iter().all(|d| d.save),
                };

                if !save {
                    return SaveDecision::no();
                }

                let reason = decisions
                    .into_iter()
                    .filter(|d| d.save)
                    .map(|d| d.reason)
                    .collect::<Vec<_>>()
                    .join(" | ");
                SaveDecision::yes(reason)
            }
        }
    }
}
