use super::QuotaStatus;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::bail;
use serde::{Deserialize, Serialize};

/// Each whole step of this size above the aggressive threshold doubles the delay.
const BACKOFF_STEP: f64 = 0.05;
const MAX_BACKOFF_DOUBLINGS: u32 = 16;

/// Tuning knobs for request pacing.
///
/// Usage below `moderate_usage` gets `minimal_delay`. Usage between the two thresholds
/// ramps linearly from `moderate_delay`. Above `aggressive_usage` the delay doubles per
/// 5% step, bounded by the per-request share of the time left until the quota resets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PacingPolicy {
    /// Requests kept in reserve; never planned against.
    pub safety_buffer: u64,

    /// Below this many remaining requests, batch sizes shrink sharply.
    pub low_quota_threshold: u64,

    pub moderate_usage: f64,
    pub aggressive_usage: f64,

    #[serde(with = "humantime_serde")]
    pub minimal_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub moderate_delay: Duration,

    /// Extra delay per unit of usage above `moderate_usage`.
    #[serde(with = "humantime_serde")]
    pub moderate_delay_slope: Duration,

    #[serde(with = "humantime_serde")]
    pub aggressive_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Upper bound on a wait-for-reset pause.
    #[serde(with = "humantime_serde")]
    pub max_pause: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            safety_buffer: 10,
            low_quota_threshold: 50,
            moderate_usage: 0.5,
            aggressive_usage: 0.8,
            minimal_delay: Duration::from_millis(500),
            moderate_delay: Duration::from_secs(1),
            moderate_delay_slope: Duration::from_secs(4),
            aggressive_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            max_pause: Duration::from_secs(3600),
        }
    }
}

impl PacingPolicy {
    /// A policy that never sleeps, keeping only the quota bookkeeping.
    #[must_use]
    pub fn unpaced() -> Self {
        Self {
            minimal_delay: Duration::ZERO,
            moderate_delay: Duration::ZERO,
            moderate_delay_slope: Duration::ZERO,
            aggressive_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_pause: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        let in_range = |v: f64| v > 0.0 && v <= 1.0;
        if !in_range(self.moderate_usage) || !in_range(self.aggressive_usage) {
            bail!("pacing thresholds must lie in (0, 1]");
        }

        if self.moderate_usage >= self.aggressive_usage {
            bail!(
                "pacing threshold 'moderate_usage' ({}) must be below 'aggressive_usage' ({})",
                self.moderate_usage,
                self.aggressive_usage
            );
        }

        Ok(())
    }

    /// Delay to apply before the next request given the last known quota.
    ///
    /// With no quota known yet the first request goes out immediately.
    #[must_use]
    pub fn delay_for(&self, quota: Option<&QuotaStatus>, now: DateTime<Utc>) -> Duration {
        let Some(quota) = quota else {
            return Duration::ZERO;
        };

        let spread = spread_until_reset(quota, now);

        if quota.remaining <= self.safety_buffer {
            if spread.is_zero() {
                return self.aggressive_delay.min(self.max_delay);
            }
            return spread.min(self.max_delay);
        }

        let usage = quota.usage_fraction();
        let delay = if usage < self.moderate_usage {
            self.minimal_delay
        } else if usage < self.aggressive_usage {
            self.moderate_delay + self.moderate_delay_slope.mul_f64(usage - self.moderate_usage)
        } else {
            let doublings = backoff_doublings(usage - self.aggressive_usage);
            let backoff = self
                .aggressive_delay
                .checked_mul(1 << doublings)
                .unwrap_or(self.max_delay);
            backoff.min(spread.max(self.aggressive_delay))
        };

        delay.min(self.max_delay)
    }
}

/// Even share of the time until reset for each remaining request.
fn spread_until_reset(quota: &QuotaStatus, now: DateTime<Utc>) -> Duration {
    let remaining = u32::try_from(quota.remaining.max(1)).unwrap_or(u32::MAX);
    quota.until_reset(now) / remaining
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "value is clamped first")]
fn backoff_doublings(excess: f64) -> u32 {
    let steps = (excess.max(0.0) / BACKOFF_STEP + 1e-9).floor();
    (steps.min(f64::from(MAX_BACKOFF_DOUBLINGS))) as u32
}
