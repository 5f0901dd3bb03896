use chrono::{DateTime, Utc};
use core::time::Duration;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Request quota as last reported by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub limit: u64,
    pub remaining: u64,
    pub used: u64,
    pub reset_at: DateTime<Utc>,
}

impl QuotaStatus {
    #[must_use]
    pub fn new(limit: u64, remaining: u64, reset_at: DateTime<Utc>) -> Self {
        Self {
            limit,
            remaining,
            used: limit.saturating_sub(remaining),
            reset_at,
        }
    }

    /// Fraction of the quota already consumed, in `[0, 1]`.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "quota values are far below 2^52")]
    pub fn usage_fraction(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }

        (self.used as f64 / self.limit as f64).clamp(0.0, 1.0)
    }

    /// Fraction of the quota still available, in `[0, 1]`.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "quota values are far below 2^52")]
    pub fn remaining_fraction(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }

        (self.remaining as f64 / self.limit as f64).clamp(0.0, 1.0)
    }

    /// Time left until the quota window resets, zero if the reset is already past.
    #[must_use]
    pub fn until_reset(&self, now: DateTime<Utc>) -> Duration {
        (self.reset_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Extract quota information from GitHub-style `x-ratelimit-*` response headers.
    ///
    /// `limit`, `remaining` and `reset` are required; `used` is derived when absent.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let limit = header_u64(headers, "x-ratelimit-limit")?;
        let remaining = header_u64(headers, "x-ratelimit-remaining")?;
        let reset_timestamp = i64::try_from(header_u64(headers, "x-ratelimit-reset")?).ok()?;
        let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

        let mut status = Self::new(limit, remaining, reset_at);
        if let Some(used) = header_u64(headers, "x-ratelimit-used") {
            status.used = used;
        }

        Some(status)
    }
}

/// The remote API refused a request because the quota is used up.
///
/// Travels as the source of an [`ohno::AppError`] so the governor can pick the
/// reported quota back out of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaExhausted {
    pub quota: QuotaStatus,
}

impl core::fmt::Display for QuotaExhausted {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "rate limit exhausted ({} of {} remaining), quota resets at {}", self.quota.remaining, self.quota.limit, self.quota.reset_at)
    }
}

impl core::error::Error for QuotaExhausted {}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
