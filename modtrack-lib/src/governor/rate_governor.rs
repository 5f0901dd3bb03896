use super::{PacingPolicy, QuotaExhausted, QuotaStatus};
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::sync::Mutex;
use std::time::Instant;

const LOG_TARGET: &str = "  governor";

/// Resets closer than this make large requests unsafe even with quota left.
const IMMINENT_RESET: Duration = Duration::from_secs(60);

/// A value returned by an external call, along with the quota reported alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metered<T> {
    pub value: T,
    pub quota: Option<QuotaStatus>,
}

impl<T> Metered<T> {
    #[must_use]
    pub const fn new(value: T, quota: Option<QuotaStatus>) -> Self {
        Self { value, quota }
    }

    /// A value whose source reported no quota information.
    #[must_use]
    pub const fn unmetered(value: T) -> Self {
        Self { value, quota: None }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Metered<U> {
        Metered {
            value: f(self.value),
            quota: self.quota,
        }
    }
}

/// Verdict of [`RateGovernor::check_safety`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyCheck {
    pub safe: bool,
    pub reason: String,
}

impl SafetyCheck {
    fn safe(reason: impl Into<String>) -> Self {
        Self {
            safe: true,
            reason: reason.into(),
        }
    }

    fn unsafe_(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default)]
struct GovernorState {
    quota: Option<QuotaStatus>,
    last_request: Option<Instant>,
    requests: u64,
}

/// Paces outbound requests against a shared API quota.
///
/// One instance is meant to be shared (via `Arc`) by every component that talks to
/// the same API so that the aggregate request volume stays governed. All bookkeeping
/// is serialized behind a mutex; the lock is never held across an await point.
///
/// The governor never refuses a request. Callers ask [`check_safety`](Self::check_safety)
/// before a batch and decide for themselves whether to wait, stop, or go ahead.
#[derive(Debug)]
pub struct RateGovernor {
    policy: PacingPolicy,
    state: Mutex<GovernorState>,
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(PacingPolicy::default())
    }
}

impl RateGovernor {
    #[must_use]
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(GovernorState::default()),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &PacingPolicy {
        &self.policy
    }

    /// Last known quota, if any call has reported one.
    #[must_use]
    pub fn snapshot(&self) -> Option<QuotaStatus> {
        self.state.lock().expect("lock not poisoned").quota
    }

    /// Number of governed requests issued so far.
    #[must_use]
    pub fn requests_made(&self) -> u64 {
        self.state.lock().expect("lock not poisoned").requests
    }

    /// Replace the known quota with a fresher report.
    pub fn record_quota(&self, quota: QuotaStatus) {
        let mut state = self.state.lock().expect("lock not poisoned");
        log::trace!(target: LOG_TARGET, "Quota now {}/{} (resets at {})", quota.remaining, quota.limit, quota.reset_at);
        state.quota = Some(quota);
    }

    /// Drop the known quota once its window has reset. The next response reports a fresh one.
    pub fn forget_quota(&self) {
        self.state.lock().expect("lock not poisoned").quota = None;
    }

    /// Whether `request_count` more requests can be issued without exhausting the quota.
    #[must_use]
    pub fn check_safety(&self, request_count: u64) -> SafetyCheck {
        self.check_safety_at(request_count, Utc::now())
    }

    #[must_use]
    pub fn check_safety_at(&self, request_count: u64, now: DateTime<Utc>) -> SafetyCheck {
        let Some(quota) = self.snapshot() else {
            return SafetyCheck::safe("no quota information yet");
        };

        let buffer = self.policy.safety_buffer;
        let usable = quota.remaining.saturating_sub(buffer);
        let until_reset = quota.until_reset(now);

        if request_count > usable {
            return SafetyCheck::unsafe_(format!(
                "insufficient quota: {request_count} requests needed but only {} of {} remain ({buffer} held in reserve), resets in {} min",
                quota.remaining,
                quota.limit,
                until_reset.as_secs().div_ceil(60)
            ));
        }

        if until_reset < IMMINENT_RESET && request_count.saturating_mul(2) > quota.remaining {
            return SafetyCheck::unsafe_(format!(
                "quota reset imminent: {request_count} requests would take more than half of the {} remaining in the last {}s",
                quota.remaining,
                until_reset.as_secs()
            ));
        }

        SafetyCheck::safe(format!("{} of {} requests remaining", quota.remaining, quota.limit))
    }

    /// Scale a desired batch size down to what the current quota comfortably allows.
    ///
    /// The result is always in `1..=max(requested, 1)`.
    #[must_use]
    pub fn recommended_batch_size(&self, requested: usize) -> usize {
        let ceiling = requested.max(1);
        let Some(quota) = self.snapshot() else {
            return ceiling;
        };

        let remaining = usize::try_from(quota.remaining).unwrap_or(usize::MAX);
        let threshold = usize::try_from(self.policy.low_quota_threshold).unwrap_or(usize::MAX);

        let size = if remaining < threshold {
            (remaining / 4).max(1)
        } else if remaining < threshold.saturating_mul(2) {
            (remaining / 3).max(5)
        } else {
            ceiling
        };

        size.clamp(1, ceiling)
    }

    /// When the quota is down to the safety buffer, how long to wait for it to reset.
    #[must_use]
    pub fn pause_needed(&self, now: DateTime<Utc>) -> Option<Duration> {
        let quota = self.snapshot()?;
        if quota.remaining > self.policy.safety_buffer {
            return None;
        }

        let wait = quota.until_reset(now).min(self.policy.max_pause);
        (!wait.is_zero()).then_some(wait)
    }

    /// Run one external call, sleeping first as the pacing policy requires.
    ///
    /// Errors from `op` are returned untouched. The quota reported on success, or
    /// carried by a [`QuotaExhausted`] error, becomes the governor's new view of the world.
    pub async fn execute_governed<T, F, Fut>(&self, op: F) -> crate::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::Result<Metered<T>>>,
    {
        let wait = self.claim_slot(Utc::now());
        if !wait.is_zero() {
            log::debug!(target: LOG_TARGET, "Pacing: waiting {wait:?} before next request");
            tokio::time::sleep(wait).await;
        }

        let metered = match op().await {
            Ok(metered) => metered,
            Err(e) => {
                if let Some(exhausted) = e.find_source::<QuotaExhausted>() {
                    log::warn!(target: LOG_TARGET, "Quota exhausted, resets at {}", exhausted.quota.reset_at);
                    self.record_quota(exhausted.quota);
                }

                return Err(e);
            }
        };

        if let Some(quota) = metered.quota {
            self.record_quota(quota);
        }

        Ok(metered.value)
    }

    /// Reserve the next request slot and return how long to wait before using it.
    ///
    /// The request is charged against the known quota immediately so that concurrent
    /// callers plan against an up-to-date count until the real report arrives.
    fn claim_slot(&self, now: DateTime<Utc>) -> Duration {
        let mut state = self.state.lock().expect("lock not poisoned");

        let delay = self.policy.delay_for(state.quota.as_ref(), now);
        let issued = Instant::now();
        let wait = state
            .last_request
            .map_or(Duration::ZERO, |last| (last + delay).saturating_duration_since(issued));

        state.last_request = Some(issued + wait);
        state.requests += 1;
        if let Some(quota) = state.quota.as_mut() {
            quota.remaining = quota.remaining.saturating_sub(1);
            quota.used = quota.used.saturating_add(1).min(quota.limit);
        }

        wait
    }
}
