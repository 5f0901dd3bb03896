//! Request pacing against an external API quota.
//!
//! [`RateGovernor`] keeps the last quota reported by the API and decides how long to
//! wait before each outbound call. Callers consult [`RateGovernor::check_safety`] and
//! [`RateGovernor::recommended_batch_size`] before planning a batch of work.

mod pacing;
mod quota;
mod rate_governor;

pub use pacing::PacingPolicy;
pub use quota::{QuotaExhausted, QuotaStatus};
pub use rate_governor::{Metered, RateGovernor, SafetyCheck};
