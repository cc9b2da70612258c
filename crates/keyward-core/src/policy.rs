//! Time thresholds that drive the overdue lifecycle.

use chrono::Duration;
use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 3;
pub const DEFAULT_ESCALATION_THRESHOLD_DAYS: i64 = 7;

/// Lifecycle thresholds, in whole days.
///
/// `grace_period_days` is recorded on the first overdue alert and reported to
/// the user, but escalation is decided by `escalation_threshold_days` alone,
/// counted from the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LifecyclePolicy {
  pub grace_period_days:         i64,
  pub escalation_threshold_days: i64,
}

impl Default for LifecyclePolicy {
  fn default() -> Self {
    Self {
      grace_period_days:         DEFAULT_GRACE_PERIOD_DAYS,
      escalation_threshold_days: DEFAULT_ESCALATION_THRESHOLD_DAYS,
    }
  }
}

impl LifecyclePolicy {
  pub fn validate(&self) -> Result<()> {
    if self.grace_period_days < 0 {
      return Err(Error::InvalidPolicy(format!(
        "grace_period_days must not be negative (got {})",
        self.grace_period_days
      )));
    }
    if self.escalation_threshold_days < 1 {
      return Err(Error::InvalidPolicy(format!(
        "escalation_threshold_days must be at least 1 (got {})",
        self.escalation_threshold_days
      )));
    }
    Ok(())
  }

  pub fn grace_period(&self) -> Duration { Duration::days(self.grace_period_days) }

  pub fn escalation_threshold(&self) -> Duration {
    Duration::days(self.escalation_threshold_days)
  }
}
