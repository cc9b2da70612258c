//! Classification of issue records against the lifecycle policy.
//!
//! Everything here is a pure function of `(status, due_at, now, policy)`.
//! The processor decides what to write and whom to notify from the returned
//! [`Decision`]; nothing in this module touches a store.

use chrono::{DateTime, Utc};

use crate::{
  audit::{AuditAction, AuditEntry, EscalationReason},
  policy::LifecyclePolicy,
  record::{IssueStatus, RecordUpdate},
};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Whole days elapsed since `due_at`, rounded toward negative infinity.
///
/// A record due in the future yields a negative count.
pub fn days_overdue(due_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
  (now - due_at).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

/// Days left until `due_at + escalation threshold`, rounded up.
pub fn days_until_escalation(
  due_at: DateTime<Utc>,
  now: DateTime<Utc>,
  policy: &LifecyclePolicy,
) -> i64 {
  let remaining = (due_at + policy.escalation_threshold() - now).num_milliseconds();
  -(-remaining).div_euclid(MILLIS_PER_DAY)
}

/// What the processor should do with one record in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  /// `active → overdue` and send the first alert.
  FirstAlert {
    days_overdue:      i64,
    grace_period_ends: DateTime<Utc>,
  },
  /// `overdue → escalated`, lock, and alert security.
  Escalate { days_overdue: i64 },
  /// Still within the threshold: remind the user, no write.
  Reminder {
    days_overdue:          i64,
    days_until_escalation: i64,
  },
  NoAction,
}

impl Decision {
  /// The status the record must still have for the decision's write to
  /// apply, if the decision writes at all.
  pub fn expected_status(&self) -> Option<IssueStatus> {
    match self {
      Self::FirstAlert { .. } => Some(IssueStatus::Active),
      Self::Escalate { .. } => Some(IssueStatus::Overdue),
      Self::Reminder { .. } | Self::NoAction => None,
    }
  }
}

/// Classify one record. Each record gets at most one decision per run.
pub fn classify(
  status: IssueStatus,
  due_at: DateTime<Utc>,
  now: DateTime<Utc>,
  policy: &LifecyclePolicy,
) -> Decision {
  let days = days_overdue(due_at, now);
  match status {
    IssueStatus::Active if days >= 1 => Decision::FirstAlert {
      days_overdue:      days,
      grace_period_ends: now + policy.grace_period(),
    },
    IssueStatus::Overdue if days >= policy.escalation_threshold_days => {
      Decision::Escalate { days_overdue: days }
    }
    IssueStatus::Overdue => Decision::Reminder {
      days_overdue:          days,
      days_until_escalation: days_until_escalation(due_at, now, policy),
    },
    _ => Decision::NoAction,
  }
}

// ─── Processor writes ────────────────────────────────────────────────────────

/// The write for [`Decision::FirstAlert`].
pub fn first_alert_update(
  now: DateTime<Utc>,
  days_overdue: i64,
  grace_period_ends: DateTime<Utc>,
) -> RecordUpdate {
  let notes = format!(
    "First overdue alert sent - {days_overdue} days overdue; grace period ends {}",
    grace_period_ends.to_rfc3339()
  );
  RecordUpdate::append(AuditEntry::system(
    AuditAction::OverdueAlertSent { days_overdue, grace_period_ends },
    now,
    notes,
  ))
  .with_status(IssueStatus::Overdue)
  .with_security_notes(format!("Overdue alert sent on {}", now.to_rfc3339()))
}

/// The write for [`Decision::Escalate`].
pub fn escalation_update(now: DateTime<Utc>, days_overdue: i64) -> RecordUpdate {
  let notes =
    format!("Auto-escalated: Grace period expired after {days_overdue} days overdue");
  RecordUpdate::append(AuditEntry::system(
    AuditAction::Escalated {
      reason: EscalationReason::GracePeriodExpired,
      days_overdue,
    },
    now,
    notes.clone(),
  ))
  .with_status(IssueStatus::Escalated)
  .with_security_notes(notes)
  .locked()
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 20, 9, 30, 0).unwrap() }

  fn policy() -> LifecyclePolicy { LifecyclePolicy::default() }

  #[test]
  fn days_overdue_floors() {
    let now = now();
    assert_eq!(days_overdue(now, now), 0);
    assert_eq!(days_overdue(now - Duration::hours(23), now), 0);
    assert_eq!(days_overdue(now - Duration::hours(24), now), 1);
    assert_eq!(days_overdue(now - Duration::hours(47), now), 1);
    assert_eq!(days_overdue(now + Duration::hours(1), now), -1);
    assert_eq!(days_overdue(now + Duration::days(3), now), -3);
  }

  #[test]
  fn active_becomes_overdue_from_one_full_day() {
    let now = now();
    for k in 0..10 {
      let decision = classify(IssueStatus::Active, now - Duration::days(k), now, &policy());
      if k >= 1 {
        assert_eq!(
          decision,
          Decision::FirstAlert {
            days_overdue:      k,
            grace_period_ends: now + Duration::days(3),
          }
        );
      } else {
        assert_eq!(decision, Decision::NoAction);
      }
    }
  }

  #[test]
  fn future_due_active_is_noop() {
    let now = now();
    assert_eq!(
      classify(IssueStatus::Active, now + Duration::days(2), now, &policy()),
      Decision::NoAction
    );
  }

  #[test]
  fn overdue_escalates_at_threshold() {
    let now = now();
    assert_eq!(
      classify(IssueStatus::Overdue, now - Duration::days(7), now, &policy()),
      Decision::Escalate { days_overdue: 7 }
    );
    assert_eq!(
      classify(IssueStatus::Overdue, now - Duration::days(8), now, &policy()),
      Decision::Escalate { days_overdue: 8 }
    );
  }

  #[test]
  fn overdue_below_threshold_gets_reminder() {
    let now = now();
    for k in 0..7 {
      let decision = classify(IssueStatus::Overdue, now - Duration::days(k), now, &policy());
      assert_eq!(
        decision,
        Decision::Reminder { days_overdue: k, days_until_escalation: 7 - k }
      );
    }
  }

  #[test]
  fn days_until_escalation_rounds_up() {
    let now = now();
    // 5 days and 6 hours overdue: 1 day 18 hours remain, which rounds to 2.
    let due_at = now - Duration::days(5) - Duration::hours(6);
    assert_eq!(days_until_escalation(due_at, now, &policy()), 2);
    assert_eq!(
      classify(IssueStatus::Overdue, due_at, now, &policy()),
      Decision::Reminder { days_overdue: 5, days_until_escalation: 2 }
    );
  }

  #[test]
  fn terminal_and_escalated_records_are_left_alone() {
    let now = now();
    let due_at = now - Duration::days(30);
    assert_eq!(classify(IssueStatus::Escalated, due_at, now, &policy()), Decision::NoAction);
    assert_eq!(classify(IssueStatus::Closed, due_at, now, &policy()), Decision::NoAction);
  }

  #[test]
  fn custom_threshold_is_honoured() {
    let now = now();
    let strict = LifecyclePolicy { grace_period_days: 1, escalation_threshold_days: 2 };
    assert_eq!(
      classify(IssueStatus::Overdue, now - Duration::days(2), now, &strict),
      Decision::Escalate { days_overdue: 2 }
    );
    assert_eq!(
      classify(IssueStatus::Active, now - Duration::days(1), now, &strict),
      Decision::FirstAlert {
        days_overdue:      1,
        grace_period_ends: now + Duration::days(1),
      }
    );
  }

  #[test]
  fn escalation_update_locks() {
    let update = escalation_update(now(), 8);
    assert_eq!(update.status, Some(IssueStatus::Escalated));
    assert!(update.lock);
    assert!(update.entry.system_action());
    assert!(update.entry.notes.contains("8 days"));
  }

  #[test]
  fn first_alert_notes_mention_days_and_grace_end() {
    let now = now();
    let ends = now + Duration::days(3);
    let update = first_alert_update(now, 2, ends);
    assert_eq!(update.status, Some(IssueStatus::Overdue));
    assert!(!update.lock);
    assert!(update.entry.notes.contains("2 days overdue"));
    assert!(update.entry.notes.contains(&ends.to_rfc3339()));
  }
}
