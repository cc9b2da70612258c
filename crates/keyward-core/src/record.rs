//! Issue records: the loan of one key to one user for a bounded window.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  audit::{AuditAction, AuditEntry},
  party::{Key, User},
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of an issue record.
///
/// Progression is forward-only: `active → overdue → escalated`, with
/// `closed` reachable from any other state by a manual return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
  Active,
  Overdue,
  Escalated,
  Closed,
}

impl IssueStatus {
  pub const ALL: [IssueStatus; 4] =
    [Self::Active, Self::Overdue, Self::Escalated, Self::Closed];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Overdue => "overdue",
      Self::Escalated => "escalated",
      Self::Closed => "closed",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|status| status.as_str() == s)
  }

  fn rank(self) -> u8 {
    match self {
      Self::Active => 0,
      Self::Overdue => 1,
      Self::Escalated => 2,
      Self::Closed => 3,
    }
  }

  pub fn is_terminal(self) -> bool { matches!(self, Self::Closed) }

  /// Whether a record may move from `self` to `next`. Only strictly forward
  /// moves are allowed, and nothing leaves `closed`.
  pub fn can_transition_to(self, next: IssueStatus) -> bool {
    !self.is_terminal() && next.rank() > self.rank()
  }
}

impl fmt::Display for IssueStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
  pub id:             Uuid,
  pub user_id:        Uuid,
  pub key_id:         Uuid,
  /// The admin who issued the key.
  pub admin_id:       Option<Uuid>,
  pub issued_at:      DateTime<Utc>,
  /// Fixed at issuance; never changes afterwards.
  pub due_at:         DateTime<Utc>,
  pub returned_at:    Option<DateTime<Utc>>,
  pub status:         IssueStatus,
  /// Append-only, oldest first.
  pub audit_trail:    Vec<AuditEntry>,
  pub security_notes: Option<String>,
  /// Set when the record is escalated and never cleared.
  pub is_locked:      bool,
  pub created_at:     DateTime<Utc>,
}

impl IssueRecord {
  /// When the processor first alerted on this record, if it has.
  pub fn first_alert_at(&self) -> Option<DateTime<Utc>> {
    self
      .audit_trail
      .iter()
      .find(|entry| matches!(entry.action, AuditAction::OverdueAlertSent { .. }))
      .map(|entry| entry.timestamp)
  }

  /// When the record was escalated, manually or automatically.
  pub fn escalated_at(&self) -> Option<DateTime<Utc>> {
    self
      .audit_trail
      .iter()
      .rev()
      .find(|entry| matches!(entry.action, AuditAction::Escalated { .. }))
      .map(|entry| entry.timestamp)
  }
}

/// Input for issuing a key. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewIssue {
  pub user_id:   Uuid,
  pub key_id:    Uuid,
  pub admin_id:  Uuid,
  pub issued_at: DateTime<Utc>,
  pub due_at:    DateTime<Utc>,
  /// The initial `issued` audit entry.
  pub entry:     AuditEntry,
}

/// An issue record joined with the display fields of its user and key.
///
/// Either side is `None` when the reference dangles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
  pub record: IssueRecord,
  pub user:   Option<User>,
  pub key:    Option<Key>,
}

// ─── Updates ─────────────────────────────────────────────────────────────────

/// A single write against an issue record.
///
/// Applied atomically by [`crate::store::IssueStore::update_record`]: the
/// status change (if any), lock, notes and return time are written together
/// with exactly one appended audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
  pub status:         Option<IssueStatus>,
  pub entry:          AuditEntry,
  /// `Some` replaces the current notes.
  pub security_notes: Option<String>,
  /// Set `is_locked`. There is no way to clear the lock.
  pub lock:           bool,
  pub returned_at:    Option<DateTime<Utc>>,
}

impl RecordUpdate {
  /// An update that only appends `entry`.
  pub fn append(entry: AuditEntry) -> Self {
    Self {
      status: None,
      entry,
      security_notes: None,
      lock: false,
      returned_at: None,
    }
  }

  pub fn with_status(mut self, status: IssueStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn with_security_notes(mut self, notes: impl Into<String>) -> Self {
    self.security_notes = Some(notes.into());
    self
  }

  pub fn locked(mut self) -> Self {
    self.lock = true;
    self
  }

  pub fn returned(mut self, at: DateTime<Utc>) -> Self {
    self.returned_at = Some(at);
    self
  }

  /// Check the update against the status it will be applied to.
  pub fn validate(&self, current: IssueStatus) -> crate::Result<()> {
    if let Some(next) = self.status
      && !current.can_transition_to(next)
    {
      return Err(crate::Error::InvalidTransition { from: current, to: next });
    }
    Ok(())
  }

  /// Apply to an in-memory copy of the record. Stores that persist the
  /// fields individually mirror this.
  pub fn apply_to(&self, record: &mut IssueRecord) {
    if let Some(status) = self.status {
      record.status = status;
    }
    if let Some(notes) = &self.security_notes {
      record.security_notes = Some(notes.clone());
    }
    if self.lock {
      record.is_locked = true;
    }
    if let Some(at) = self.returned_at {
      record.returned_at = Some(at);
    }
    record.audit_trail.push(self.entry.clone());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn forward_transitions_only() {
    use IssueStatus::*;
    assert!(Active.can_transition_to(Overdue));
    assert!(Active.can_transition_to(Escalated));
    assert!(Active.can_transition_to(Closed));
    assert!(Overdue.can_transition_to(Escalated));
    assert!(Escalated.can_transition_to(Closed));

    assert!(!Overdue.can_transition_to(Active));
    assert!(!Escalated.can_transition_to(Overdue));
    assert!(!Closed.can_transition_to(Active));
    assert!(!Closed.can_transition_to(Closed));
    assert!(!Overdue.can_transition_to(Overdue));
  }

  #[test]
  fn status_round_trips_through_str() {
    for status in IssueStatus::ALL {
      assert_eq!(IssueStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(IssueStatus::parse("lost"), None);
  }
}
