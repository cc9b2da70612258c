//! Audit-trail entries.
//!
//! Every state change on an issue record appends exactly one [`AuditEntry`].
//! Entries are never edited, reordered or removed. The action-specific data is
//! a closed set of variants so that each action carries exactly the fields it
//! needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::IssueStatus;

// ─── Actor ───────────────────────────────────────────────────────────────────

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
  /// The overdue lifecycle processor.
  System,
  /// A human administrator, by admin id.
  Admin(Uuid),
}

impl Actor {
  pub fn is_system(&self) -> bool { matches!(self, Self::System) }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// Why a record was escalated to security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
  GracePeriodExpired,
  ManualEscalation,
}

/// The action-specific payload of an audit entry. The variant name is the
/// `action` tag in the serialised form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
  Issued,
  OverdueAlertSent {
    days_overdue:      i64,
    /// Informational only; escalation is gated on the escalation threshold.
    grace_period_ends: DateTime<Utc>,
  },
  Escalated {
    reason:       EscalationReason,
    days_overdue: i64,
  },
  Returned {
    previous_status: IssueStatus,
  },
  SecurityNotesUpdated,
}

impl AuditAction {
  /// The `action` tag, matching the serde `rename_all` above.
  pub fn name(&self) -> &'static str {
    match self {
      Self::Issued => "issued",
      Self::OverdueAlertSent { .. } => "overdue_alert_sent",
      Self::Escalated { .. } => "escalated",
      Self::Returned { .. } => "returned",
      Self::SecurityNotesUpdated => "security_notes_updated",
    }
  }
}

// ─── Entry ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
  #[serde(flatten)]
  pub action:    AuditAction,
  pub timestamp: DateTime<Utc>,
  pub actor:     Actor,
  pub notes:     String,
}

impl AuditEntry {
  pub fn new(
    action: AuditAction,
    actor: Actor,
    timestamp: DateTime<Utc>,
    notes: impl Into<String>,
  ) -> Self {
    Self { action, timestamp, actor, notes: notes.into() }
  }

  pub fn system(
    action: AuditAction,
    timestamp: DateTime<Utc>,
    notes: impl Into<String>,
  ) -> Self {
    Self::new(action, Actor::System, timestamp, notes)
  }

  /// `true` when the entry was written by the processor rather than a human.
  pub fn system_action(&self) -> bool { self.actor.is_system() }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn serialises_with_action_tag() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let entry = AuditEntry::system(
      AuditAction::Escalated {
        reason:       EscalationReason::GracePeriodExpired,
        days_overdue: 8,
      },
      at,
      "Auto-escalated",
    );

    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["action"], "escalated");
    assert_eq!(json["reason"], "grace_period_expired");
    assert_eq!(json["days_overdue"], 8);
    assert_eq!(json["actor"]["kind"], "system");

    let back: AuditEntry = serde_json::from_value(json).unwrap();
    assert_eq!(back, entry);
  }

  #[test]
  fn admin_actor_is_not_system_action() {
    let admin = Uuid::new_v4();
    let entry =
      AuditEntry::new(AuditAction::Issued, Actor::Admin(admin), Utc::now(), "");
    assert!(!entry.system_action());
    assert_eq!(entry.action.name(), "issued");
  }
}
