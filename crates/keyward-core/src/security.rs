//! The report handed to the security division when a record escalates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::IssueDetails;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
  Medium,
  High,
  Critical,
}

impl RiskLevel {
  pub fn for_days_overdue(days: i64) -> Self {
    if days > 14 {
      Self::Critical
    } else if days > 7 {
      Self::High
    } else {
      Self::Medium
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Medium => "medium",
      Self::High => "high",
      Self::Critical => "critical",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
  pub name:    String,
  pub user_id: String,
  pub role:    String,
  pub email:   String,
  pub phone:   String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
  pub label:    String,
  pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
  pub issued_at:    DateTime<Utc>,
  pub due_at:       DateTime<Utc>,
  pub first_alert:  Option<DateTime<Utc>>,
  pub escalated_at: DateTime<Utc>,
}

/// Everything security needs to chase an escalated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityReport {
  pub id:             Uuid,
  pub user_info:      UserInfo,
  pub key_info:       KeyInfo,
  pub timeline:       Timeline,
  pub security_notes: String,
  pub days_overdue:   i64,
  pub risk_level:     RiskLevel,
}

impl SecurityReport {
  /// Build a report from the record as it is after escalation.
  pub fn new(details: &IssueDetails, days_overdue: i64, escalated_at: DateTime<Utc>) -> Self {
    let record = &details.record;
    let or_unknown = |value: Option<&str>| value.unwrap_or(UNKNOWN).to_owned();

    let user_info = match &details.user {
      Some(user) => UserInfo {
        name:    user.name.clone(),
        user_id: user.user_id.clone(),
        role:    user.role.as_str().to_owned(),
        email:   or_unknown(user.email.as_deref()),
        phone:   or_unknown(user.phone.as_deref()),
      },
      None => UserInfo {
        name:    UNKNOWN.to_owned(),
        user_id: UNKNOWN.to_owned(),
        role:    UNKNOWN.to_owned(),
        email:   UNKNOWN.to_owned(),
        phone:   UNKNOWN.to_owned(),
      },
    };

    let key_info = KeyInfo {
      label:    or_unknown(details.key.as_ref().map(|k| k.label.as_str())),
      location: or_unknown(details.key.as_ref().map(|k| k.location.as_str())),
    };

    Self {
      id: record.id,
      user_info,
      key_info,
      timeline: Timeline {
        issued_at: record.issued_at,
        due_at: record.due_at,
        first_alert: record.first_alert_at(),
        escalated_at,
      },
      security_notes: record.security_notes.clone().unwrap_or_default(),
      days_overdue,
      risk_level: RiskLevel::for_days_overdue(days_overdue),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::{
    audit::{AuditAction, AuditEntry},
    record::{IssueRecord, IssueStatus},
  };

  #[test]
  fn risk_level_bands() {
    assert_eq!(RiskLevel::for_days_overdue(7), RiskLevel::Medium);
    assert_eq!(RiskLevel::for_days_overdue(8), RiskLevel::High);
    assert_eq!(RiskLevel::for_days_overdue(14), RiskLevel::High);
    assert_eq!(RiskLevel::for_days_overdue(15), RiskLevel::Critical);
  }

  #[test]
  fn missing_user_and_key_render_unknown() {
    let now = Utc::now();
    let alert_at = now - Duration::days(6);
    let record = IssueRecord {
      id:             Uuid::new_v4(),
      user_id:        Uuid::new_v4(),
      key_id:         Uuid::new_v4(),
      admin_id:       None,
      issued_at:      now - Duration::days(10),
      due_at:         now - Duration::days(8),
      returned_at:    None,
      status:         IssueStatus::Overdue,
      audit_trail:    vec![AuditEntry::system(
        AuditAction::OverdueAlertSent { days_overdue: 2, grace_period_ends: alert_at },
        alert_at,
        "",
      )],
      security_notes: None,
      is_locked:      false,
      created_at:     now - Duration::days(10),
    };
    let details = IssueDetails { record, user: None, key: None };

    let report = SecurityReport::new(&details, 8, now);
    assert_eq!(report.user_info.name, "Unknown");
    assert_eq!(report.key_info.location, "Unknown");
    assert_eq!(report.timeline.first_alert, Some(alert_at));
    assert_eq!(report.risk_level, RiskLevel::High);
    assert_eq!(report.security_notes, "");
  }
}
