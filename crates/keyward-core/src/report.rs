//! The summary produced by one processor run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{audit::EscalationReason, notify::OverdueAlert, record::IssueStatus};

/// Counts for one run, suitable for logging and monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
  /// Records fetched and examined, whether or not they changed.
  pub processed:              usize,
  pub first_alerts:           usize,
  pub reminders:              usize,
  pub escalations:            usize,
  /// Records whose write failed or timed out.
  pub failed:                 usize,
  /// Records skipped because their status changed under us.
  pub skipped:                usize,
  /// User alerts that could not be delivered.
  pub notification_failures:  usize,
  /// Escalations whose security alert could not be delivered.
  pub missed_security_alerts: usize,
  pub timestamp:              Option<DateTime<Utc>>,
}

/// A user alert the run emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
  #[serde(flatten)]
  pub alert:     OverdueAlert,
  pub delivered: bool,
}

/// An escalation the run committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRecord {
  pub record_id:                Uuid,
  pub user_name:                Option<String>,
  pub user_email:               Option<String>,
  pub key_label:                Option<String>,
  pub days_overdue:             i64,
  pub escalation_reason:        EscalationReason,
  pub security_alert_delivered: bool,
}

/// A record whose write failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
  pub record_id: Uuid,
  pub error:     String,
}

/// A record whose transition was abandoned because its status moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
  pub record_id: Uuid,
  pub expected:  IssueStatus,
  pub found:     IssueStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
  pub summary:       RunSummary,
  pub notifications: Vec<NotificationRecord>,
  pub escalations:   Vec<EscalationRecord>,
  pub failures:      Vec<RecordFailure>,
  pub skipped:       Vec<SkippedRecord>,
  /// The run stopped early because shutdown was requested.
  pub interrupted:   bool,
}
