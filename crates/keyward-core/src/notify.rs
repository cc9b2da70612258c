//! The `Notifier` trait and the alert payloads it delivers.
//!
//! Delivery mechanics (email, SMS, webhooks) live in implementations such as
//! `keyward-notify`. The processor treats every send as best-effort.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{record::IssueDetails, security::SecurityReport};

/// Which user-facing alert this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "alertType", rename_all = "snake_case")]
pub enum AlertKind {
  #[serde(rename_all = "camelCase")]
  FirstOverdue { grace_period_ends: DateTime<Utc> },
  #[serde(rename_all = "camelCase")]
  GracePeriodReminder { days_until_escalation: i64 },
}

impl AlertKind {
  pub fn name(&self) -> &'static str {
    match self {
      Self::FirstOverdue { .. } => "first_overdue",
      Self::GracePeriodReminder { .. } => "grace_period_reminder",
    }
  }
}

/// An overdue notice for the borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueAlert {
  pub record_id:    Uuid,
  pub user_name:    Option<String>,
  pub user_email:   Option<String>,
  pub user_phone:   Option<String>,
  pub key_label:    Option<String>,
  pub key_location: Option<String>,
  pub due_at:       DateTime<Utc>,
  pub days_overdue: i64,
  #[serde(flatten)]
  pub kind:         AlertKind,
}

impl OverdueAlert {
  pub fn new(details: &IssueDetails, days_overdue: i64, kind: AlertKind) -> Self {
    let user = details.user.as_ref();
    let key = details.key.as_ref();
    Self {
      record_id: details.record.id,
      user_name: user.map(|u| u.name.clone()),
      user_email: user.and_then(|u| u.email.clone()),
      user_phone: user.and_then(|u| u.phone.clone()),
      key_label: key.map(|k| k.label.clone()),
      key_location: key.map(|k| k.location.clone()),
      due_at: details.record.due_at,
      days_overdue,
      kind,
    }
  }
}

/// Abstraction over message delivery.
///
/// Both methods are fire-and-forget from the processor's point of view: an
/// error is logged and counted, never propagated into the record's state.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Send a first-overdue alert or a grace-period reminder to the borrower.
  fn send_overdue_alert<'a>(
    &'a self,
    alert: &'a OverdueAlert,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Alert the security division about an escalated record.
  fn send_escalation_alert<'a>(
    &'a self,
    report: &'a SecurityReport,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
