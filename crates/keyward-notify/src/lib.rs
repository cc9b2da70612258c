//! Notifier implementations for the Keyward overdue processor.
//!
//! [`WebhookNotifier`] POSTs alerts as JSON to configured endpoints.
//! [`LogNotifier`] only emits tracing events and is used when no endpoint is
//! configured. [`ConfiguredNotifier`] picks between them from
//! [`NotifierConfig`].

pub mod error;
mod log_only;
mod webhook;

use keyward_core::{
  notify::{Notifier, OverdueAlert},
  security::SecurityReport,
};
use serde::Deserialize;

pub use error::{Error, Result};
pub use log_only::LogNotifier;
pub use webhook::{WebhookNotifier, idempotency_key};

// ─── Config ──────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 { 10 }

/// Where alerts go. With neither URL set, alerts are only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
  /// Receives user overdue alerts.
  #[serde(default)]
  pub alert_url:    Option<String>,
  /// Receives security reports for escalated records.
  #[serde(default)]
  pub security_url: Option<String>,
  /// Sent as a bearer token on every request.
  #[serde(default)]
  pub token:        Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for NotifierConfig {
  fn default() -> Self {
    Self {
      alert_url:    None,
      security_url: None,
      token:        None,
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl NotifierConfig {
  pub fn build(&self) -> Result<ConfiguredNotifier> {
    if self.alert_url.is_none() && self.security_url.is_none() {
      return Ok(ConfiguredNotifier::Log(LogNotifier));
    }
    Ok(ConfiguredNotifier::Webhook(WebhookNotifier::new(self)?))
  }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

pub enum ConfiguredNotifier {
  Webhook(WebhookNotifier),
  Log(LogNotifier),
}

impl Notifier for ConfiguredNotifier {
  type Error = Error;

  async fn send_overdue_alert(&self, alert: &OverdueAlert) -> Result<()> {
    match self {
      Self::Webhook(n) => n.send_overdue_alert(alert).await,
      Self::Log(n) => n.send_overdue_alert(alert).await,
    }
  }

  async fn send_escalation_alert(&self, report: &SecurityReport) -> Result<()> {
    match self {
      Self::Webhook(n) => n.send_escalation_alert(report).await,
      Self::Log(n) => n.send_escalation_alert(report).await,
    }
  }
}
