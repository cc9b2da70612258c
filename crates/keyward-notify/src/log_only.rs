use keyward_core::{
  notify::{Notifier, OverdueAlert},
  security::SecurityReport,
};

use crate::Result;

/// Logs alerts instead of delivering them. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  type Error = crate::Error;

  async fn send_overdue_alert(&self, alert: &OverdueAlert) -> Result<()> {
    tracing::info!(
      record_id = %alert.record_id,
      kind = alert.kind.name(),
      days_overdue = alert.days_overdue,
      email = alert.user_email.as_deref().unwrap_or("-"),
      "overdue alert (log only)"
    );
    Ok(())
  }

  async fn send_escalation_alert(&self, report: &SecurityReport) -> Result<()> {
    tracing::warn!(
      record_id = %report.id,
      risk = report.risk_level.as_str(),
      days_overdue = report.days_overdue,
      key = %report.key_info.label,
      "security escalation (log only)"
    );
    Ok(())
  }
}
