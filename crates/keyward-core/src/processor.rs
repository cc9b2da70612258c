//! The overdue lifecycle processor.
//!
//! One [`OverdueProcessor::run`] loads every `active` and `overdue` record,
//! classifies each against the [`LifecyclePolicy`] at a single injected
//! `now`, writes at most one transition per record, and hands alerts to the
//! [`Notifier`].
//!
//! Guarantees:
//!
//! - Transitions are written with the status read at fetch time as the
//!   expected status. If a record moved on in between (a manual return, a
//!   concurrent escalation), the write is dropped and the record is reported
//!   as skipped. This also makes a re-run after a partial failure safe.
//! - A failed or timed-out write affects only that record.
//! - A failed notification never undoes the transition it belongs to.
//! - Only the candidate fetch can fail a run.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::{sync::watch, time::timeout};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
  audit::EscalationReason,
  lifecycle::{self, Decision},
  metrics::ProcessorMetrics,
  notify::{AlertKind, Notifier, OverdueAlert},
  policy::LifecyclePolicy,
  record::{IssueDetails, IssueStatus, RecordUpdate},
  report::{EscalationRecord, NotificationRecord, RecordFailure, RunReport, SkippedRecord},
  security::SecurityReport,
  store::{IssueStore, UpdateOutcome},
  Error, Result,
};

/// Statuses the processor acts on.
pub const CANDIDATE_STATUSES: [IssueStatus; 2] = [IssueStatus::Active, IssueStatus::Overdue];

/// Collaborator timeouts and notification retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProcessorOptions {
  /// Upper bound on any single store or notifier call.
  pub timeout_secs:      u64,
  /// Delivery attempts per notification, including the first.
  pub notify_attempts:   u32,
  pub notify_backoff_ms: u64,
}

impl Default for ProcessorOptions {
  fn default() -> Self {
    Self { timeout_secs: 10, notify_attempts: 3, notify_backoff_ms: 500 }
  }
}

impl ProcessorOptions {
  fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

  fn backoff(&self) -> Duration { Duration::from_millis(self.notify_backoff_ms) }
}

// ─── Processor ───────────────────────────────────────────────────────────────

pub struct OverdueProcessor<S, N> {
  store:    Arc<S>,
  notifier: Arc<N>,
  policy:   LifecyclePolicy,
  options:  ProcessorOptions,
  metrics:  Arc<ProcessorMetrics>,
}

impl<S, N> OverdueProcessor<S, N>
where
  S: IssueStore,
  N: Notifier,
{
  pub fn new(
    store: Arc<S>,
    notifier: Arc<N>,
    policy: LifecyclePolicy,
    options: ProcessorOptions,
  ) -> Result<Self> {
    policy.validate()?;
    Ok(Self {
      store,
      notifier,
      policy,
      options,
      metrics: Arc::new(ProcessorMetrics::default()),
    })
  }

  pub fn policy(&self) -> &LifecyclePolicy { &self.policy }

  pub fn metrics(&self) -> &Arc<ProcessorMetrics> { &self.metrics }

  pub fn notifier(&self) -> &Arc<N> { &self.notifier }

  /// Run one pass at `now`.
  ///
  /// `shutdown` is checked before each record: once it reads `true` the
  /// current record is finished and no new one is started.
  #[instrument(skip_all, fields(now = %now))]
  pub async fn run(
    &self,
    now: DateTime<Utc>,
    shutdown: &watch::Receiver<bool>,
  ) -> Result<RunReport> {
    let candidates = match self.fetch_candidates().await {
      Ok(candidates) => candidates,
      Err(e) => {
        error!(error = %e, "overdue check aborted");
        self.metrics.record_failed_run();
        return Err(e);
      }
    };
    info!(count = candidates.len(), "processing overdue candidates");

    let mut report = RunReport::default();
    for details in &candidates {
      let stop = *shutdown.borrow();
      if stop {
        warn!(
          remaining = candidates.len() - report.summary.processed,
          "shutdown requested, stopping overdue check early"
        );
        report.interrupted = true;
        break;
      }
      report.summary.processed += 1;
      self.process(details, now, &mut report).await;
    }

    report.summary.timestamp = Some(now);
    self.metrics.record_run(&report.summary);

    let s = &report.summary;
    info!(
      processed = s.processed,
      first_alerts = s.first_alerts,
      reminders = s.reminders,
      escalations = s.escalations,
      failed = s.failed,
      skipped = s.skipped,
      notification_failures = s.notification_failures,
      missed_security_alerts = s.missed_security_alerts,
      "overdue check completed"
    );
    Ok(report)
  }

  async fn fetch_candidates(&self) -> Result<Vec<IssueDetails>> {
    let limit = self.options.timeout();
    match timeout(limit, self.store.fetch_overdue_candidates(&CANDIDATE_STATUSES)).await {
      Ok(Ok(candidates)) => Ok(candidates),
      Ok(Err(e)) => Err(Error::Fetch(e.to_string())),
      Err(_) => Err(Error::Fetch(format!("timed out after {}s", limit.as_secs()))),
    }
  }

  async fn process(&self, details: &IssueDetails, now: DateTime<Utc>, report: &mut RunReport) {
    let record = &details.record;
    let decision = lifecycle::classify(record.status, record.due_at, now, &self.policy);
    debug!(record_id = %record.id, status = %record.status, ?decision, "classified");

    match decision {
      Decision::NoAction => {}

      Decision::FirstAlert { days_overdue, grace_period_ends } => {
        let update = lifecycle::first_alert_update(now, days_overdue, grace_period_ends);
        if !self.commit(record.id, IssueStatus::Active, update, report).await {
          return;
        }
        report.summary.first_alerts += 1;
        info!(record_id = %record.id, days_overdue, "record marked overdue");

        let alert =
          OverdueAlert::new(details, days_overdue, AlertKind::FirstOverdue { grace_period_ends });
        self.alert_user(alert, report).await;
      }

      Decision::Escalate { days_overdue } => {
        let update = lifecycle::escalation_update(now, days_overdue);
        let mut escalated = details.clone();
        update.apply_to(&mut escalated.record);

        if !self.commit(record.id, IssueStatus::Overdue, update, report).await {
          return;
        }
        report.summary.escalations += 1;
        info!(record_id = %record.id, days_overdue, "record escalated to security");

        let security_report = SecurityReport::new(&escalated, days_overdue, now);
        let delivered = self
          .deliver(record.id, "security alert", || {
            self.notifier.send_escalation_alert(&security_report)
          })
          .await;
        if !delivered {
          warn!(
            record_id = %record.id,
            "security alert not delivered; escalation stands"
          );
          report.summary.missed_security_alerts += 1;
        }

        report.escalations.push(EscalationRecord {
          record_id: record.id,
          user_name: details.user.as_ref().map(|u| u.name.clone()),
          user_email: details.user.as_ref().and_then(|u| u.email.clone()),
          key_label: details.key.as_ref().map(|k| k.label.clone()),
          days_overdue,
          escalation_reason: EscalationReason::GracePeriodExpired,
          security_alert_delivered: delivered,
        });
      }

      Decision::Reminder { days_overdue, days_until_escalation } => {
        report.summary.reminders += 1;
        debug!(record_id = %record.id, days_until_escalation, "sending grace period reminder");
        let alert = OverdueAlert::new(
          details,
          days_overdue,
          AlertKind::GracePeriodReminder { days_until_escalation },
        );
        self.alert_user(alert, report).await;
      }
    }
  }

  /// Write a transition. Returns `true` only if it was applied.
  async fn commit(
    &self,
    id: Uuid,
    expected: IssueStatus,
    update: RecordUpdate,
    report: &mut RunReport,
  ) -> bool {
    let limit = self.options.timeout();
    let outcome = timeout(limit, self.store.update_record(id, expected, update)).await;

    let message = match outcome {
      Ok(Ok(UpdateOutcome::Applied)) => return true,
      Ok(Ok(UpdateOutcome::StatusMismatch { found })) => {
        warn!(
          record_id = %id,
          %expected,
          %found,
          "skipped due to race: status changed since fetch"
        );
        report.summary.skipped += 1;
        report.skipped.push(SkippedRecord { record_id: id, expected, found });
        return false;
      }
      Ok(Ok(UpdateOutcome::Missing)) => "record no longer exists".to_owned(),
      Ok(Err(e)) => e.to_string(),
      Err(_) => format!("update timed out after {}s", limit.as_secs()),
    };

    error!(record_id = %id, error = %message, "failed to update issue record");
    report.summary.failed += 1;
    report.failures.push(RecordFailure { record_id: id, error: message });
    false
  }

  async fn alert_user(&self, alert: OverdueAlert, report: &mut RunReport) {
    let delivered = self
      .deliver(alert.record_id, alert.kind.name(), || self.notifier.send_overdue_alert(&alert))
      .await;
    if !delivered {
      report.summary.notification_failures += 1;
    }
    report.notifications.push(NotificationRecord { alert, delivered });
  }

  /// Call `send` until it succeeds or the attempts run out.
  async fn deliver<F, Fut>(&self, record_id: Uuid, what: &str, mut send: F) -> bool
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), N::Error>>,
  {
    let attempts = self.options.notify_attempts.max(1);
    let limit = self.options.timeout();

    for attempt in 1..=attempts {
      match timeout(limit, send()).await {
        Ok(Ok(())) => return true,
        Ok(Err(e)) => {
          warn!(%record_id, attempt, error = %e, "{what} delivery failed");
        }
        Err(_) => {
          warn!(%record_id, attempt, "{what} delivery timed out");
        }
      }
      if attempt < attempts {
        tokio::time::sleep(self.options.backoff()).await;
      }
    }
    false
  }
}
