//! Process-wide counters for the overdue processor.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::report::RunSummary;

/// Monotonic counters accumulated across runs.
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
  runs:                   AtomicU64,
  failed_runs:            AtomicU64,
  first_alerts:           AtomicU64,
  reminders:              AtomicU64,
  escalations:            AtomicU64,
  failed_records:         AtomicU64,
  skipped_records:        AtomicU64,
  notification_failures:  AtomicU64,
  missed_security_alerts: AtomicU64,
}

/// A point-in-time copy of [`ProcessorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
  pub runs:                   u64,
  pub failed_runs:            u64,
  pub first_alerts:           u64,
  pub reminders:              u64,
  pub escalations:            u64,
  pub failed_records:         u64,
  pub skipped_records:        u64,
  pub notification_failures:  u64,
  pub missed_security_alerts: u64,
}

fn add(counter: &AtomicU64, n: usize) { counter.fetch_add(n as u64, Ordering::Relaxed); }

impl ProcessorMetrics {
  pub fn record_run(&self, summary: &RunSummary) {
    add(&self.runs, 1);
    add(&self.first_alerts, summary.first_alerts);
    add(&self.reminders, summary.reminders);
    add(&self.escalations, summary.escalations);
    add(&self.failed_records, summary.failed);
    add(&self.skipped_records, summary.skipped);
    add(&self.notification_failures, summary.notification_failures);
    add(&self.missed_security_alerts, summary.missed_security_alerts);
  }

  pub fn record_failed_run(&self) { add(&self.failed_runs, 1); }

  pub fn snapshot(&self) -> MetricsSnapshot {
    let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
    MetricsSnapshot {
      runs:                   load(&self.runs),
      failed_runs:            load(&self.failed_runs),
      first_alerts:           load(&self.first_alerts),
      reminders:              load(&self.reminders),
      escalations:            load(&self.escalations),
      failed_records:         load(&self.failed_records),
      skipped_records:        load(&self.skipped_records),
      notification_failures:  load(&self.notification_failures),
      missed_security_alerts: load(&self.missed_security_alerts),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accumulates_across_runs() {
    let metrics = ProcessorMetrics::default();
    let summary = RunSummary {
      first_alerts: 2,
      escalations: 1,
      missed_security_alerts: 1,
      ..Default::default()
    };
    metrics.record_run(&summary);
    metrics.record_run(&summary);
    metrics.record_failed_run();

    let snap = metrics.snapshot();
    assert_eq!(snap.runs, 2);
    assert_eq!(snap.failed_runs, 1);
    assert_eq!(snap.first_alerts, 4);
    assert_eq!(snap.escalations, 2);
    assert_eq!(snap.missed_security_alerts, 2);
    assert_eq!(snap.reminders, 0);
  }
}
