//! In-process periodic trigger for the overdue processor.

use std::time::Duration;

use keyward_core::{notify::Notifier, store::IssueStore};
use tokio::{sync::watch, time::MissedTickBehavior};

use crate::{AppState, Error, run_once};

/// Run the processor every `period` until `shutdown` turns `true`.
///
/// The first run starts immediately. A tick that finds a run already in
/// progress (for example one triggered over HTTP) is skipped.
pub async fn run_schedule<S, N>(
  state: AppState<S, N>,
  period: Duration,
  mut shutdown: watch::Receiver<bool>,
) where
  S: IssueStore,
  N: Notifier,
{
  let mut ticker = tokio::time::interval(period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
  tracing::info!(period_secs = period.as_secs(), "overdue schedule started");

  loop {
    if *shutdown.borrow() {
      break;
    }
    tokio::select! {
      _ = ticker.tick() => {}
      changed = shutdown.changed() => {
        if changed.is_err() {
          break;
        }
        continue;
      }
    }

    match run_once(&state).await {
      Ok(report) => tracing::debug!(
        processed = report.summary.processed,
        interrupted = report.interrupted,
        "scheduled overdue check finished"
      ),
      Err(Error::RunInProgress) => {
        tracing::info!("overdue check already running, skipping scheduled tick")
      }
      Err(e) => tracing::error!(error = %e, "scheduled overdue check failed"),
    }
  }

  tracing::info!("overdue schedule stopped");
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use keyward_core::{
    policy::LifecyclePolicy,
    processor::{OverdueProcessor, ProcessorOptions},
  };
  use keyward_notify::LogNotifier;
  use keyward_store_sqlite::SqliteStore;

  use super::*;
  use crate::auth::AuthConfig;

  async fn state(shutdown: watch::Receiver<bool>) -> AppState<SqliteStore, LogNotifier> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let processor = OverdueProcessor::new(
      store.clone(),
      Arc::new(LogNotifier),
      LifecyclePolicy::default(),
      ProcessorOptions::default(),
    )
    .unwrap();
    AppState::new(store, processor, AuthConfig { token_hash: String::new() }, shutdown)
  }

  #[tokio::test]
  async fn stops_immediately_when_already_shut_down() {
    let (tx, rx) = watch::channel(false);
    let state = state(rx.clone()).await;
    tx.send(true).unwrap();

    tokio::time::timeout(
      Duration::from_secs(1),
      run_schedule(state.clone(), Duration::from_secs(3600), rx),
    )
    .await
    .unwrap();
    assert_eq!(state.processor.metrics().snapshot().runs, 0);
  }

  #[tokio::test]
  async fn runs_repeatedly_until_shutdown() {
    let (tx, rx) = watch::channel(false);
    let state = state(rx.clone()).await;
    let task = tokio::spawn(run_schedule(state.clone(), Duration::from_millis(20), rx));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while state.processor.metrics().snapshot().runs < 2 {
      assert!(tokio::time::Instant::now() < deadline, "schedule never ran twice");
      tokio::time::sleep(Duration::from_millis(10)).await;
    }

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
  }

  #[tokio::test]
  async fn skips_tick_while_run_in_progress() {
    let (tx, rx) = watch::channel(false);
    let state = state(rx.clone()).await;
    let held = state.run_guard.clone().lock_owned().await;
    let task = tokio::spawn(run_schedule(state.clone(), Duration::from_millis(10), rx));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(state.processor.metrics().snapshot().runs, 0);

    drop(held);
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
  }
}
