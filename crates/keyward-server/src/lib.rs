//! HTTP surface and scheduling for the Keyward overdue processor.
//!
//! Exposes the processor trigger (`POST /jobs/overdue`), a metrics snapshot,
//! a health check and the admin JSON API under `/api`.

pub mod auth;
pub mod error;
pub mod scheduler;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::State,
  middleware,
  routing::{get, post},
};
use chrono::Utc;
use keyward_core::{
  metrics::MetricsSnapshot,
  notify::Notifier,
  policy::LifecyclePolicy,
  processor::{OverdueProcessor, ProcessorOptions},
  report::RunReport,
  store::IssueStore,
};
use keyward_notify::NotifierConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, Authenticated};

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("keyward.db") }

/// Runtime server configuration, deserialised from `config.toml` and
/// `KEYWARD_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  /// Argon2 PHC hash of the bearer token. Empty rejects every request.
  #[serde(default)]
  pub auth_token_hash:        String,
  /// Seconds between scheduled runs; `0` leaves triggering to `POST
  /// /jobs/overdue`.
  #[serde(default)]
  pub schedule_interval_secs: u64,
  #[serde(default)]
  pub policy:                 LifecyclePolicy,
  #[serde(default)]
  pub processor:              ProcessorOptions,
  #[serde(default)]
  pub notifier:               NotifierConfig,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers and the scheduler.
pub struct AppState<S, N> {
  pub store:     Arc<S>,
  pub processor: Arc<OverdueProcessor<S, N>>,
  pub auth:      Arc<AuthConfig>,
  /// Held for the duration of a run; at most one run per process.
  pub run_guard: Arc<Mutex<()>>,
  pub shutdown:  watch::Receiver<bool>,
}

impl<S, N> Clone for AppState<S, N> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      processor: self.processor.clone(),
      auth:      self.auth.clone(),
      run_guard: self.run_guard.clone(),
      shutdown:  self.shutdown.clone(),
    }
  }
}

impl<S, N> AppState<S, N>
where
  S: IssueStore,
  N: Notifier,
{
  pub fn new(
    store: Arc<S>,
    processor: OverdueProcessor<S, N>,
    auth: AuthConfig,
    shutdown: watch::Receiver<bool>,
  ) -> Self {
    Self {
      store,
      processor: Arc::new(processor),
      auth: Arc::new(auth),
      run_guard: Arc::new(Mutex::new(())),
      shutdown,
    }
  }
}

/// Run the processor once at the current time unless a run is already in
/// progress.
pub async fn run_once<S, N>(state: &AppState<S, N>) -> Result<RunReport, Error>
where
  S: IssueStore,
  N: Notifier,
{
  let _guard = state.run_guard.try_lock().map_err(|_| Error::RunInProgress)?;
  let now = Utc::now();
  state
    .processor
    .run(now, &state.shutdown)
    .await
    .map_err(|e| Error::RunFailed { details: e.to_string(), timestamp: now })
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S, N>(state: AppState<S, N>) -> Router
where
  S: IssueStore + 'static,
  N: Notifier + 'static,
{
  let api = keyward_api::api_router(state.store.clone(), state.processor.notifier().clone())
    .layer(middleware::from_fn_with_state(state.auth.clone(), auth::require_bearer));

  Router::new()
    .route("/jobs/overdue", post(run_overdue::<S, N>))
    .route("/metrics", get(metrics::<S, N>))
    .route("/healthz", get(healthz))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RunResponse {
  success: bool,
  #[serde(flatten)]
  report:  RunReport,
}

/// `POST /jobs/overdue`
async fn run_overdue<S, N>(
  _auth: Authenticated,
  State(state): State<AppState<S, N>>,
) -> Result<Json<RunResponse>, Error>
where
  S: IssueStore + 'static,
  N: Notifier + 'static,
{
  let report = run_once(&state).await?;
  Ok(Json(RunResponse { success: true, report }))
}

/// `GET /metrics`
async fn metrics<S, N>(
  _auth: Authenticated,
  State(state): State<AppState<S, N>>,
) -> Json<MetricsSnapshot>
where
  S: IssueStore + 'static,
  N: Notifier + 'static,
{
  Json(state.processor.metrics().snapshot())
}

async fn healthz() -> &'static str { "ok" }

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::IntoResponse as _,
  };
  use chrono::Duration;
  use keyward_core::{
    audit::{Actor, AuditAction, AuditEntry},
    party::{NewKey, NewUser, UserRole},
    record::{IssueStatus, NewIssue},
  };
  use keyward_notify::LogNotifier;
  use keyward_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  const TOKEN: &str = "s3cret";

  async fn make_state() -> AppState<SqliteStore, LogNotifier> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let processor = OverdueProcessor::new(
      store.clone(),
      Arc::new(LogNotifier),
      LifecyclePolicy::default(),
      ProcessorOptions::default(),
    )
    .unwrap();
    let auth = AuthConfig { token_hash: auth::hash_token(TOKEN).unwrap() };
    AppState::new(store, processor, auth, watch::channel(false).1)
  }

  /// Issue a key that fell due `days_ago` days ago.
  async fn seed_overdue(store: &SqliteStore, days_ago: i64) -> Uuid {
    let user = store
      .add_user(NewUser {
        name:    "Alan Turing".into(),
        role:    UserRole::Lecturer,
        user_id: "L-1912".into(),
        email:   Some("alan@example.edu".into()),
        phone:   None,
      })
      .await
      .unwrap();
    let key = store
      .add_key(NewKey { label: "H-8".into(), location: "Hut 8".into() })
      .await
      .unwrap();
    let due_at = Utc::now() - Duration::days(days_ago) - Duration::hours(1);
    let issued_at = due_at - Duration::days(7);
    let admin = Uuid::from_u128(1);
    store
      .create_issue(NewIssue {
        user_id: user.id,
        key_id: key.id,
        admin_id: admin,
        issued_at,
        due_at,
        entry: AuditEntry::new(AuditAction::Issued, Actor::Admin(admin), issued_at, "Key issued to user"),
      })
      .await
      .unwrap()
      .unwrap()
      .id
  }

  async fn call(
    state: AppState<SqliteStore, LogNotifier>,
    method: &str,
    uri: &str,
    token: Option<&str>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let resp = router(state).oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
  }

  #[tokio::test]
  async fn healthz_needs_no_auth() {
    let state = make_state().await;
    let resp = router(state)
      .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn trigger_requires_bearer() {
    let state = make_state().await;
    let (status, _) = call(state.clone(), "POST", "/jobs/overdue", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(state, "POST", "/jobs/overdue", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn trigger_on_empty_store_succeeds() {
    let state = make_state().await;
    let (status, body) = call(state, "POST", "/jobs/overdue", Some(TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["summary"]["processed"], 0);
    assert_eq!(body["interrupted"], false);
  }

  #[tokio::test]
  async fn trigger_sends_first_alert_and_updates_metrics() {
    let state = make_state().await;
    let id = seed_overdue(&state.store, 2).await;

    let (status, body) = call(state.clone(), "POST", "/jobs/overdue", Some(TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["firstAlerts"], 1);
    assert_eq!(body["notifications"][0]["alertType"], "first_overdue");
    assert_eq!(body["notifications"][0]["delivered"], true);

    let record = state.store.get_record(id).await.unwrap().unwrap().record;
    assert_eq!(record.status, IssueStatus::Overdue);

    let (status, metrics) = call(state, "GET", "/metrics", Some(TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["runs"], 1);
    assert_eq!(metrics["first_alerts"], 1);
  }

  #[tokio::test]
  async fn overlapping_trigger_conflicts() {
    let state = make_state().await;
    let _held = state.run_guard.clone().lock_owned().await;

    let (status, body) = call(state.clone(), "POST", "/jobs/overdue", Some(TOKEN)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
    assert_eq!(state.processor.metrics().snapshot().runs, 0);
  }

  #[tokio::test]
  async fn api_is_behind_bearer() {
    let state = make_state().await;
    let (status, _) = call(state.clone(), "GET", "/api/keys", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = call(state, "GET", "/api/keys", Some(TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn failed_run_reports_500_body() {
    let now = Utc::now();
    let resp = Error::RunFailed { details: "database is locked".into(), timestamp: now }
      .into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Overdue check failed");
    assert_eq!(body["details"], "database is locked");
    assert!(body["timestamp"].is_string());
  }
}
