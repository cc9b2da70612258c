//! Handlers for `/records` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/records` | Optional `?status=active\|overdue\|escalated\|closed` |
//! | `POST` | `/records` | Issue a key; body: [`IssueRequest`] |
//! | `GET`  | `/records/:id` | Record with its user and key |
//! | `POST` | `/records/:id/return` | Close; allowed while locked |
//! | `POST` | `/records/:id/escalate` | Manual escalation |
//! | `PUT`  | `/records/:id/security-notes` | Escalated records only |
//! | `POST` | `/records/:id/notify-security` | Resend the security report; escalated or locked only |
//!
//! State changes go through [`keyward_core::actions`], which writes with a
//! status compare-and-set; losing a race with the processor is a 409.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use keyward_core::{
  actions::{self, IssueRequest},
  notify::Notifier,
  record::{IssueDetails, IssueRecord, IssueStatus},
  security::SecurityReport,
  store::IssueStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Reads ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<IssueStatus>,
}

/// `GET /records[?status=<status>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<IssueRecord>>, ApiError>
where
  S: IssueStore,
{
  let statuses: Vec<IssueStatus> = params.status.into_iter().collect();
  let records = store
    .list_records(&statuses)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(records))
}

/// `GET /records/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<IssueDetails>, ApiError>
where
  S: IssueStore,
{
  let details = store
    .get_record(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("issue record {id} not found")))?;
  Ok(Json(details))
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// `POST /records`, returns 201 + the new record.
pub async fn issue<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<IssueRequest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IssueStore,
{
  let record = actions::issue_key(store.as_ref(), body, Utc::now()).await?;
  tracing::info!(record_id = %record.id, key_id = %record.key_id, "key issued");
  Ok((StatusCode::CREATED, Json(record)))
}

/// Body shared by return and escalate.
#[derive(Debug, Deserialize)]
pub struct ActionBody {
  pub admin_id: Uuid,
  #[serde(default)]
  pub notes:    Option<String>,
}

/// `POST /records/:id/return`
pub async fn return_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActionBody>,
) -> Result<Json<IssueRecord>, ApiError>
where
  S: IssueStore,
{
  let record =
    actions::return_key(store.as_ref(), id, body.admin_id, body.notes, Utc::now()).await?;
  tracing::info!(record_id = %id, "key returned");
  Ok(Json(record))
}

/// `POST /records/:id/escalate`
pub async fn escalate_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActionBody>,
) -> Result<Json<IssueRecord>, ApiError>
where
  S: IssueStore,
{
  let record =
    actions::escalate(store.as_ref(), id, body.admin_id, body.notes, Utc::now()).await?;
  tracing::info!(record_id = %id, "record escalated manually");
  Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct SecurityNotesBody {
  pub admin_id: Uuid,
  pub notes:    String,
}

/// `PUT /records/:id/security-notes`
pub async fn security_notes<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<SecurityNotesBody>,
) -> Result<Json<IssueRecord>, ApiError>
where
  S: IssueStore,
{
  let record =
    actions::update_security_notes(store.as_ref(), id, body.admin_id, body.notes, Utc::now())
      .await?;
  Ok(Json(record))
}

/// `POST /records/:id/notify-security`
pub async fn notify_security<S, N>(
  State((store, notifier)): State<(Arc<S>, Arc<N>)>,
  Path(id): Path<Uuid>,
) -> Result<Json<SecurityReport>, ApiError>
where
  S: IssueStore,
  N: Notifier,
{
  let report =
    actions::notify_security(store.as_ref(), notifier.as_ref(), id, Utc::now()).await?;
  tracing::info!(
    record_id = %id,
    risk_level = report.risk_level.as_str(),
    "security division notified"
  );
  Ok(Json(report))
}
