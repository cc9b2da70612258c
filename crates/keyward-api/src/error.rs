//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use keyward_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The request is well-formed but the record or key is in the wrong state.
  #[error("conflict: {0}")]
  Conflict(String),

  /// A downstream delivery failed.
  #[error("upstream error: {0}")]
  Upstream(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<CoreError> for ApiError {
  fn from(err: CoreError) -> Self {
    match err {
      CoreError::RecordNotFound(_) | CoreError::UserNotFound(_) | CoreError::KeyNotFound(_) => {
        ApiError::NotFound(err.to_string())
      }
      CoreError::InvalidDueDate | CoreError::InvalidPolicy(_) => {
        ApiError::BadRequest(err.to_string())
      }
      CoreError::KeyUnavailable(_)
      | CoreError::AlreadyClosed(_)
      | CoreError::AlreadyEscalated(_)
      | CoreError::NotEscalated(_)
      | CoreError::InvalidTransition { .. }
      | CoreError::StatusConflict { .. } => ApiError::Conflict(err.to_string()),
      CoreError::Notification(_) => ApiError::Upstream(err.to_string()),
      CoreError::Store(e) => ApiError::Store(e),
      other => ApiError::Store(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Upstream(m) => {
        tracing::warn!(error = %m, "upstream failure in api handler");
        (StatusCode::BAD_GATEWAY, m.clone())
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure in api handler");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
