//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("an overdue check is already running")]
  RunInProgress,

  #[error("overdue check failed: {details}")]
  RunFailed {
    details:   String,
    timestamp: DateTime<Utc>,
  },
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res =
          (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Bearer realm=\"keyward\""),
        );
        res
      }
      Error::RunInProgress => (
        StatusCode::CONFLICT,
        Json(json!({ "error": "An overdue check is already running" })),
      )
        .into_response(),
      Error::RunFailed { details, timestamp } => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
          "error": "Overdue check failed",
          "details": details,
          "timestamp": timestamp,
        })),
      )
        .into_response(),
    }
  }
}
