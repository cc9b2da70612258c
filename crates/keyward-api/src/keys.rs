//! Handlers for `/keys` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/keys` | Optional `?status=available\|checked_out` |
//! | `POST` | `/keys` | Body: `{"label":"B-204","location":"Babbage Hall"}` |
//! | `GET`  | `/keys/:id` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use keyward_core::{
  party::{Key, KeyStatus, NewKey},
  store::IssueStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<KeyStatus>,
}

/// `GET /keys[?status=<status>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Key>>, ApiError>
where
  S: IssueStore,
{
  let keys = store
    .list_keys(params.status)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(keys))
}

/// `POST /keys`. New keys start `available`.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewKey>,
) -> Result<impl IntoResponse, ApiError>
where
  S: IssueStore,
{
  let key = store
    .add_key(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(key)))
}

/// `GET /keys/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Key>, ApiError>
where
  S: IssueStore,
{
  let key = store
    .get_key(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("key {id} not found")))?;
  Ok(Json(key))
}
