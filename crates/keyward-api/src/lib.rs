//! JSON REST API for Keyward administration.
//!
//! Exposes an axum [`Router`] backed by any [`keyward_core::store::IssueStore`]
//! for registering users and keys, issuing keys, and the manual record
//! actions (return, escalate, security notes, notify security). Auth and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", keyward_api::api_router(store.clone(), notifier.clone()))
//! ```

pub mod error;
pub mod keys;
pub mod records;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use keyward_core::{notify::Notifier, store::IssueStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`. `notifier` is only
/// used by `POST /records/{id}/notify-security`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, N>(store: Arc<S>, notifier: Arc<N>) -> Router<()>
where
  S: IssueStore + 'static,
  N: Notifier + 'static,
{
  let security = Router::new()
    .route("/records/{id}/notify-security", post(records::notify_security::<S, N>))
    .with_state((store.clone(), notifier));

  Router::new()
    // Users
    .route("/users", post(users::create::<S>))
    .route("/users/{id}", get(users::get_one::<S>))
    // Keys
    .route("/keys", get(keys::list::<S>).post(keys::create::<S>))
    .route("/keys/{id}", get(keys::get_one::<S>))
    // Records
    .route("/records", get(records::list::<S>).post(records::issue::<S>))
    .route("/records/{id}", get(records::get_one::<S>))
    .route("/records/{id}/return", post(records::return_one::<S>))
    .route("/records/{id}/escalate", post(records::escalate_one::<S>))
    .route("/records/{id}/security-notes", put(records::security_notes::<S>))
    .with_state(store)
    .merge(security)
}

// ─── Integration tests ───────────────────────────────────────────────────────
