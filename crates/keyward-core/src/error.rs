//! Error types for `keyward-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::record::IssueStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("issue record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("key not found: {0}")]
  KeyNotFound(Uuid),

  #[error("key {0} is not available")]
  KeyUnavailable(Uuid),

  #[error("due date must be after the issue time")]
  InvalidDueDate,

  #[error("issue record {0} is already closed")]
  AlreadyClosed(Uuid),

  #[error("issue record {0} is already escalated")]
  AlreadyEscalated(Uuid),

  #[error("security notes on {0} can only be edited after escalation")]
  NotEscalated(Uuid),

  #[error("cannot move issue record from {from} to {to}")]
  InvalidTransition { from: IssueStatus, to: IssueStatus },

  #[error("issue record {id} changed concurrently: expected {expected}, found {found}")]
  StatusConflict {
    id:       Uuid,
    expected: IssueStatus,
    found:    IssueStatus,
  },

  #[error("security division notification failed: {0}")]
  Notification(String),

  #[error("invalid policy: {0}")]
  InvalidPolicy(String),

  #[error("failed to fetch overdue candidates: {0}")]
  Fetch(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Box a backend error into [`Error::Store`].
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
