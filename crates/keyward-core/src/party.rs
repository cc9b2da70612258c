//! Users who borrow keys and the keys themselves.
//!
//! Both are referenced by issue records but never owned by them. The overdue
//! processor reads their display fields for notifications and nothing else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Users ───────────────────────────────────────────────────────────────────

/// The institutional role of a borrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
  Student,
  Lecturer,
  Cleaner,
}

impl UserRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Student => "student",
      Self::Lecturer => "lecturer",
      Self::Cleaner => "cleaner",
    }
  }
}

/// A person who can be issued keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:         Uuid,
  pub name:       String,
  pub role:       UserRole,
  /// Institutional identifier printed on the ID card (student or staff
  /// number). Distinct from `id`.
  pub user_id:    String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::IssueStore::add_user`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub name:    String,
  pub role:    UserRole,
  pub user_id: String,
  #[serde(default)]
  pub email:   Option<String>,
  #[serde(default)]
  pub phone:   Option<String>,
}

// ─── Keys ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
  Available,
  CheckedOut,
}

impl KeyStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Available => "available",
      Self::CheckedOut => "checked_out",
    }
  }
}

/// A physical key for a room or cabinet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
  pub id:         Uuid,
  pub label:      String,
  pub location:   String,
  pub status:     KeyStatus,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::IssueStore::add_key`]. New keys start out
/// [`KeyStatus::Available`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewKey {
  pub label:    String,
  pub location: String,
}
