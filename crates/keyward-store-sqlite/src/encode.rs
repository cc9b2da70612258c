//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase, and audit
//! entries compact JSON.

use chrono::{DateTime, Utc};
use keyward_core::{
  audit::AuditEntry,
  party::{Key, KeyStatus, User, UserRole},
  record::{IssueDetails, IssueRecord, IssueStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<IssueStatus> {
  IssueStatus::parse(s).ok_or_else(|| Error::UnknownValue {
    column: "status",
    value:  s.to_owned(),
  })
}

pub fn decode_role(s: &str) -> Result<UserRole> {
  match s {
    "student" => Ok(UserRole::Student),
    "lecturer" => Ok(UserRole::Lecturer),
    "cleaner" => Ok(UserRole::Cleaner),
    other => Err(Error::UnknownValue { column: "role", value: other.to_owned() }),
  }
}

pub fn decode_key_status(s: &str) -> Result<KeyStatus> {
  match s {
    "available" => Ok(KeyStatus::Available),
    "checked_out" => Ok(KeyStatus::CheckedOut),
    other => Err(Error::UnknownValue {
      column: "key status",
      value:  other.to_owned(),
    }),
  }
}

// ─── Audit entries ───────────────────────────────────────────────────────────

pub fn encode_entry(entry: &AuditEntry) -> Result<String> {
  Ok(serde_json::to_string(entry)?)
}

pub fn decode_entry(s: &str) -> Result<AuditEntry> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub id:         String,
  pub name:       String,
  pub role:       String,
  pub user_id:    String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub created_at: String,
}

impl RawUser {
  pub const COLUMNS: &'static str = "id, name, role, user_id, email, phone, created_at";
  pub const WIDTH: usize = 7;

  /// Reads the user columns starting at index `at`.
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(at)?,
      name:       row.get(at + 1)?,
      role:       row.get(at + 2)?,
      user_id:    row.get(at + 3)?,
      email:      row.get(at + 4)?,
      phone:      row.get(at + 5)?,
      created_at: row.get(at + 6)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:         decode_uuid(&self.id)?,
      name:       self.name,
      role:       decode_role(&self.role)?,
      user_id:    self.user_id,
      email:      self.email,
      phone:      self.phone,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `keys` row.
pub struct RawKey {
  pub id:         String,
  pub label:      String,
  pub location:   String,
  pub status:     String,
  pub created_at: String,
}

impl RawKey {
  pub const COLUMNS: &'static str = "id, label, location, status, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(at)?,
      label:      row.get(at + 1)?,
      location:   row.get(at + 2)?,
      status:     row.get(at + 3)?,
      created_at: row.get(at + 4)?,
    })
  }

  pub fn into_key(self) -> Result<Key> {
    Ok(Key {
      id:         decode_uuid(&self.id)?,
      label:      self.label,
      location:   self.location,
      status:     decode_key_status(&self.status)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings from an `issue_records` row plus its audit entries in
/// sequence order.
pub struct RawRecord {
  pub id:             String,
  pub user_id:        String,
  pub key_id:         String,
  pub admin_id:       Option<String>,
  pub issued_at:      String,
  pub due_at:         String,
  pub returned_at:    Option<String>,
  pub status:         String,
  pub security_notes: Option<String>,
  pub is_locked:      bool,
  pub created_at:     String,
  pub entries:        Vec<String>,
}

impl RawRecord {
  pub const WIDTH: usize = 11;

  /// Reads the record columns; `entries` is filled in separately.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      user_id:        row.get(1)?,
      key_id:         row.get(2)?,
      admin_id:       row.get(3)?,
      issued_at:      row.get(4)?,
      due_at:         row.get(5)?,
      returned_at:    row.get(6)?,
      status:         row.get(7)?,
      security_notes: row.get(8)?,
      is_locked:      row.get(9)?,
      created_at:     row.get(10)?,
      entries:        Vec::new(),
    })
  }

  pub fn into_record(self) -> Result<IssueRecord> {
    Ok(IssueRecord {
      id:             decode_uuid(&self.id)?,
      user_id:        decode_uuid(&self.user_id)?,
      key_id:         decode_uuid(&self.key_id)?,
      admin_id:       self.admin_id.as_deref().map(decode_uuid).transpose()?,
      issued_at:      decode_dt(&self.issued_at)?,
      due_at:         decode_dt(&self.due_at)?,
      returned_at:    self.returned_at.as_deref().map(decode_dt).transpose()?,
      status:         decode_status(&self.status)?,
      audit_trail:    self
        .entries
        .iter()
        .map(|s| decode_entry(s))
        .collect::<Result<_>>()?,
      security_notes: self.security_notes,
      is_locked:      self.is_locked,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// A record row together with its (possibly missing) user and key.
pub struct RawDetails {
  pub record: RawRecord,
  pub user:   Option<RawUser>,
  pub key:    Option<RawKey>,
}

impl RawDetails {
  pub fn into_details(self) -> Result<IssueDetails> {
    Ok(IssueDetails {
      record: self.record.into_record()?,
      user:   self.user.map(RawUser::into_user).transpose()?,
      key:    self.key.map(RawKey::into_key).transpose()?,
    })
  }
}
