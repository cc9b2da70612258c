//! [`SqliteStore`], the SQLite implementation of [`IssueStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params, params_from_iter};
use uuid::Uuid;

use keyward_core::{
  party::{Key, KeyStatus, NewKey, NewUser, User},
  record::{IssueDetails, IssueRecord, IssueStatus, NewIssue, RecordUpdate},
  store::{IssueStore, UpdateOutcome},
};

use crate::{
  Result,
  encode::{
    RawDetails, RawKey, RawRecord, RawUser, decode_status, encode_dt, encode_entry,
    encode_uuid,
  },
  error::Error,
  schema::SCHEMA,
};

const DETAILS_SELECT: &str = "
  SELECT
    r.id, r.user_id, r.key_id, r.admin_id, r.issued_at, r.due_at,
    r.returned_at, r.status, r.security_notes, r.is_locked, r.created_at,
    u.id, u.name, u.role, u.user_id, u.email, u.phone, u.created_at,
    k.id, k.label, k.location, k.status, k.created_at
  FROM issue_records r
  LEFT JOIN users u ON u.id = r.user_id
  LEFT JOIN keys  k ON k.id = r.key_id";

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn details_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDetails> {
  let user_at = RawRecord::WIDTH;
  let key_at = user_at + RawUser::WIDTH;

  let has_user = row.get::<_, Option<String>>(user_at)?.is_some();
  let has_key = row.get::<_, Option<String>>(key_at)?.is_some();

  Ok(RawDetails {
    record: RawRecord::from_row(row)?,
    user:   has_user.then(|| RawUser::from_row(row, user_at)).transpose()?,
    key:    has_key.then(|| RawKey::from_row(row, key_at)).transpose()?,
  })
}

/// Fill `entries` for each record, in append order.
fn load_entries<'a>(
  conn: &rusqlite::Connection,
  records: impl IntoIterator<Item = &'a mut RawRecord>,
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare_cached(
    "SELECT entry_json FROM audit_entries WHERE record_id = ?1 ORDER BY seq",
  )?;
  for record in records {
    record.entries = stmt
      .query_map(params![record.id], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
  }
  Ok(())
}

/// `?1, ?2, ...` for an `IN (...)` clause of `n` values.
fn placeholders(n: usize) -> String {
  (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

fn append_entry(
  conn: &rusqlite::Connection,
  record_id: &str,
  entry_json: &str,
) -> rusqlite::Result<()> {
  let seq: i64 = conn.query_row(
    "SELECT COALESCE(MAX(seq) + 1, 0) FROM audit_entries WHERE record_id = ?1",
    params![record_id],
    |row| row.get(0),
  )?;
  conn.execute(
    "INSERT INTO audit_entries (record_id, seq, entry_json) VALUES (?1, ?2, ?3)",
    params![record_id, seq, entry_json],
  )?;
  Ok(())
}

/// What the compare-and-set transaction saw, before decoding.
enum RawOutcome {
  Applied,
  Mismatch(String),
  Missing,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Keyward issue store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_details(
    &self,
    filter: String,
    args: Vec<String>,
  ) -> Result<Vec<IssueDetails>> {
    let raws: Vec<RawDetails> = self
      .conn
      .call(move |conn| {
        let sql = format!("{DETAILS_SELECT} {filter} ORDER BY r.due_at, r.id");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
          .query_map(params_from_iter(args.iter()), details_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        load_entries(conn, rows.iter_mut().map(|d| &mut d.record))?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDetails::into_details).collect()
  }
}

// ─── IssueStore impl ─────────────────────────────────────────────────────────

impl IssueStore for SqliteStore {
  type Error = Error;

  // ── Users and keys ────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      id:         Uuid::new_v4(),
      name:       input.name,
      role:       input.role,
      user_id:    input.user_id,
      email:      input.email,
      phone:      input.phone,
      created_at: Utc::now(),
    };

    let id_str   = encode_uuid(user.id);
    let name     = user.name.clone();
    let role_str = user.role.as_str();
    let user_id  = user.user_id.clone();
    let email    = user.email.clone();
    let phone    = user.phone.clone();
    let at_str   = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (id, name, role, user_id, email, phone, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          params![id_str, name, role_str, user_id, email, phone, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", RawUser::COLUMNS),
            params![id_str],
            |row| RawUser::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn add_key(&self, input: NewKey) -> Result<Key> {
    let key = Key {
      id:         Uuid::new_v4(),
      label:      input.label,
      location:   input.location,
      status:     KeyStatus::Available,
      created_at: Utc::now(),
    };

    let id_str     = encode_uuid(key.id);
    let label      = key.label.clone();
    let location   = key.location.clone();
    let status_str = key.status.as_str();
    let at_str     = encode_dt(key.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO keys (id, label, location, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id_str, label, location, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(key)
  }

  async fn get_key(&self, id: Uuid) -> Result<Option<Key>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawKey> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM keys WHERE id = ?1", RawKey::COLUMNS),
            params![id_str],
            |row| RawKey::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawKey::into_key).transpose()
  }

  async fn list_keys(&self, status: Option<KeyStatus>) -> Result<Vec<Key>> {
    let status_str = status.map(KeyStatus::as_str);

    let raws: Vec<RawKey> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(s) = status_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM keys WHERE status = ?1 ORDER BY label",
            RawKey::COLUMNS
          ))?;
          stmt
            .query_map(params![s], |row| RawKey::from_row(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn
            .prepare(&format!("SELECT {} FROM keys ORDER BY label", RawKey::COLUMNS))?;
          stmt
            .query_map([], |row| RawKey::from_row(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawKey::into_key).collect()
  }

  // ── Issue records ─────────────────────────────────────────────────────────

  async fn create_issue(&self, input: NewIssue) -> Result<Option<IssueRecord>> {
    let record = IssueRecord {
      id:             Uuid::new_v4(),
      user_id:        input.user_id,
      key_id:         input.key_id,
      admin_id:       Some(input.admin_id),
      issued_at:      input.issued_at,
      due_at:         input.due_at,
      returned_at:    None,
      status:         IssueStatus::Active,
      audit_trail:    vec![input.entry],
      security_notes: None,
      is_locked:      false,
      created_at:     input.issued_at,
    };

    let id_str       = encode_uuid(record.id);
    let user_id_str  = encode_uuid(record.user_id);
    let key_id_str   = encode_uuid(record.key_id);
    let admin_id_str = encode_uuid(input.admin_id);
    let issued_str   = encode_dt(record.issued_at);
    let due_str      = encode_dt(record.due_at);
    let entry_json   = encode_entry(&record.audit_trail[0])?;

    let checked_out = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let claimed = tx.execute(
          "UPDATE keys SET status = 'checked_out' WHERE id = ?1 AND status = 'available'",
          params![key_id_str],
        )?;
        if claimed == 0 {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO issue_records (
             id, user_id, key_id, admin_id, issued_at, due_at, status, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', ?5)",
          params![id_str, user_id_str, key_id_str, admin_id_str, issued_str, due_str],
        )?;
        append_entry(&tx, &id_str, &entry_json)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(checked_out.then_some(record))
  }

  async fn get_record(&self, id: Uuid) -> Result<Option<IssueDetails>> {
    let mut found = self
      .query_details("WHERE r.id = ?1".to_owned(), vec![encode_uuid(id)])
      .await?;
    Ok(found.pop())
  }

  async fn list_records(&self, statuses: &[IssueStatus]) -> Result<Vec<IssueRecord>> {
    let details = if statuses.is_empty() {
      self.query_details(String::new(), Vec::new()).await?
    } else {
      self
        .query_details(
          format!("WHERE r.status IN ({})", placeholders(statuses.len())),
          statuses.iter().map(|s| s.as_str().to_owned()).collect(),
        )
        .await?
    };
    Ok(details.into_iter().map(|d| d.record).collect())
  }

  async fn fetch_overdue_candidates(
    &self,
    statuses: &[IssueStatus],
  ) -> Result<Vec<IssueDetails>> {
    if statuses.is_empty() {
      return Ok(Vec::new());
    }
    self
      .query_details(
        format!("WHERE r.status IN ({})", placeholders(statuses.len())),
        statuses.iter().map(|s| s.as_str().to_owned()).collect(),
      )
      .await
  }

  async fn update_record(
    &self,
    id: Uuid,
    expected: IssueStatus,
    update: RecordUpdate,
  ) -> Result<UpdateOutcome> {
    update.validate(expected)?;

    let id_str       = encode_uuid(id);
    let expected_str = expected.as_str();
    let status_str   = update.status.map(IssueStatus::as_str);
    let notes        = update.security_notes.clone();
    let lock         = update.lock;
    let returned_str = update.returned_at.map(encode_dt);
    let entry_json   = encode_entry(&update.entry)?;
    let closing      = update.status == Some(IssueStatus::Closed);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<String> = tx
          .query_row(
            "SELECT status FROM issue_records WHERE id = ?1",
            params![id_str],
            |row| row.get(0),
          )
          .optional()?;

        let Some(current) = current else {
          return Ok(RawOutcome::Missing);
        };
        if current != expected_str {
          return Ok(RawOutcome::Mismatch(current));
        }

        tx.execute(
          "UPDATE issue_records SET
             status         = COALESCE(?2, status),
             security_notes = COALESCE(?3, security_notes),
             is_locked      = (is_locked OR ?4),
             returned_at    = COALESCE(?5, returned_at)
           WHERE id = ?1 AND status = ?6",
          params![id_str, status_str, notes, lock, returned_str, expected_str],
        )?;
        append_entry(&tx, &id_str, &entry_json)?;

        if closing {
          tx.execute(
            "UPDATE keys SET status = 'available'
             WHERE id = (SELECT key_id FROM issue_records WHERE id = ?1)",
            params![id_str],
          )?;
        }

        tx.commit()?;
        Ok(RawOutcome::Applied)
      })
      .await?;

    Ok(match outcome {
      RawOutcome::Applied => UpdateOutcome::Applied,
      RawOutcome::Mismatch(found) => UpdateOutcome::StatusMismatch {
        found: decode_status(&found)?,
      },
      RawOutcome::Missing => UpdateOutcome::Missing,
    })
  }
}

#[cfg(test)]
impl SqliteStore {
  pub(crate) fn conn_for_tests(&self) -> &tokio_rusqlite::Connection { &self.conn }
}
