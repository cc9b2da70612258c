//! Manual actions an administrator takes on issue records.
//!
//! Each action reads the record, checks the lifecycle rules, and writes
//! through [`IssueStore::update_record`] with the status it read, so an
//! action racing the processor (or another admin) fails with
//! [`Error::StatusConflict`] instead of overwriting.
//!
//! [`notify_security`] is the exception: it writes nothing and only resends
//! the security report for an escalated record.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  audit::{Actor, AuditAction, AuditEntry, EscalationReason},
  lifecycle,
  notify::Notifier,
  party::KeyStatus,
  record::{IssueRecord, IssueStatus, NewIssue, RecordUpdate},
  security::SecurityReport,
  store::{IssueStore, UpdateOutcome},
  Error, Result,
};

/// Request to lend a key to a user.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRequest {
  pub user_id:  Uuid,
  pub key_id:   Uuid,
  pub admin_id: Uuid,
  pub due_at:   DateTime<Utc>,
  #[serde(default)]
  pub notes:    Option<String>,
}

/// Lend a key. The record starts `active` with a single `issued` entry.
pub async fn issue_key<S: IssueStore>(
  store: &S,
  request: IssueRequest,
  now: DateTime<Utc>,
) -> Result<IssueRecord> {
  if request.due_at <= now {
    return Err(Error::InvalidDueDate);
  }

  store
    .get_user(request.user_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::UserNotFound(request.user_id))?;

  let key = store
    .get_key(request.key_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::KeyNotFound(request.key_id))?;
  if key.status != KeyStatus::Available {
    return Err(Error::KeyUnavailable(key.id));
  }

  let entry = AuditEntry::new(
    AuditAction::Issued,
    Actor::Admin(request.admin_id),
    now,
    request.notes.unwrap_or_else(|| "Key issued to user".to_owned()),
  );
  let input = NewIssue {
    user_id: request.user_id,
    key_id: request.key_id,
    admin_id: request.admin_id,
    issued_at: now,
    due_at: request.due_at,
    entry,
  };

  store
    .create_issue(input)
    .await
    .map_err(Error::store)?
    .ok_or(Error::KeyUnavailable(request.key_id))
}

/// Close a record because the key came back. Allowed from every non-closed
/// status, including while the record is locked.
pub async fn return_key<S: IssueStore>(
  store: &S,
  id: Uuid,
  admin_id: Uuid,
  notes: Option<String>,
  now: DateTime<Utc>,
) -> Result<IssueRecord> {
  let record = load(store, id).await?;
  if record.status == IssueStatus::Closed {
    return Err(Error::AlreadyClosed(id));
  }

  let notes = notes.unwrap_or_else(|| "Key returned".to_owned());
  let previous_status = record.status;
  let mut update = RecordUpdate::append(AuditEntry::new(
    AuditAction::Returned { previous_status },
    Actor::Admin(admin_id),
    now,
    notes.clone(),
  ))
  .with_status(IssueStatus::Closed)
  .returned(now);

  if matches!(previous_status, IssueStatus::Overdue | IssueStatus::Escalated) {
    update = update
      .with_security_notes(format!("{notes} - Returned after {previous_status} alert"));
  }

  apply(store, id, previous_status, update).await
}

/// Escalate a record to security ahead of the automatic threshold.
pub async fn escalate<S: IssueStore>(
  store: &S,
  id: Uuid,
  admin_id: Uuid,
  notes: Option<String>,
  now: DateTime<Utc>,
) -> Result<IssueRecord> {
  let record = load(store, id).await?;
  match record.status {
    IssueStatus::Closed => return Err(Error::AlreadyClosed(id)),
    IssueStatus::Escalated => return Err(Error::AlreadyEscalated(id)),
    IssueStatus::Active | IssueStatus::Overdue => {}
  }

  let days_overdue = lifecycle::days_overdue(record.due_at, now).max(0);
  let mut update = RecordUpdate::append(AuditEntry::new(
    AuditAction::Escalated {
      reason: EscalationReason::ManualEscalation,
      days_overdue,
    },
    Actor::Admin(admin_id),
    now,
    notes
      .clone()
      .unwrap_or_else(|| "Record escalated due to overdue status".to_owned()),
  ))
  .with_status(IssueStatus::Escalated)
  .locked();

  if let Some(notes) = notes {
    update = update.with_security_notes(notes);
  }

  apply(store, id, record.status, update).await
}

/// Replace the security notes. Only possible once a record has been
/// escalated; this is the one edit a locked record accepts.
pub async fn update_security_notes<S: IssueStore>(
  store: &S,
  id: Uuid,
  admin_id: Uuid,
  notes: String,
  now: DateTime<Utc>,
) -> Result<IssueRecord> {
  let record = load(store, id).await?;
  if !record.is_locked {
    return Err(Error::NotEscalated(id));
  }

  let update = RecordUpdate::append(AuditEntry::new(
    AuditAction::SecurityNotesUpdated,
    Actor::Admin(admin_id),
    now,
    "Security notes updated",
  ))
  .with_security_notes(notes);

  apply(store, id, record.status, update).await
}

/// Send the security division a report for an escalated or locked record.
///
/// Covers manual escalations, which the processor never reports, and
/// automatic ones whose alert was not delivered. Returns the report sent.
pub async fn notify_security<S, N>(
  store: &S,
  notifier: &N,
  id: Uuid,
  now: DateTime<Utc>,
) -> Result<SecurityReport>
where
  S: IssueStore,
  N: Notifier,
{
  let details = store
    .get_record(id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::RecordNotFound(id))?;
  let record = &details.record;
  if record.status != IssueStatus::Escalated && !record.is_locked {
    return Err(Error::NotEscalated(id));
  }

  let days_overdue = lifecycle::days_overdue(record.due_at, now).max(0);
  let escalated_at = record.escalated_at().unwrap_or(now);
  let report = SecurityReport::new(&details, days_overdue, escalated_at);
  notifier
    .send_escalation_alert(&report)
    .await
    .map_err(|e| Error::Notification(e.to_string()))?;
  Ok(report)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn load<S: IssueStore>(store: &S, id: Uuid) -> Result<IssueRecord> {
  store
    .get_record(id)
    .await
    .map_err(Error::store)?
    .map(|details| details.record)
    .ok_or(Error::RecordNotFound(id))
}

async fn apply<S: IssueStore>(
  store: &S,
  id: Uuid,
  expected: IssueStatus,
  update: RecordUpdate,
) -> Result<IssueRecord> {
  update.validate(expected)?;
  match store
    .update_record(id, expected, update)
    .await
    .map_err(Error::store)?
  {
    UpdateOutcome::Applied => load(store, id).await,
    UpdateOutcome::StatusMismatch { found } => {
      Err(Error::StatusConflict { id, expected, found })
    }
    UpdateOutcome::Missing => Err(Error::RecordNotFound(id)),
  }
}
