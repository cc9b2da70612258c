//! In-memory store and notifier used by the unit tests in this crate.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  audit::{Actor, AuditAction, AuditEntry},
  notify::{Notifier, OverdueAlert},
  party::{Key, KeyStatus, NewKey, NewUser, User, UserRole},
  record::{IssueDetails, IssueRecord, IssueStatus, NewIssue, RecordUpdate},
  security::SecurityReport,
  store::{IssueStore, UpdateOutcome},
};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct FakeError(String);

type FetchHook = Box<dyn FnOnce(&mut Vec<IssueRecord>) + Send>;
type AlertHook = Box<dyn FnOnce() + Send>;

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
  users:        HashMap<Uuid, User>,
  keys:         HashMap<Uuid, Key>,
  records:      Vec<IssueRecord>,
  fail_updates: HashSet<Uuid>,
  fail_fetch:   bool,
  after_fetch:  Option<FetchHook>,
  update_calls: usize,
}

#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
}

impl MemoryStore {
  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> { self.inner.lock().unwrap() }

  pub async fn seed_user_and_key(&self) -> (User, Key) {
    let user = self
      .add_user(NewUser {
        name:    "Ada Lovelace".into(),
        role:    UserRole::Lecturer,
        user_id: "L-1815".into(),
        email:   Some("ada@example.edu".into()),
        phone:   None,
      })
      .await
      .unwrap();
    let key = self
      .add_key(NewKey { label: "B-204".into(), location: "Babbage Hall".into() })
      .await
      .unwrap();
    (user, key)
  }

  /// Insert a record directly in `status`, issued a week before `due_at`.
  pub async fn seed_record(&self, status: IssueStatus, due_at: DateTime<Utc>) -> Uuid {
    let (user, key) = self.seed_user_and_key().await;
    let issued_at = due_at - Duration::days(7);
    let record = IssueRecord {
      id: Uuid::new_v4(),
      user_id: user.id,
      key_id: key.id,
      admin_id: None,
      issued_at,
      due_at,
      returned_at: None,
      status,
      audit_trail: vec![AuditEntry::new(
        AuditAction::Issued,
        Actor::Admin(Uuid::nil()),
        issued_at,
        "Key issued to user",
      )],
      security_notes: None,
      is_locked: status == IssueStatus::Escalated,
      created_at: issued_at,
    };
    let id = record.id;
    let mut inner = self.lock();
    if let Some(key) = inner.keys.get_mut(&key.id) {
      key.status = KeyStatus::CheckedOut;
    }
    inner.records.push(record);
    id
  }

  pub fn record(&self, id: Uuid) -> IssueRecord {
    self.lock().records.iter().find(|r| r.id == id).cloned().unwrap()
  }

  pub fn fail_updates_for(&self, id: Uuid) { self.lock().fail_updates.insert(id); }

  pub fn fail_fetch(&self) { self.lock().fail_fetch = true; }

  /// Mutate the stored records right after the next candidate fetch has
  /// taken its snapshot, simulating a concurrent writer.
  pub fn after_fetch(&self, hook: impl FnOnce(&mut Vec<IssueRecord>) + Send + 'static) {
    self.lock().after_fetch = Some(Box::new(hook));
  }

  pub fn update_calls(&self) -> usize { self.lock().update_calls }

  fn details(inner: &Inner, record: &IssueRecord) -> IssueDetails {
    IssueDetails {
      record: record.clone(),
      user:   inner.users.get(&record.user_id).cloned(),
      key:    inner.keys.get(&record.key_id).cloned(),
    }
  }
}

impl IssueStore for MemoryStore {
  type Error = FakeError;

  async fn add_user(&self, input: NewUser) -> Result<User, FakeError> {
    let user = User {
      id:         Uuid::new_v4(),
      name:       input.name,
      role:       input.role,
      user_id:    input.user_id,
      email:      input.email,
      phone:      input.phone,
      created_at: Utc::now(),
    };
    self.lock().users.insert(user.id, user.clone());
    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>, FakeError> {
    Ok(self.lock().users.get(&id).cloned())
  }

  async fn add_key(&self, input: NewKey) -> Result<Key, FakeError> {
    let key = Key {
      id:         Uuid::new_v4(),
      label:      input.label,
      location:   input.location,
      status:     KeyStatus::Available,
      created_at: Utc::now(),
    };
    self.lock().keys.insert(key.id, key.clone());
    Ok(key)
  }

  async fn get_key(&self, id: Uuid) -> Result<Option<Key>, FakeError> {
    Ok(self.lock().keys.get(&id).cloned())
  }

  async fn list_keys(&self, status: Option<KeyStatus>) -> Result<Vec<Key>, FakeError> {
    Ok(
      self
        .lock()
        .keys
        .values()
        .filter(|k| status.is_none_or(|s| k.status == s))
        .cloned()
        .collect(),
    )
  }

  async fn create_issue(&self, input: NewIssue) -> Result<Option<IssueRecord>, FakeError> {
    let mut inner = self.lock();
    match inner.keys.get_mut(&input.key_id) {
      Some(key) if key.status == KeyStatus::Available => key.status = KeyStatus::CheckedOut,
      _ => return Ok(None),
    }
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
    inner.records.push(record.clone());
    Ok(Some(record))
  }

  async fn get_record(&self, id: Uuid) -> Result<Option<IssueDetails>, FakeError> {
    let inner = self.lock();
    Ok(inner.records.iter().find(|r| r.id == id).map(|r| Self::details(&inner, r)))
  }

  async fn list_records(&self, statuses: &[IssueStatus]) -> Result<Vec<IssueRecord>, FakeError> {
    Ok(
      self
        .lock()
        .records
        .iter()
        .filter(|r| statuses.is_empty() || statuses.contains(&r.status))
        .cloned()
        .collect(),
    )
  }

  async fn fetch_overdue_candidates(
    &self,
    statuses: &[IssueStatus],
  ) -> Result<Vec<IssueDetails>, FakeError> {
    let mut inner = self.lock();
    if inner.fail_fetch {
      return Err(FakeError("connection refused".into()));
    }
    let snapshot: Vec<IssueDetails> = inner
      .records
      .iter()
      .filter(|r| statuses.contains(&r.status))
      .map(|r| Self::details(&inner, r))
      .collect();
    if let Some(hook) = inner.after_fetch.take() {
      hook(&mut inner.records);
    }
    Ok(snapshot)
  }

  async fn update_record(
    &self,
    id: Uuid,
    expected: IssueStatus,
    update: RecordUpdate,
  ) -> Result<UpdateOutcome, FakeError> {
    let mut inner = self.lock();
    inner.update_calls += 1;
    if inner.fail_updates.contains(&id) {
      return Err(FakeError(format!("write to {id} rejected")));
    }
    let Some(record) = inner.records.iter_mut().find(|r| r.id == id) else {
      return Ok(UpdateOutcome::Missing);
    };
    if record.status != expected {
      return Ok(UpdateOutcome::StatusMismatch { found: record.status });
    }
    update.validate(expected).map_err(|e| FakeError(e.to_string()))?;
    update.apply_to(record);
    let key_id = record.key_id;
    if update.status == Some(IssueStatus::Closed)
      && let Some(key) = inner.keys.get_mut(&key_id)
    {
      key.status = KeyStatus::Available;
    }
    Ok(UpdateOutcome::Applied)
  }
}

// ─── Notifier ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
  alerts:            Mutex<Vec<OverdueAlert>>,
  security:          Mutex<Vec<SecurityReport>>,
  fail_alerts:       AtomicBool,
  fail_security:     AtomicBool,
  security_attempts: AtomicUsize,
  on_alert:          Mutex<Option<AlertHook>>,
}

impl RecordingNotifier {
  /// Run `hook` once, right after the next user alert is delivered.
  pub fn on_alert(&self, hook: impl FnOnce() + Send + 'static) {
    *self.on_alert.lock().unwrap() = Some(Box::new(hook));
  }

  pub fn fail_user_alerts(&self) { self.fail_alerts.store(true, Ordering::SeqCst); }

  pub fn fail_security_alerts(&self) { self.fail_security.store(true, Ordering::SeqCst); }

  /// Successfully delivered user alerts.
  pub fn alerts(&self) -> Vec<OverdueAlert> { self.alerts.lock().unwrap().clone() }

  /// Successfully delivered security reports.
  pub fn security_reports(&self) -> Vec<SecurityReport> { self.security.lock().unwrap().clone() }

  pub fn security_attempts(&self) -> usize { self.security_attempts.load(Ordering::SeqCst) }
}

impl Notifier for RecordingNotifier {
  type Error = FakeError;

  async fn send_overdue_alert(&self, alert: &OverdueAlert) -> Result<(), FakeError> {
    if self.fail_alerts.load(Ordering::SeqCst) {
      return Err(FakeError("mailbox unavailable".into()));
    }
    self.alerts.lock().unwrap().push(alert.clone());
    let hook = self.on_alert.lock().unwrap().take();
    if let Some(hook) = hook {
      hook();
    }
    Ok(())
  }

  async fn send_escalation_alert(&self, report: &SecurityReport) -> Result<(), FakeError> {
    self.security_attempts.fetch_add(1, Ordering::SeqCst);
    if self.fail_security.load(Ordering::SeqCst) {
      return Err(FakeError("security desk unreachable".into()));
    }
    self.security.lock().unwrap().push(report.clone());
    Ok(())
  }
}
