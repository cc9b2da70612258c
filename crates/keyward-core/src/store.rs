//! The `IssueStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `keyward-store-sqlite`).
//! The processor, the manual actions and the HTTP layers depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  party::{Key, KeyStatus, NewKey, NewUser, User},
  record::{IssueDetails, IssueRecord, IssueStatus, NewIssue, RecordUpdate},
};

/// Result of a compare-and-set write against an issue record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
  /// The status matched and the whole update was written.
  Applied,
  /// The record's status changed since it was read; nothing was written.
  StatusMismatch { found: IssueStatus },
  /// No record with that id.
  Missing,
}

/// Abstraction over an issue-record store backend.
///
/// Audit trails are append-only: backends must never rewrite or drop
/// existing entries.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait IssueStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users and keys ────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Register a key; it starts out available.
  fn add_key(
    &self,
    input: NewKey,
  ) -> impl Future<Output = Result<Key, Self::Error>> + Send + '_;

  fn get_key(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Key>, Self::Error>> + Send + '_;

  /// List keys, optionally filtered by status.
  fn list_keys(
    &self,
    status: Option<KeyStatus>,
  ) -> impl Future<Output = Result<Vec<Key>, Self::Error>> + Send + '_;

  // ── Issue records ─────────────────────────────────────────────────────

  /// Insert a new `active` record with its initial audit entry and check
  /// the key out, atomically.
  ///
  /// Returns `None` if the key was not available at write time.
  fn create_issue(
    &self,
    input: NewIssue,
  ) -> impl Future<Output = Result<Option<IssueRecord>, Self::Error>> + Send + '_;

  /// Fetch one record joined with its user and key.
  fn get_record(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<IssueDetails>, Self::Error>> + Send + '_;

  /// List records whose status is in `statuses`; all records when empty.
  fn list_records<'a>(
    &'a self,
    statuses: &'a [IssueStatus],
  ) -> impl Future<Output = Result<Vec<IssueRecord>, Self::Error>> + Send + 'a;

  /// The processor's input: every record in one of `statuses`, joined with
  /// user and key display fields.
  fn fetch_overdue_candidates<'a>(
    &'a self,
    statuses: &'a [IssueStatus],
  ) -> impl Future<Output = Result<Vec<IssueDetails>, Self::Error>> + Send + 'a;

  /// Apply `update` only if the record's status is still `expected`.
  ///
  /// The status check, field writes and audit append happen in one
  /// transaction. When the update closes the record, the key is released in
  /// the same transaction.
  fn update_record(
    &self,
    id: Uuid,
    expected: IssueStatus,
    update: RecordUpdate,
  ) -> impl Future<Output = Result<UpdateOutcome, Self::Error>> + Send + '_;
}
