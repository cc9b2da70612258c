//! SQL schema for the Keyward SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for later migrations.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    role        TEXT NOT NULL CHECK (role IN ('student', 'lecturer', 'cleaner')),
    user_id     TEXT NOT NULL,   -- institution-issued identifier
    email       TEXT,
    phone       TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS keys (
    id          TEXT PRIMARY KEY,
    label       TEXT NOT NULL,
    location    TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'available'
                CHECK (status IN ('available', 'checked_out')),
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS issue_records (
    id              TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL REFERENCES users(id),
    key_id          TEXT NOT NULL REFERENCES keys(id),
    admin_id        TEXT,
    issued_at       TEXT NOT NULL,
    due_at          TEXT NOT NULL,
    returned_at     TEXT,
    status          TEXT NOT NULL
                    CHECK (status IN ('active', 'overdue', 'escalated', 'closed')),
    security_notes  TEXT,
    is_locked       INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

-- Audit entries are strictly append-only; the triggers below reject
-- any UPDATE or DELETE.
CREATE TABLE IF NOT EXISTS audit_entries (
    record_id   TEXT NOT NULL REFERENCES issue_records(id),
    seq         INTEGER NOT NULL,
    entry_json  TEXT NOT NULL,
    PRIMARY KEY (record_id, seq)
);

CREATE TRIGGER IF NOT EXISTS audit_entries_no_update
BEFORE UPDATE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit entries are append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_entries_no_delete
BEFORE DELETE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit entries are append-only');
END;

CREATE INDEX IF NOT EXISTS issue_records_status_idx ON issue_records(status);
CREATE INDEX IF NOT EXISTS issue_records_key_idx    ON issue_records(key_id);

PRAGMA user_version = 1;
";
