//! SQL schema for the Signet SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Document versions are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
-- The composite primary key makes duplicate versions impossible; the
-- INSERT ... SELECT guard in store.rs keeps version numbers gap-free.
CREATE TABLE IF NOT EXISTS documents (
    document_id   TEXT NOT NULL,
    version       INTEGER NOT NULL,
    owner         TEXT NOT NULL,
    status        TEXT NOT NULL,      -- snake_case DocumentStatus
    is_rollback   INTEGER NOT NULL DEFAULT 0,
    snapshot_json TEXT NOT NULL,      -- full DocumentSnapshot as JSON
    created_at    TEXT NOT NULL,      -- ISO 8601 UTC
    updated_at    TEXT NOT NULL,
    PRIMARY KEY (document_id, version)
);

-- One row per coordinator action against the ledger. Rows outlive failed
-- registrations and are never deleted.
CREATE TABLE IF NOT EXISTS registration_attempts (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id    TEXT NOT NULL,
    attempt_number INTEGER NOT NULL,
    action         TEXT NOT NULL,     -- 'attempt' | 'success' | 'failure' | 'cancelled'
    recorded_at    TEXT NOT NULL,
    hash           TEXT,
    network        TEXT,
    error          TEXT
);

-- One row per workflow message the consumer handled, success or failure.
-- Append-only, like registration_attempts.
CREATE TABLE IF NOT EXISTS workflow_audit (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id TEXT,
    action      TEXT NOT NULL,      -- snake_case WorkflowAction
    outcome     TEXT NOT NULL,      -- 'success' | 'failure'
    detail      TEXT,
    recorded_at TEXT NOT NULL
);

-- Ephemeral signing-URL tokens. Unlike the tables above these rows are
-- deleted on revocation.
CREATE TABLE IF NOT EXISTS signer_links (
    token          TEXT PRIMARY KEY,
    document_id    TEXT NOT NULL,
    participant_id TEXT NOT NULL,
    expires_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS documents_owner_idx ON documents(owner);
CREATE INDEX IF NOT EXISTS attempts_doc_idx    ON registration_attempts(document_id);
CREATE INDEX IF NOT EXISTS workflow_doc_idx    ON workflow_audit(document_id);
CREATE INDEX IF NOT EXISTS links_doc_idx       ON signer_links(document_id);

PRAGMA user_version = 1;
";
