//! SQLite schema definition.

/// Complete database schema for health records.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Key/Value Store (local cache payloads)
-- ============================================================================

CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Records (relational store, one row per record, autoincrement id)
-- ============================================================================

CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    age INTEGER NOT NULL CHECK (age >= 0),
    date TEXT NOT NULL,
    disease TEXT NOT NULL,
    hospital TEXT NOT NULL,
    doctor TEXT NOT NULL,
    file TEXT DEFAULT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_records_user ON records(user_id);
"#;
