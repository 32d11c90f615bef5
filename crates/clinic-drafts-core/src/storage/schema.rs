//! SQLite schema definition.

/// Schema for the SQLite-backed draft store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Draft Records (one row per storage key, overwritten on every auto-save)
-- ============================================================================

CREATE TABLE IF NOT EXISTS draft_records (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,                         -- JSON object incl. _lastSaved
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_draft_records_updated ON draft_records(updated_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_value_required() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute("INSERT INTO draft_records (key) VALUES ('abc')", []);
        assert!(result.is_err());
    }
}
