//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS subjects (
        id                    TEXT PRIMARY KEY,
        name                  TEXT NOT NULL UNIQUE,
        session_duration_secs INTEGER NOT NULL CHECK (session_duration_secs > 0),
        created_at            DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id             TEXT PRIMARY KEY,
        subject_id     TEXT REFERENCES subjects(id) ON DELETE CASCADE,
        start_time     DATETIME NOT NULL,
        end_time       DATETIME,
        duration_secs  INTEGER NOT NULL CHECK (duration_secs > 0),
        remaining_secs INTEGER NOT NULL,
        completed      INTEGER NOT NULL DEFAULT 0,
        paused         INTEGER NOT NULL DEFAULT 0,

        CHECK (remaining_secs >= 0 AND remaining_secs <= duration_secs)
    );

    -- Last-selected-subject and similar single-row settings
    CREATE TABLE IF NOT EXISTS preferences (
        key   TEXT PRIMARY KEY,
        value TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time);
    -- Active-session lookup is always per subject with completed = 0
    CREATE INDEX IF NOT EXISTS idx_sessions_active
        ON sessions(subject_id, start_time DESC) WHERE completed = 0;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["subjects", "sessions", "preferences"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_remaining_bounds_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO sessions (id, start_time, duration_secs, remaining_secs)
             VALUES ('s-1', '2026-01-01T00:00:00.000Z', 60, 120)",
            [],
        );
        assert!(result.is_err(), "remaining_secs > duration_secs must be rejected");
    }
}
