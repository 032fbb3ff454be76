//! Database store layer
//!
//! Implements the session store: transactional create/read/update/delete
//! plus the range queries the reporting layer depends on. Every mutating
//! operation is a single atomic statement; mutations against a missing id
//! return `Ok(None)` / `Ok(false)` rather than an error.

use crate::error::{Error, Result};
use crate::types::{Session, Subject};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

const PREF_LAST_SUBJECT: &str = "last_subject";

/// Serialize a timestamp for storage.
///
/// Fixed-width UTC RFC 3339 with millisecond precision, so lexicographic
/// comparison in SQL matches chronological order.
fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn ts_from_sql(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Database handle (single connection guarded by a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Foreign keys for subject-deletion cascade, WAL for concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // Subject operations
    // ============================================

    /// Seed the default subject on first run.
    ///
    /// A usable installation always has at least one subject; this is a
    /// no-op when any subject already exists.
    pub fn seed_defaults(&self, name: &str, session_duration_secs: u32) -> Result<()> {
        if !self.list_subjects()?.is_empty() {
            return Ok(());
        }

        let subject = self.create_subject(name, session_duration_secs)?;
        tracing::info!(subject_id = %subject.id, name, "Seeded default subject");
        Ok(())
    }

    /// Create a new subject
    pub fn create_subject(&self, name: &str, session_duration_secs: u32) -> Result<Subject> {
        let subject = Subject {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            session_duration_secs,
            created_at: Utc::now(),
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO subjects (id, name, session_duration_secs, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                subject.id,
                subject.name,
                subject.session_duration_secs,
                ts_to_sql(subject.created_at),
            ],
        )?;

        Ok(subject)
    }

    /// Rename a subject; returns the updated record, or `None` if missing
    pub fn rename_subject(&self, id: &str, name: &str) -> Result<Option<Subject>> {
        let changed = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE subjects SET name = ?2 WHERE id = ?1",
                params![id, name],
            )?
        };

        if changed == 0 {
            return Ok(None);
        }
        self.get_subject(id)
    }

    /// Update a subject's default countdown length
    pub fn set_subject_duration(&self, id: &str, secs: u32) -> Result<Option<Subject>> {
        let changed = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE subjects SET session_duration_secs = ?2 WHERE id = ?1",
                params![id, secs],
            )?
        };

        if changed == 0 {
            return Ok(None);
        }
        self.get_subject(id)
    }

    /// Delete a subject and (via cascade) all of its sessions.
    ///
    /// Refuses to delete the last remaining subject.
    pub fn delete_subject(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subjects WHERE id = ?",
            [id],
            |r| r.get(0),
        )?;
        if exists == 0 {
            return Ok(false);
        }

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM subjects", [], |r| r.get(0))?;
        if total <= 1 {
            return Err(Error::LastSubject(id.to_string()));
        }

        conn.execute("DELETE FROM subjects WHERE id = ?", [id])?;
        Ok(true)
    }

    /// Get a subject by ID
    pub fn get_subject(&self, id: &str) -> Result<Option<Subject>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM subjects WHERE id = ?", [id], Self::row_to_subject)
            .optional()
            .map_err(Error::from)
    }

    /// Get a subject by its (unique) name
    pub fn get_subject_by_name(&self, name: &str) -> Result<Option<Subject>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM subjects WHERE name = ?",
            [name],
            Self::row_to_subject,
        )
        .optional()
        .map_err(Error::from)
    }

    /// List all subjects in creation order
    pub fn list_subjects(&self) -> Result<Vec<Subject>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM subjects ORDER BY created_at, name")?;
        let subjects = stmt
            .query_map([], Self::row_to_subject)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subjects)
    }

    fn row_to_subject(row: &Row) -> rusqlite::Result<Subject> {
        let created_at_str: String = row.get("created_at")?;

        Ok(Subject {
            id: row.get("id")?,
            name: row.get("name")?,
            session_duration_secs: row.get("session_duration_secs")?,
            created_at: ts_from_sql(&created_at_str),
        })
    }

    // ============================================
    // Session operations
    // ============================================

    /// Create a new session with a full countdown
    pub fn create_session(
        &self,
        subject_id: Option<&str>,
        duration_secs: u32,
    ) -> Result<Session> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.map(|s| s.to_string()),
            start_time: Utc::now(),
            end_time: None,
            duration_secs,
            remaining_secs: duration_secs,
            completed: false,
            paused: false,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, subject_id, start_time, end_time,
                                   duration_secs, remaining_secs, completed, paused)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, 0, 0)",
            params![
                session.id,
                session.subject_id,
                ts_to_sql(session.start_time),
                session.duration_secs,
                session.remaining_secs,
            ],
        )?;

        Ok(session)
    }

    /// Pause an uncompleted session, snapshotting its remaining time
    pub fn pause_session(&self, id: &str, remaining_secs: u32) -> Result<Option<Session>> {
        let changed = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE sessions SET remaining_secs = ?2, paused = 1
                 WHERE id = ?1 AND completed = 0",
                params![id, remaining_secs],
            )?
        };

        if changed == 0 {
            return Ok(None);
        }
        self.get_session(id)
    }

    /// Resume a paused, uncompleted session
    pub fn resume_session(&self, id: &str) -> Result<Option<Session>> {
        let changed = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE sessions SET paused = 0 WHERE id = ?1 AND completed = 0",
                [id],
            )?
        };

        if changed == 0 {
            return Ok(None);
        }
        self.get_session(id)
    }

    /// Mark a session completed.
    ///
    /// Sets `end_time = now`, `remaining_secs = 0`, clears `paused`.
    /// Already-completed sessions are immutable and yield `None`.
    pub fn complete_session(&self, id: &str) -> Result<Option<Session>> {
        let changed = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE sessions
                 SET completed = 1, paused = 0, remaining_secs = 0, end_time = ?2
                 WHERE id = ?1 AND completed = 0",
                params![id, ts_to_sql(Utc::now())],
            )?
        };

        if changed == 0 {
            return Ok(None);
        }
        self.get_session(id)
    }

    /// Delete a session record
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    /// Get a session by ID
    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM sessions WHERE id = ?", [id], Self::row_to_session)
            .optional()
            .map_err(Error::from)
    }

    /// Most recent uncompleted session for a subject, if any
    pub fn get_active_session_for_subject(&self, subject_id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM sessions
             WHERE subject_id = ?1 AND completed = 0
             ORDER BY start_time DESC LIMIT 1",
            [subject_id],
            Self::row_to_session,
        )
        .optional()
        .map_err(Error::from)
    }

    /// All sessions whose start time falls in `[start, end]`, ascending
    pub fn get_sessions_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions
             WHERE start_time >= ?1 AND start_time <= ?2
             ORDER BY start_time",
        )?;
        let sessions = stmt
            .query_map(params![ts_to_sql(start), ts_to_sql(end)], Self::row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    /// Completed sessions whose start time falls in `[start, end]`, ascending
    pub fn get_completed_sessions_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions
             WHERE start_time >= ?1 AND start_time <= ?2 AND completed = 1
             ORDER BY start_time",
        )?;
        let sessions = stmt
            .query_map(params![ts_to_sql(start), ts_to_sql(end)], Self::row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    /// All sessions belonging to a subject, ascending by start time
    pub fn get_sessions_by_subject(&self, subject_id: &str) -> Result<Vec<Session>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions WHERE subject_id = ?1 ORDER BY start_time",
        )?;
        let sessions = stmt
            .query_map([subject_id], Self::row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
        let start_time_str: String = row.get("start_time")?;
        let end_time_str: Option<String> = row.get("end_time")?;
        let completed: i64 = row.get("completed")?;
        let paused: i64 = row.get("paused")?;

        Ok(Session {
            id: row.get("id")?,
            subject_id: row.get("subject_id")?,
            start_time: ts_from_sql(&start_time_str),
            end_time: end_time_str.map(|s| ts_from_sql(&s)),
            duration_secs: row.get("duration_secs")?,
            remaining_secs: row.get("remaining_secs")?,
            completed: completed != 0,
            paused: paused != 0,
        })
    }

    /// Move a session's start time (test support for history fixtures)
    #[cfg(test)]
    pub(crate) fn set_session_start_time(&self, id: &str, start: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET start_time = ?2 WHERE id = ?1",
            params![id, ts_to_sql(start)],
        )?;
        Ok(())
    }

    // ============================================
    // Preferences
    // ============================================

    /// Upsert (or clear, on `None`) a preference value
    pub fn set_preference(&self, key: &str, value: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        match value {
            Some(value) => {
                conn.execute(
                    "INSERT INTO preferences (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
            }
            None => {
                conn.execute("DELETE FROM preferences WHERE key = ?", [key])?;
            }
        }
        Ok(())
    }

    pub fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT value FROM preferences WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    /// Persist (or clear) the last-selected subject
    pub fn set_last_subject(&self, subject_id: Option<&str>) -> Result<()> {
        self.set_preference(PREF_LAST_SUBJECT, subject_id)
    }

    /// The last-selected subject id, if one was stored
    pub fn last_subject(&self) -> Result<Option<String>> {
        self.get_preference(PREF_LAST_SUBJECT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_subject_crud() {
        let db = test_db();

        let math = db.create_subject("Math", 1500).unwrap();
        let bio = db.create_subject("Biology", 1800).unwrap();

        assert_eq!(db.list_subjects().unwrap().len(), 2);
        assert_eq!(
            db.get_subject(&math.id).unwrap().unwrap().name,
            "Math"
        );
        assert_eq!(
            db.get_subject_by_name("Biology").unwrap().unwrap().id,
            bio.id
        );

        let renamed = db.rename_subject(&math.id, "Maths").unwrap().unwrap();
        assert_eq!(renamed.name, "Maths");

        let updated = db.set_subject_duration(&math.id, 3000).unwrap().unwrap();
        assert_eq!(updated.session_duration_secs, 3000);

        assert!(db.rename_subject("missing", "x").unwrap().is_none());
        assert!(db.set_subject_duration("missing", 60).unwrap().is_none());
    }

    #[test]
    fn test_seed_defaults_runs_once() {
        let db = test_db();
        db.seed_defaults("General", 1500).unwrap();
        db.seed_defaults("General", 1500).unwrap();

        let subjects = db.list_subjects().unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].name, "General");
        assert_eq!(subjects[0].session_duration_secs, 1500);
    }

    #[test]
    fn test_last_subject_cannot_be_deleted() {
        let db = test_db();
        let only = db.create_subject("General", 1500).unwrap();

        let err = db.delete_subject(&only.id).unwrap_err();
        assert!(matches!(err, Error::LastSubject(_)));

        // A second subject makes deletion legal again
        db.create_subject("Math", 1500).unwrap();
        assert!(db.delete_subject(&only.id).unwrap());
        assert!(!db.delete_subject("missing").unwrap());
    }

    #[test]
    fn test_subject_delete_cascades_to_sessions() {
        let db = test_db();
        db.create_subject("Keep", 1500).unwrap();
        let gone = db.create_subject("Gone", 1500).unwrap();

        let session = db.create_session(Some(&gone.id), 1500).unwrap();
        assert!(db.delete_subject(&gone.id).unwrap());
        assert!(db.get_session(&session.id).unwrap().is_none());
    }

    #[test]
    fn test_session_round_trip() {
        let db = test_db();
        let subject = db.create_subject("Math", 1500).unwrap();

        let session = db.create_session(Some(&subject.id), 1500).unwrap();
        assert_eq!(session.remaining_secs, 1500);
        assert!(!session.completed);
        assert!(!session.paused);

        let paused = db.pause_session(&session.id, 900).unwrap().unwrap();
        assert_eq!(paused.remaining_secs, 900);
        assert!(paused.paused);

        let resumed = db.resume_session(&session.id).unwrap().unwrap();
        assert!(!resumed.paused);
        assert_eq!(resumed.remaining_secs, 900);

        let done = db.complete_session(&session.id).unwrap().unwrap();
        assert_eq!(done.duration_secs, 1500);
        assert_eq!(done.remaining_secs, 0);
        assert!(done.completed);
        assert!(!done.paused);
        assert!(done.end_time.is_some());
    }

    #[test]
    fn test_mutations_on_missing_id_are_noops() {
        let db = test_db();

        assert!(db.pause_session("missing", 10).unwrap().is_none());
        assert!(db.resume_session("missing").unwrap().is_none());
        assert!(db.complete_session("missing").unwrap().is_none());
        assert!(!db.delete_session("missing").unwrap());
    }

    #[test]
    fn test_completed_sessions_are_immutable() {
        let db = test_db();
        let session = db.create_session(None, 60).unwrap();
        db.complete_session(&session.id).unwrap().unwrap();

        assert!(db.pause_session(&session.id, 30).unwrap().is_none());
        assert!(db.resume_session(&session.id).unwrap().is_none());
        assert!(db.complete_session(&session.id).unwrap().is_none());
    }

    #[test]
    fn test_active_session_lookup_picks_most_recent() {
        let db = test_db();
        let subject = db.create_subject("Math", 1500).unwrap();

        let first = db.create_session(Some(&subject.id), 1500).unwrap();
        // Push the second session later than the first
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "UPDATE sessions SET start_time = ?2 WHERE id = ?1",
                params![first.id, ts_to_sql(Utc::now() - chrono::Duration::hours(1))],
            )
            .unwrap();
        }
        let second = db.create_session(Some(&subject.id), 1500).unwrap();

        let active = db
            .get_active_session_for_subject(&subject.id)
            .unwrap()
            .unwrap();
        assert_eq!(active.id, second.id);

        // Completed sessions no longer count as active
        db.complete_session(&second.id).unwrap();
        let active = db
            .get_active_session_for_subject(&subject.id)
            .unwrap()
            .unwrap();
        assert_eq!(active.id, first.id);
    }

    #[test]
    fn test_date_range_query_filters_by_start_time() {
        let db = test_db();
        let session = db.create_session(None, 600).unwrap();

        let now = Utc::now();
        let in_range = db
            .get_sessions_by_date_range(now - chrono::Duration::hours(1), now)
            .unwrap();
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].id, session.id);

        let out_of_range = db
            .get_sessions_by_date_range(
                now - chrono::Duration::days(2),
                now - chrono::Duration::days(1),
            )
            .unwrap();
        assert!(out_of_range.is_empty());

        // Raw query includes uncompleted sessions, completed-only does not
        let completed_only = db
            .get_completed_sessions_by_date_range(now - chrono::Duration::hours(1), now)
            .unwrap();
        assert!(completed_only.is_empty());
    }

    #[test]
    fn test_last_subject_preference() {
        let db = test_db();
        assert!(db.last_subject().unwrap().is_none());

        db.set_last_subject(Some("subj-1")).unwrap();
        assert_eq!(db.last_subject().unwrap().as_deref(), Some("subj-1"));

        db.set_last_subject(Some("subj-2")).unwrap();
        assert_eq!(db.last_subject().unwrap().as_deref(), Some("subj-2"));

        db.set_last_subject(None).unwrap();
        assert!(db.last_subject().unwrap().is_none());
    }
}
