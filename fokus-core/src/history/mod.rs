//! History aggregation
//!
//! Pure, deterministic aggregation over immutable snapshots of sessions
//! and subjects, plus [`HistoryService`] which pairs those functions with
//! store reads. Reporting only ever reads the store; a concurrent timer
//! mutating sessions between two calls is tolerated by design.
//!
//! The core metric is **studied minutes**:
//! `round((duration - remaining) / 60)` per session.

pub mod streak;

pub use streak::study_streak;

use crate::db::Database;
use crate::error::Result;
use crate::types::{Session, Subject};
use chrono::{DateTime, Duration, Local, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Per-subject slice of a single day's activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDayStats {
    pub minutes: u32,
    pub sessions_count: u32,
    pub subject_name: String,
}

/// One local calendar day's study activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyStats {
    /// ISO date ("YYYY-MM-DD") in local time
    pub date: String,
    pub total_minutes: u32,
    pub sessions_count: u32,
    /// Per-subject breakdown, keyed by subject id; only sessions that
    /// carry a subject id contribute here
    pub subjects: BTreeMap<String, SubjectDayStats>,
}

/// Aggregate statistics for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectStats {
    pub subject_id: String,
    pub subject_name: String,
    pub total_minutes: u32,
    pub total_sessions: u32,
    pub average_session_length: f64,
    pub daily_stats: Vec<DailyStats>,
}

/// Aggregate statistics across all subjects for a window.
#[derive(Debug, Clone, PartialEq)]
pub struct OverallStats {
    pub total_minutes: u32,
    pub total_sessions: u32,
    pub average_session_length: f64,
    /// Total minutes divided by the number of days with any activity
    pub average_daily_minutes: f64,
    /// Date string of the busiest day, "None" when the window is empty
    pub most_active_day: String,
    /// Name of the busiest subject, "None" when no subject has activity
    pub most_active_subject: String,
    pub study_streak: u32,
    pub daily_stats: Vec<DailyStats>,
    pub subject_stats: Vec<SubjectStats>,
}

/// One entry of the zero-filled calendar view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: String,
    pub minutes: u32,
    pub sessions: u32,
    pub subjects: BTreeMap<String, SubjectDayStats>,
}

/// Parallel label/value arrays for the subject comparison chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonData {
    pub labels: Vec<String>,
    pub data: Vec<u32>,
}

/// Local-time ISO date key for a session's start.
fn local_date_key(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).date_naive().to_string()
}

/// Bucket sessions by the local calendar date of their start time.
///
/// Result is sorted ascending by date string. Days with no sessions are
/// absent; see [`HistoryService::calendar_data`] for the zero-filled view.
pub fn aggregate_daily_stats(sessions: &[Session], subjects: &[Subject]) -> Vec<DailyStats> {
    let by_id: HashMap<&str, &Subject> =
        subjects.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut days: BTreeMap<String, DailyStats> = BTreeMap::new();

    for session in sessions {
        let date = local_date_key(session.start_time);
        let minutes = session.studied_minutes();

        let day = days.entry(date.clone()).or_insert_with(|| DailyStats {
            date,
            total_minutes: 0,
            sessions_count: 0,
            subjects: BTreeMap::new(),
        });
        day.total_minutes += minutes;
        day.sessions_count += 1;

        let Some(subject) = session
            .subject_id
            .as_deref()
            .and_then(|id| by_id.get(id))
        else {
            continue;
        };

        let entry = day
            .subjects
            .entry(subject.id.clone())
            .or_insert_with(|| SubjectDayStats {
                minutes: 0,
                sessions_count: 0,
                subject_name: subject.name.clone(),
            });
        entry.minutes += minutes;
        entry.sessions_count += 1;
    }

    days.into_values().collect()
}

/// Aggregate per-subject totals with a nested daily breakdown.
///
/// Subjects with no matching sessions are omitted; the result is sorted
/// descending by total minutes.
pub fn aggregate_subject_stats(sessions: &[Session], subjects: &[Subject]) -> Vec<SubjectStats> {
    let mut stats: Vec<SubjectStats> = Vec::new();

    for subject in subjects {
        let own: Vec<Session> = sessions
            .iter()
            .filter(|s| s.subject_id.as_deref() == Some(subject.id.as_str()))
            .cloned()
            .collect();

        if own.is_empty() {
            continue;
        }

        let total_minutes: u32 = own.iter().map(|s| s.studied_minutes()).sum();
        let total_sessions = own.len() as u32;
        let average_session_length = f64::from(total_minutes) / f64::from(total_sessions);

        stats.push(SubjectStats {
            subject_id: subject.id.clone(),
            subject_name: subject.name.clone(),
            total_minutes,
            total_sessions,
            average_session_length,
            daily_stats: aggregate_daily_stats(&own, std::slice::from_ref(subject)),
        });
    }

    stats.sort_by(|a, b| b.total_minutes.cmp(&a.total_minutes));
    stats
}

/// Reporting facade over the store.
pub struct HistoryService {
    db: Arc<Database>,
}

impl HistoryService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn window(days_back: u32) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = Utc::now();
        (end - Duration::days(i64::from(days_back)), end)
    }

    /// Overall statistics for the last `days_back` days.
    ///
    /// Counts completed sessions only.
    pub fn overall_stats(&self, days_back: u32) -> Result<OverallStats> {
        let (start, end) = Self::window(days_back);
        let sessions = self.db.get_completed_sessions_by_date_range(start, end)?;
        let subjects = self.db.list_subjects()?;

        let daily_stats = aggregate_daily_stats(&sessions, &subjects);
        let subject_stats = aggregate_subject_stats(&sessions, &subjects);

        let total_minutes: u32 = sessions.iter().map(|s| s.studied_minutes()).sum();
        let total_sessions = sessions.len() as u32;
        let average_session_length = if total_sessions > 0 {
            f64::from(total_minutes) / f64::from(total_sessions)
        } else {
            0.0
        };
        let average_daily_minutes = if daily_stats.is_empty() {
            0.0
        } else {
            f64::from(total_minutes) / daily_stats.len() as f64
        };

        // Walk keeps the first maximum, so ties resolve to the earliest
        // date and to store order for subjects
        let most_active_day = daily_stats
            .iter()
            .fold(None::<&DailyStats>, |best, day| match best {
                Some(b) if b.total_minutes >= day.total_minutes => Some(b),
                _ => Some(day),
            })
            .map(|d| d.date.clone())
            .unwrap_or_else(|| "None".to_string());
        // subject_stats is stably sorted descending, so the head is the
        // first-in-store-order maximum
        let most_active_subject = subject_stats
            .first()
            .map(|s| s.subject_name.clone())
            .unwrap_or_else(|| "None".to_string());

        Ok(OverallStats {
            total_minutes,
            total_sessions,
            average_session_length,
            average_daily_minutes,
            most_active_day,
            most_active_subject,
            study_streak: study_streak(&self.db)?,
            daily_stats,
            subject_stats,
        })
    }

    /// Statistics for one subject over the last `days_back` days.
    ///
    /// Returns `None` when the subject does not exist or has no completed
    /// sessions in the window.
    pub fn subject_stats(&self, subject_id: &str, days_back: u32) -> Result<Option<SubjectStats>> {
        let Some(subject) = self.db.get_subject(subject_id)? else {
            return Ok(None);
        };

        let (start, end) = Self::window(days_back);
        let sessions: Vec<Session> = self
            .db
            .get_sessions_by_subject(subject_id)?
            .into_iter()
            .filter(|s| s.completed && s.start_time >= start && s.start_time <= end)
            .collect();

        let stats = aggregate_subject_stats(&sessions, std::slice::from_ref(&subject));
        Ok(stats.into_iter().next())
    }

    /// Label/value pairs for the subject comparison chart.
    ///
    /// One entry per subject with nonzero studied minutes in the window,
    /// in store order; zero-minute subjects are excluded entirely.
    pub fn subject_comparison(&self, days_back: u32) -> Result<ComparisonData> {
        let (start, end) = Self::window(days_back);
        let sessions = self.db.get_completed_sessions_by_date_range(start, end)?;
        let subjects = self.db.list_subjects()?;

        let mut labels = Vec::new();
        let mut data = Vec::new();

        for subject in &subjects {
            let minutes: u32 = sessions
                .iter()
                .filter(|s| s.subject_id.as_deref() == Some(subject.id.as_str()))
                .map(|s| s.studied_minutes())
                .sum();

            if minutes > 0 {
                labels.push(subject.name.clone());
                data.push(minutes);
            }
        }

        Ok(ComparisonData { labels, data })
    }

    /// Zero-filled calendar view: exactly `days_back + 1` entries, one per
    /// local calendar day from `today - days_back` through today.
    ///
    /// Deliberately built from the *raw* date-range query, so partial
    /// progress from uncompleted sessions counts toward calendar minutes.
    pub fn calendar_data(&self, days_back: u32) -> Result<Vec<CalendarDay>> {
        let today = Local::now().date_naive();
        let first_day = today - Duration::days(i64::from(days_back));

        let (start, _) = streak::local_day_range(first_day);
        let (_, end) = streak::local_day_range(today);
        let sessions = self.db.get_sessions_by_date_range(start, end)?;
        let subjects = self.db.list_subjects()?;
        let by_id: HashMap<&str, &Subject> =
            subjects.iter().map(|s| (s.id.as_str(), s)).collect();

        let mut days: BTreeMap<String, CalendarDay> = BTreeMap::new();
        for offset in 0..=days_back {
            let date = (first_day + Duration::days(i64::from(offset))).to_string();
            days.insert(
                date.clone(),
                CalendarDay {
                    date,
                    minutes: 0,
                    sessions: 0,
                    subjects: BTreeMap::new(),
                },
            );
        }

        for session in &sessions {
            let date = local_date_key(session.start_time);
            let Some(day) = days.get_mut(&date) else {
                continue;
            };

            let minutes = session.studied_minutes();
            day.minutes += minutes;
            day.sessions += 1;

            if let Some(subject) = session
                .subject_id
                .as_deref()
                .and_then(|id| by_id.get(id))
            {
                let entry = day
                    .subjects
                    .entry(subject.id.clone())
                    .or_insert_with(|| SubjectDayStats {
                        minutes: 0,
                        sessions_count: 0,
                        subject_name: subject.name.clone(),
                    });
                entry.minutes += minutes;
                entry.sessions_count += 1;
            }
        }

        Ok(days.into_values().collect())
    }
}
