//! Study streak calculation
//!
//! The streak is the number of consecutive local calendar days, ending
//! today, that each contain at least one session. A day with no session
//! ends the walk immediately, so a quiet today means a streak of zero no
//! matter what happened before.

use crate::db::Database;
use crate::error::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// UTC bounds of a local calendar day: `[00:00:00.000, 23:59:59.999]`.
pub(crate) fn local_day_range(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_naive = day.and_time(NaiveTime::MIN);
    let end_naive = day
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| day.and_time(NaiveTime::MIN));

    // DST transitions can make a local wall-clock time ambiguous or absent;
    // fall back to interpreting the naive time as UTC in that case.
    let start = Local
        .from_local_datetime(&start_naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&start_naive));
    let end = Local
        .from_local_datetime(&end_naive)
        .latest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&end_naive));

    (start, end)
}

/// Count consecutive study days backward from today.
pub fn study_streak(db: &Database) -> Result<u32> {
    let mut day = Local::now().date_naive();
    let mut streak = 0u32;

    loop {
        let (start, end) = local_day_range(day);
        if db.get_sessions_by_date_range(start, end)?.is_empty() {
            break;
        }
        streak += 1;

        day = match day.pred_opt() {
            Some(prev) => prev,
            None => break,
        };
    }

    Ok(streak)
}
