//! fokus - CLI for the focused-study session tracker
//!
//! Subjects, a pomodoro-style countdown, and study history reports over a
//! local SQLite database.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/fokus/data.db (~/.local/share/fokus/data.db)
//! - Logs: $XDG_STATE_HOME/fokus/fokus.log (~/.local/state/fokus/fokus.log)
//! - Config: $XDG_CONFIG_HOME/fokus/config.toml (~/.config/fokus/config.toml)
//!
//! Short-lived commands (`start`, `pause`, `status`, ...) operate on the
//! persisted session record; while no process is attached, elapsed wall
//! clock is folded into the countdown from a stored anchor. `run` attaches
//! a live foreground countdown.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use fokus_core::format::{format_countdown, format_minutes};
use fokus_core::history::HistoryService;
use fokus_core::timer::{SessionTimer, SwitchPolicy, TimerService, TimerState};
use fokus_core::{Config, Database, Session, Subject};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Preference key anchoring a detached running countdown to wall clock.
/// Value is "<session_id> <rfc3339>" so a stale anchor is ignored.
const PREF_RUNNING_ANCHOR: &str = "running_anchor";

#[derive(Parser)]
#[command(name = "fokus")]
#[command(about = "Track focused study sessions per subject")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage subjects
    Subject {
        #[command(subcommand)]
        command: SubjectCommand,
    },
    /// Select the subject to study
    Use {
        /// Subject name
        name: String,
    },
    /// Start (or resume) a session for the selected subject
    Start,
    /// Pause the running session
    Pause,
    /// Resume the paused session
    Resume,
    /// Discard the current session and restore the full countdown
    Reset,
    /// Show the selected subject and session state
    Status,
    /// Run the countdown in the foreground until completion or Ctrl+C
    Run,
    /// Overall study statistics
    Stats {
        /// Window size in days
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Per-subject study time comparison
    SubjectsChart {
        /// Window size in days
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Day-by-day study calendar
    Calendar {
        /// Window size in days
        #[arg(long, default_value = "29")]
        days: u32,
    },
    /// Consecutive study days ending today
    Streak,
}

#[derive(Subcommand)]
enum SubjectCommand {
    /// Add a subject
    Add {
        name: String,
        /// Session length in minutes (defaults to the configured length)
        #[arg(long)]
        duration_mins: Option<u32>,
    },
    /// List subjects
    List,
    /// Rename a subject
    Rename { name: String, new_name: String },
    /// Change a subject's session length in minutes
    SetDuration { name: String, duration_mins: u32 },
    /// Remove a subject and its sessions
    Rm { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        fokus_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("fokus starting");

    // Open database at XDG-compliant path
    let db_path = Config::database_path();
    let db = Arc::new(Database::open(&db_path).context("failed to open database")?);
    db.migrate().context("failed to run database migrations")?;
    db.seed_defaults(
        &config.timer.default_subject,
        config.timer.default_session_secs,
    )
    .context("failed to seed default subject")?;

    match args.command {
        Command::Subject { command } => run_subject_command(&db, &config, command),
        Command::Use { name } => cmd_use(&db, &config, &name),
        Command::Start => cmd_start(&db, &config),
        Command::Pause => cmd_pause(&db, &config),
        Command::Resume => cmd_resume(&db, &config),
        Command::Reset => cmd_reset(&db, &config),
        Command::Status => cmd_status(&db, &config),
        Command::Run => cmd_run(Arc::clone(&db), &config).await,
        Command::Stats { days } => cmd_stats(Arc::clone(&db), days),
        Command::SubjectsChart { days } => cmd_subjects_chart(Arc::clone(&db), days),
        Command::Calendar { days } => cmd_calendar(Arc::clone(&db), days),
        Command::Streak => cmd_streak(&db),
    }
}

// ============================================
// Subject management
// ============================================

fn run_subject_command(db: &Database, config: &Config, command: SubjectCommand) -> Result<()> {
    match command {
        SubjectCommand::Add {
            name,
            duration_mins,
        } => {
            let secs = duration_mins
                .map(|m| m * 60)
                .unwrap_or(config.timer.default_session_secs);
            let subject = db
                .create_subject(&name, secs)
                .with_context(|| format!("failed to add subject '{}'", name))?;
            println!(
                "Added subject '{}' ({} sessions)",
                subject.name,
                format_countdown(subject.session_duration_secs)
            );
        }
        SubjectCommand::List => {
            let subjects = db.list_subjects().context("failed to list subjects")?;
            let selected = db.last_subject().context("failed to read selection")?;
            for subject in subjects {
                let marker = if selected.as_deref() == Some(subject.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}  ({} sessions)",
                    marker,
                    subject.name,
                    format_countdown(subject.session_duration_secs)
                );
            }
        }
        SubjectCommand::Rename { name, new_name } => {
            let subject = find_subject(db, &name)?;
            db.rename_subject(&subject.id, &new_name)
                .with_context(|| format!("failed to rename subject '{}'", name))?;
            println!("Renamed '{}' to '{}'", name, new_name);
        }
        SubjectCommand::SetDuration {
            name,
            duration_mins,
        } => {
            let subject = find_subject(db, &name)?;
            db.set_subject_duration(&subject.id, duration_mins * 60)
                .with_context(|| format!("failed to update subject '{}'", name))?;
            println!("'{}' sessions are now {}", name, format_minutes(duration_mins));
        }
        SubjectCommand::Rm { name } => {
            let subject = find_subject(db, &name)?;
            if db.last_subject()?.as_deref() == Some(subject.id.as_str()) {
                db.set_last_subject(None)?;
            }
            db.delete_subject(&subject.id)
                .with_context(|| format!("failed to remove subject '{}'", name))?;
            println!("Removed subject '{}' and its sessions", name);
        }
    }
    Ok(())
}

fn find_subject(db: &Database, name: &str) -> Result<Subject> {
    match db.get_subject_by_name(name)? {
        Some(subject) => Ok(subject),
        None => bail!("no subject named '{}'", name),
    }
}

/// The subject commands act on: the stored selection, falling back to the
/// configured default subject.
fn selected_subject(db: &Database, config: &Config) -> Result<Subject> {
    if let Some(id) = db.last_subject()? {
        if let Some(subject) = db.get_subject(&id)? {
            return Ok(subject);
        }
        // Selection points at a deleted subject; fall through to the default
        db.set_last_subject(None)?;
    }

    match db.get_subject_by_name(&config.timer.default_subject)? {
        Some(subject) => Ok(subject),
        None => bail!("no subject selected; run `fokus use <name>`"),
    }
}

// ============================================
// Session control (detached, wall-clock based)
// ============================================

fn cmd_use(db: &Arc<Database>, config: &Config, name: &str) -> Result<()> {
    let subject = find_subject(db, name)?;

    // Selection goes through the controller so the configured switch
    // policy (discard vs. resume the subject's active session) applies
    let mut timer = SessionTimer::new(Arc::clone(db), config.timer.switch_policy);
    timer.select_subject(Some(subject.clone()));

    if config.timer.switch_policy == SwitchPolicy::DiscardActive {
        db.set_preference(PREF_RUNNING_ANCHOR, None)?;
    }

    println!(
        "Studying '{}' ({} sessions)",
        subject.name,
        format_countdown(subject.session_duration_secs)
    );
    Ok(())
}

fn cmd_start(db: &Database, config: &Config) -> Result<()> {
    let subject = selected_subject(db, config)?;

    match db.get_active_session_for_subject(&subject.id)? {
        Some(session) if !session.paused => {
            println!(
                "'{}' is already running ({} left)",
                subject.name,
                format_countdown(detached_remaining(db, &session)?)
            );
        }
        Some(session) => {
            db.resume_session(&session.id)?;
            set_running_anchor(db, &session.id)?;
            println!(
                "Resumed '{}' with {} left",
                subject.name,
                format_countdown(session.remaining_secs)
            );
        }
        None => {
            let session = db.create_session(Some(&subject.id), subject.session_duration_secs)?;
            set_running_anchor(db, &session.id)?;
            println!(
                "Started '{}' for {}",
                subject.name,
                format_countdown(session.duration_secs)
            );
        }
    }
    Ok(())
}

fn cmd_pause(db: &Database, config: &Config) -> Result<()> {
    let subject = selected_subject(db, config)?;

    match db.get_active_session_for_subject(&subject.id)? {
        Some(session) if !session.paused => {
            let remaining = detached_remaining(db, &session)?;
            db.set_preference(PREF_RUNNING_ANCHOR, None)?;
            if remaining == 0 {
                db.complete_session(&session.id)?;
                println!("'{}' session already ran out; marked complete", subject.name);
            } else {
                db.pause_session(&session.id, remaining)?;
                println!(
                    "Paused '{}' with {} left",
                    subject.name,
                    format_countdown(remaining)
                );
            }
        }
        Some(_) => println!("'{}' is already paused", subject.name),
        None => println!("No session running for '{}'", subject.name),
    }
    Ok(())
}

fn cmd_resume(db: &Database, config: &Config) -> Result<()> {
    let subject = selected_subject(db, config)?;

    match db.get_active_session_for_subject(&subject.id)? {
        Some(session) if session.paused => {
            db.resume_session(&session.id)?;
            set_running_anchor(db, &session.id)?;
            println!(
                "Resumed '{}' with {} left",
                subject.name,
                format_countdown(session.remaining_secs)
            );
        }
        Some(_) => println!("'{}' is already running", subject.name),
        None => println!("No session to resume for '{}'", subject.name),
    }
    Ok(())
}

fn cmd_reset(db: &Database, config: &Config) -> Result<()> {
    let subject = selected_subject(db, config)?;

    db.set_preference(PREF_RUNNING_ANCHOR, None)?;
    match db.get_active_session_for_subject(&subject.id)? {
        Some(session) => {
            db.delete_session(&session.id)?;
            println!(
                "Discarded '{}' session; countdown back to {}",
                subject.name,
                format_countdown(subject.session_duration_secs)
            );
        }
        None => println!(
            "Nothing to reset; '{}' countdown is {}",
            subject.name,
            format_countdown(subject.session_duration_secs)
        ),
    }
    Ok(())
}

fn cmd_status(db: &Database, config: &Config) -> Result<()> {
    let subject = selected_subject(db, config)?;

    println!(
        "Subject:   {} ({} sessions)",
        subject.name,
        format_countdown(subject.session_duration_secs)
    );

    match db.get_active_session_for_subject(&subject.id)? {
        Some(session) if session.paused => {
            println!("State:     paused");
            println!("Remaining: {}", format_countdown(session.remaining_secs));
        }
        Some(session) => {
            let remaining = detached_remaining(db, &session)?;
            println!("State:     running");
            println!("Remaining: {}", format_countdown(remaining));
        }
        None => {
            println!("State:     idle");
            println!(
                "Remaining: {}",
                format_countdown(subject.session_duration_secs)
            );
        }
    }
    Ok(())
}

/// Record wall-clock anchor for a session left running without a process.
fn set_running_anchor(db: &Database, session_id: &str) -> Result<()> {
    let value = format!("{} {}", session_id, Utc::now().to_rfc3339());
    db.set_preference(PREF_RUNNING_ANCHOR, Some(&value))?;
    Ok(())
}

/// Countdown value of a detached running session: the stored snapshot
/// minus wall clock elapsed since the anchor (or since start when no
/// anchor matches), floored at zero.
fn detached_remaining(db: &Database, session: &Session) -> Result<u32> {
    let anchor = match db.get_preference(PREF_RUNNING_ANCHOR)? {
        Some(value) => parse_anchor(&value, &session.id),
        None => None,
    };

    let since: DateTime<Utc> = anchor.unwrap_or(session.start_time);
    let elapsed = (Utc::now() - since).num_seconds().max(0);
    let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
    Ok(session.remaining_secs.saturating_sub(elapsed))
}

fn parse_anchor(value: &str, session_id: &str) -> Option<DateTime<Utc>> {
    let (id, ts) = value.split_once(' ')?;
    if id != session_id {
        return None;
    }
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================
// Foreground countdown
// ============================================

async fn cmd_run(db: Arc<Database>, config: &Config) -> Result<()> {
    let subject = selected_subject(&db, config)?;

    // Fold any detached countdown into a persisted pause snapshot so the
    // controller adopts an accurate remaining time
    if let Some(active) = db.get_active_session_for_subject(&subject.id)? {
        if !active.paused {
            let remaining = detached_remaining(&db, &active)?;
            if remaining == 0 {
                db.complete_session(&active.id)?;
                db.set_preference(PREF_RUNNING_ANCHOR, None)?;
                println!("'{}' session already ran out; marked complete", subject.name);
                return Ok(());
            }
            db.pause_session(&active.id, remaining)?;
        }
    }
    db.set_preference(PREF_RUNNING_ANCHOR, None)?;

    // `run` always attaches to the subject's session rather than applying
    // the switch policy; `use` is where discard-on-switch happens
    let mut timer = SessionTimer::new(Arc::clone(&db), SwitchPolicy::ResumeActive);
    timer.select_subject(Some(subject.clone()));
    let mut service = TimerService::new(timer);
    service.toggle().context("failed to start session")?;

    println!(
        "Studying '{}' - {} on the clock. Ctrl+C pauses.",
        subject.name,
        format_countdown(service.remaining_secs())
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if service.state() == TimerState::Idle {
                    println!();
                    println!(
                        "Session complete: {} of '{}' studied",
                        format_minutes(subject.session_duration_secs / 60),
                        subject.name
                    );
                    break;
                }
                print!("\r  {}  {} ", subject.name, format_countdown(service.remaining_secs()));
                std::io::stdout().flush().ok();
            }
            _ = &mut ctrl_c => {
                service.toggle().context("failed to pause session")?;
                println!();
                println!(
                    "Paused '{}' with {} left",
                    subject.name,
                    format_countdown(service.remaining_secs())
                );
                break;
            }
        }
    }

    Ok(())
}

// ============================================
// Reports
// ============================================

fn cmd_stats(db: Arc<Database>, days: u32) -> Result<()> {
    let history = HistoryService::new(db);
    let stats = history
        .overall_stats(days)
        .context("failed to compute statistics")?;

    println!("Last {} days:", days);
    println!("  Total studied:      {}", format_minutes(stats.total_minutes));
    println!("  Sessions:           {}", stats.total_sessions);
    println!("  Avg session:        {:.1}m", stats.average_session_length);
    println!("  Avg active day:     {:.1}m", stats.average_daily_minutes);
    println!("  Most active day:    {}", stats.most_active_day);
    println!("  Most active subject: {}", stats.most_active_subject);
    println!("  Streak:             {} day(s)", stats.study_streak);

    if !stats.subject_stats.is_empty() {
        println!();
        println!("By subject:");
        for subject in &stats.subject_stats {
            println!(
                "  {}: {} across {} session(s)",
                subject.subject_name,
                format_minutes(subject.total_minutes),
                subject.total_sessions
            );
        }
    }
    Ok(())
}

fn cmd_subjects_chart(db: Arc<Database>, days: u32) -> Result<()> {
    let history = HistoryService::new(db);
    let comparison = history
        .subject_comparison(days)
        .context("failed to compute comparison")?;

    if comparison.labels.is_empty() {
        println!("No study time recorded in the last {} days", days);
        return Ok(());
    }

    let max = comparison.data.iter().copied().max().unwrap_or(1).max(1);
    let width = comparison.labels.iter().map(|l| l.len()).max().unwrap_or(0);

    for (label, minutes) in comparison.labels.iter().zip(&comparison.data) {
        let bar_len = (minutes * 30 / max).max(1) as usize;
        println!(
            "{:width$}  {} {}",
            label,
            "#".repeat(bar_len),
            format_minutes(*minutes),
            width = width
        );
    }
    Ok(())
}

fn cmd_calendar(db: Arc<Database>, days: u32) -> Result<()> {
    let history = HistoryService::new(db);
    let calendar = history
        .calendar_data(days)
        .context("failed to compute calendar")?;

    for day in &calendar {
        if day.sessions == 0 {
            println!("{}  -", day.date);
        } else {
            println!(
                "{}  {} ({} session(s))",
                day.date,
                format_minutes(day.minutes),
                day.sessions
            );
        }
    }
    Ok(())
}

fn cmd_streak(db: &Database) -> Result<()> {
    let streak = fokus_core::history::study_streak(db).context("failed to compute streak")?;
    println!("Study streak: {} day(s)", streak);
    Ok(())
}
