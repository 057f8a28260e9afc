use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use ropelog_core::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ropelog")]
#[command(about = "Jump rope session tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new training session
    Start {
        /// Target jump count (minimum 100)
        #[arg(long)]
        goal: u32,

        /// Optional countdown duration in seconds
        #[arg(long)]
        duration: Option<i64>,

        /// Backdate the session start (RFC 3339)
        #[arg(long)]
        at: Option<String>,

        /// Flag the session as test data
        #[arg(long)]
        test: bool,
    },

    /// Show the current session and its timer (default)
    Status,

    /// Log additional jumps
    Log {
        /// Number of jumps to add
        count: u32,
    },

    /// Pause the current session
    Pause,

    /// Resume the current session
    Resume {
        /// Resume as though the countdown never stopped after the last logged jumps
        #[arg(long)]
        to_last_activity: bool,

        /// Extra compensation seconds to credit (with --to-last-activity)
        #[arg(long)]
        compensation: Option<i64>,
    },

    /// End the current session
    End,

    /// Run the live countdown with auto-pause and periodic reconciliation
    Watch,

    /// Show daily training summaries
    Summary {
        /// Export summaries to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Show recently finished sessions
    History {
        /// How many sessions to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Remove sessions flagged as test data
    ClearTestData,
}

fn main() -> Result<()> {
    ropelog_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;

    let owner = config.owner.id.clone();
    let mut service = SessionService::new(
        SessionStore::new(data_dir.join("sessions.json")),
        SummaryStore::new(data_dir.join("summaries.json")),
        JsonlArchive::new(data_dir.join("sessions.jsonl")),
        config.session.min_goal,
    );

    match cli.command {
        Some(Commands::Start {
            goal,
            duration,
            at,
            test,
        }) => cmd_start(&service, &owner, goal, duration, at, test),
        Some(Commands::Status) | None => cmd_status(&service, &owner),
        Some(Commands::Log { count }) => cmd_log(&mut service, &owner, count),
        Some(Commands::Pause) => cmd_pause(&mut service, &owner),
        Some(Commands::Resume {
            to_last_activity,
            compensation,
        }) => cmd_resume(&mut service, &owner, to_last_activity, compensation),
        Some(Commands::End) => cmd_end(&mut service, &owner),
        Some(Commands::Watch) => cmd_watch(&mut service, &owner, &config),
        Some(Commands::Summary { export }) => cmd_summary(&data_dir, export),
        Some(Commands::History { limit }) => cmd_history(&data_dir, limit),
        Some(Commands::ClearTestData) => cmd_clear_test_data(&service, &owner),
    }
}

fn cmd_start(
    service: &SessionService,
    owner: &str,
    goal: u32,
    duration: Option<i64>,
    at: Option<String>,
    test: bool,
) -> Result<()> {
    let started_at = match at {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| Error::Validation(format!("invalid --at timestamp: {}", e)))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let view = service.create(
        owner,
        NewSession {
            goal,
            target_duration_seconds: duration,
            started_at,
            is_test: test,
        },
        Utc::now(),
    )?;

    println!("✓ Session started");
    display_session(&view);
    Ok(())
}

fn cmd_status(service: &SessionService, owner: &str) -> Result<()> {
    match service.current(owner, Utc::now())? {
        Some(view) => display_session(&view),
        None => println!("No active session. Start one with `ropelog start --goal N`."),
    }
    Ok(())
}

fn cmd_log(service: &mut SessionService, owner: &str, count: u32) -> Result<()> {
    let view = current_or_fail(service, owner)?;
    let view = service.apply(
        owner,
        view.session.id,
        SessionAction::UpdateProgress { count },
        Utc::now(),
    )?;

    if view.session.is_ended() {
        println!("✓ Goal reached!");
        display_ended(&view.session);
    } else {
        println!(
            "✓ Logged {} jumps ({}/{})",
            count, view.session.completed, view.session.goal
        );
    }
    Ok(())
}

fn cmd_pause(service: &mut SessionService, owner: &str) -> Result<()> {
    let now = Utc::now();
    let view = current_or_fail(service, owner)?;

    // A pause from the plain CLI has no live display; the snapshot is the
    // freshly derived value so the frozen number matches what status showed.
    let snapshot = view.timer;
    let view = service.apply(owner, view.session.id, SessionAction::Pause { snapshot }, now)?;

    println!("✓ Session paused");
    if let Some(timer) = view.timer {
        println!("  Timer frozen at {}", format_timer(&timer));
    }
    Ok(())
}

fn cmd_resume(
    service: &mut SessionService,
    owner: &str,
    to_last_activity: bool,
    compensation: Option<i64>,
) -> Result<()> {
    let view = current_or_fail(service, owner)?;
    let action = if to_last_activity {
        SessionAction::ResumeToLastActivity {
            compensation_seconds: compensation,
        }
    } else {
        SessionAction::Resume
    };

    let view = service.apply(owner, view.session.id, action, Utc::now())?;
    println!("✓ Session resumed");
    if let Some(timer) = view.timer {
        println!("  Timer: {}", format_timer(&timer));
    }
    Ok(())
}

fn cmd_end(service: &mut SessionService, owner: &str) -> Result<()> {
    let view = current_or_fail(service, owner)?;
    let view = service.apply(owner, view.session.id, SessionAction::End, Utc::now())?;
    display_ended(&view.session);
    Ok(())
}

fn cmd_summary(data_dir: &PathBuf, export: Option<PathBuf>) -> Result<()> {
    let store = SummaryStore::new(data_dir.join("summaries.json"));

    if let Some(csv_path) = export {
        let count = store.export_csv(&csv_path)?;
        println!(
            "✓ Exported {} daily summaries to {}",
            count,
            csv_path.display()
        );
        return Ok(());
    }

    let summaries = store.load()?;
    if summaries.is_empty() {
        println!("No finished sessions yet.");
        return Ok(());
    }

    println!(
        "{:<12} {:>8} {:>10} {:>10}",
        "date", "jumps", "sessions", "active"
    );
    for summary in summaries.values() {
        println!(
            "{:<12} {:>8} {:>10} {:>10}",
            summary.date,
            summary.total_jumps,
            summary.session_count,
            format_hms(summary.active_seconds)
        );
    }
    Ok(())
}

fn cmd_history(data_dir: &PathBuf, limit: usize) -> Result<()> {
    let mut sessions = read_archived(&data_dir.join("sessions.jsonl"))?;
    if sessions.is_empty() {
        println!("No finished sessions yet.");
        return Ok(());
    }

    sessions.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
    for session in sessions.iter().take(limit) {
        let ended = session
            .ended_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!(
            "{}  {}/{} jumps  active {}  ended {}",
            session.id,
            session.completed,
            session.goal,
            format_hms(session.actual_active_seconds),
            ended
        );
    }
    Ok(())
}

fn cmd_clear_test_data(service: &SessionService, owner: &str) -> Result<()> {
    let removed = service.delete_test_sessions(owner)?;
    println!("✓ Removed {} test sessions", removed);
    Ok(())
}

// ============================================================================
// Watch mode: predictive countdown + reconciliation + auto-pause
// ============================================================================

enum WatchInput {
    Line(String),
    Eof,
}

fn cmd_watch(service: &mut SessionService, owner: &str, config: &Config) -> Result<()> {
    let now = Utc::now();
    let Some(view) = service.current(owner, now)? else {
        println!("No active session to watch.");
        return Ok(());
    };

    let session_id = view.session.id;
    let mut status = view.session.status;
    let mut completed = view.session.completed;
    let goal = view.session.goal;
    let mut countdown = view.timer.map(|t| Countdown::new(t, now));
    let mut idle = IdleMonitor::new(
        view.session.last_activity_at,
        config.session.idle_window_seconds,
    );
    let mut last_synced_at = now;

    println!(
        "Watching session {} ({}/{} jumps)",
        session_id, completed, goal
    );
    println!("  l <n>: log jumps   p: pause   r: resume   a: resume to last activity");
    println!("  e: end session     q: quit");

    // Keyboard input arrives over a channel so the tick never blocks
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(WatchInput::Line(line)).is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tx.send(WatchInput::Eof);
    });

    loop {
        thread::sleep(Duration::from_secs(1));
        let now = Utc::now();

        // Apply any pending keyboard commands first
        let mut quit = false;
        while let Ok(input) = rx.try_recv() {
            match input {
                WatchInput::Eof => quit = true,
                WatchInput::Line(line) => {
                    match handle_watch_command(
                        service,
                        owner,
                        session_id,
                        line.trim(),
                        &mut countdown,
                        now,
                    )? {
                        WatchOutcome::Continue(new_status, new_completed) => {
                            status = new_status;
                            completed = new_completed;
                            if let SessionStatus::Active = status {
                                idle.record_activity(now);
                            }
                        }
                        WatchOutcome::SessionOver => return Ok(()),
                        WatchOutcome::Quit => quit = true,
                    }
                }
            }
        }
        if quit {
            break;
        }

        // One-shot expiry notice the first time the display crosses zero
        if status == SessionStatus::Active {
            if let Some(cd) = countdown.as_mut() {
                if cd.take_expiry(now) {
                    println!();
                    println!("⏰ Time is up! Continuing into overtime.");
                    println!("   Press 'e' to end the session now.");
                }
            }
        }

        // Inactivity auto-pause, submitting the frozen display as the snapshot
        if status == SessionStatus::Active && idle.should_fire(now) {
            let snapshot = countdown.as_mut().map(|cd| cd.freeze(now));
            match service.apply(owner, session_id, SessionAction::AutoPause { snapshot }, now) {
                Ok(view) => {
                    status = view.session.status;
                    println!();
                    println!(
                        "⏸ Auto-paused after {} minutes without logged jumps",
                        config.session.idle_window_seconds / 60
                    );
                }
                Err(e) => {
                    // Retried on the next tick; keep displaying locally
                    tracing::warn!("Auto-pause failed, will retry: {}", e);
                }
            }
        }

        // Periodic reconciliation replaces the local baseline
        if status == SessionStatus::Active
            && (now - last_synced_at).num_seconds() >= config.session.resync_interval_seconds
        {
            match service.current(owner, now) {
                Ok(Some(view)) => {
                    status = view.session.status;
                    completed = view.session.completed;
                    idle.record_activity(view.session.last_activity_at);
                    if let Some(cd) = countdown.as_mut() {
                        if let Some(timer) = view.timer {
                            cd.resync(timer, now);
                        }
                        // Paused elsewhere: hold the authoritative value
                        // instead of ticking on from a stale baseline
                        if status != SessionStatus::Active {
                            cd.freeze(now);
                        }
                    }
                    last_synced_at = now;
                }
                Ok(None) => {
                    println!();
                    println!("Session ended elsewhere.");
                    return Ok(());
                }
                Err(e) => {
                    // Transient store failure: keep ticking from the local
                    // baseline and retry on the next interval
                    tracing::warn!("Reconciliation failed, will retry: {}", e);
                    last_synced_at = now;
                }
            }
        }

        draw_watch_line(
            status,
            completed,
            goal,
            countdown.as_ref().map(|cd| cd.display(now)),
        );
    }

    // Best-effort pause on the way out so a dangling open segment is not
    // left behind; failure is ignored since nobody is watching anymore.
    if status == SessionStatus::Active {
        let now = Utc::now();
        let snapshot = countdown.as_mut().map(|cd| cd.freeze(now));
        if let Err(e) = service.apply(owner, session_id, SessionAction::Pause { snapshot }, now) {
            tracing::debug!("Exit pause failed: {}", e);
        }
    }
    println!();
    println!("Stopped watching.");
    Ok(())
}

enum WatchOutcome {
    Continue(SessionStatus, u32),
    SessionOver,
    Quit,
}

fn handle_watch_command(
    service: &mut SessionService,
    owner: &str,
    session_id: uuid::Uuid,
    line: &str,
    countdown: &mut Option<Countdown>,
    now: DateTime<Utc>,
) -> Result<WatchOutcome> {
    let mut parts = line.split_whitespace();
    let action = match (parts.next(), parts.next()) {
        (Some("q"), _) => return Ok(WatchOutcome::Quit),
        (Some("l"), Some(n)) => match n.parse::<u32>() {
            Ok(count) => SessionAction::UpdateProgress { count },
            Err(_) => {
                println!("Usage: l <count>");
                return refresh(service, owner, now);
            }
        },
        (Some("p"), _) => {
            let snapshot = countdown.as_mut().map(|cd| cd.freeze(now));
            SessionAction::Pause { snapshot }
        }
        (Some("r"), _) => SessionAction::Resume,
        (Some("a"), _) => SessionAction::ResumeToLastActivity {
            compensation_seconds: None,
        },
        (Some("e"), _) => SessionAction::End,
        _ => {
            if !line.is_empty() {
                println!("Unknown command: {}", line);
            }
            return refresh(service, owner, now);
        }
    };

    match service.apply(owner, session_id, action, now) {
        Ok(view) => {
            if view.session.is_ended() {
                println!();
                display_ended(&view.session);
                return Ok(WatchOutcome::SessionOver);
            }
            // Any applied action returns the authoritative timer; adopt
            // it as the new baseline (resume-to-last-activity included).
            if let (Some(cd), Some(timer)) = (countdown.as_mut(), view.timer) {
                if view.session.status == SessionStatus::Active {
                    cd.resync(timer, now);
                } else {
                    cd.freeze(now);
                }
            }
            Ok(WatchOutcome::Continue(
                view.session.status,
                view.session.completed,
            ))
        }
        Err(Error::Validation(msg)) => {
            println!("✗ {}", msg);
            refresh(service, owner, now)
        }
        Err(e) => Err(e),
    }
}

/// Re-read the current session without applying anything.
fn refresh(service: &SessionService, owner: &str, now: DateTime<Utc>) -> Result<WatchOutcome> {
    match service.current(owner, now)? {
        Some(view) => Ok(WatchOutcome::Continue(
            view.session.status,
            view.session.completed,
        )),
        None => Ok(WatchOutcome::SessionOver),
    }
}

fn draw_watch_line(
    status: SessionStatus,
    completed: u32,
    goal: u32,
    display: Option<TimerState>,
) {
    let timer = match display {
        Some(t) => format_timer(&t),
        None => "no timer".into(),
    };
    print!(
        "\r  [{:?}] {}/{} jumps  {}        ",
        status, completed, goal, timer
    );
    let _ = io::stdout().flush();
}

// ============================================================================
// Output helpers
// ============================================================================

fn current_or_fail(service: &SessionService, owner: &str) -> Result<SessionView> {
    service
        .current(owner, Utc::now())?
        .ok_or_else(|| Error::NotFound("no active session".into()))
}

fn display_session(view: &SessionView) {
    let session = &view.session;
    println!("╭─────────────────────────────────────────╮");
    println!("│  SESSION {:?}", session.status);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Progress: {}/{} jumps", session.completed, session.goal);
    println!("  Started:  {}", session.started_at.to_rfc3339());
    match &view.timer {
        Some(timer) => println!("  Timer:    {}", format_timer(timer)),
        None => println!("  Timer:    none"),
    }
    if let Some(paused_at) = session.paused_at {
        println!("  Paused:   {}", paused_at.to_rfc3339());
    }
    println!();
}

fn display_ended(session: &TrainingSession) {
    println!("✓ Session ended");
    println!("  Jumps:       {}/{}", session.completed, session.goal);
    println!(
        "  Active time: {}",
        format_hms(session.actual_active_seconds)
    );
}

fn format_timer(timer: &TimerState) -> String {
    if timer.expired {
        format!("overtime +{}", format_hms(timer.overtime))
    } else {
        format!("{} remaining", format_hms(timer.remaining))
    }
}

fn format_hms(total_seconds: i64) -> String {
    let seconds = total_seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
