//! Core domain types for the Ropelog session tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Training sessions and their lifecycle status
//! - The segment ledger (periods of active training)
//! - Timer state, pause snapshots and resume overrides
//! - Lifecycle actions and the view returned to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Session Status and Segments
// ============================================================================

/// Lifecycle status of a training session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Ended,
}

/// One interval of active training within a session.
///
/// Exactly one segment has `end = None` while the session is active;
/// every segment is closed once the session ends.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Segment {
    pub fn open(at: DateTime<Utc>) -> Self {
        Self { start: at, end: None }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

// ============================================================================
// Timer State, Snapshots and Overrides
// ============================================================================

/// Derived countdown state at a single instant.
///
/// While the countdown is running, `remaining` counts down and `overtime`
/// is 0; once the target duration is used up, `expired` flips and
/// `overtime` counts up. 1-second granularity throughout.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerState {
    pub remaining: i64,
    pub expired: bool,
    pub overtime: i64,
}

impl TimerState {
    /// Build a timer state from a signed remaining value, flipping to
    /// overtime when the value is zero or negative.
    pub fn from_remaining(remaining: i64) -> Self {
        if remaining > 0 {
            Self {
                remaining,
                expired: false,
                overtime: 0,
            }
        } else {
            Self {
                remaining: 0,
                expired: true,
                overtime: -remaining,
            }
        }
    }
}

/// Client-reported timer display captured at the moment of a pause.
///
/// Replayed verbatim while the session stays paused; the stored values
/// are what the user last saw on screen, not a server recomputation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PausedSnapshot {
    pub remaining: i64,
    pub expired: bool,
    pub overtime: i64,
    pub captured_at: DateTime<Utc>,
}

impl PausedSnapshot {
    pub fn new(state: TimerState, captured_at: DateTime<Utc>) -> Self {
        Self {
            remaining: state.remaining,
            expired: state.expired,
            overtime: state.overtime,
            captured_at,
        }
    }

    pub fn state(&self) -> TimerState {
        TimerState {
            remaining: self.remaining,
            expired: self.expired,
            overtime: self.overtime,
        }
    }
}

/// Timer baseline substituted for the natural start-time computation.
///
/// Set by "resume to last activity": the countdown behaves as though it
/// had been running continuously since the user's last logged reps.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumeOverride {
    pub remaining: i64,
    pub expired: bool,
    pub overtime: i64,
    pub set_at: DateTime<Utc>,
}

impl ResumeOverride {
    pub fn new(state: TimerState, set_at: DateTime<Utc>) -> Self {
        Self {
            remaining: state.remaining,
            expired: state.expired,
            overtime: state.overtime,
            set_at,
        }
    }
}

// ============================================================================
// Training Session
// ============================================================================

/// A goal-based jump-rope training session.
///
/// At most one non-ended session exists per owner at any time. The
/// `segments` ledger is the append-only source of truth for active time;
/// pause bookkeeping (`paused_at`, `paused_snapshot`) never duplicates it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingSession {
    pub id: Uuid,
    pub owner: String,
    pub goal: u32,
    pub completed: u32,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    pub segments: Vec<Segment>,
    pub target_duration_seconds: Option<i64>,
    pub paused_snapshot: Option<PausedSnapshot>,
    pub resume_override: Option<ResumeOverride>,
    pub compensation_seconds: i64,
    pub actual_active_seconds: i64,
    #[serde(default)]
    pub is_test: bool,
}

impl TrainingSession {
    /// Create a new active session with one open segment seeded.
    pub fn new(
        owner: &str,
        goal: u32,
        target_duration_seconds: Option<i64>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            goal,
            completed: 0,
            status: SessionStatus::Active,
            started_at,
            ended_at: None,
            paused_at: None,
            last_activity_at: started_at,
            segments: vec![Segment::open(started_at)],
            target_duration_seconds,
            paused_snapshot: None,
            resume_override: None,
            compensation_seconds: 0,
            actual_active_seconds: 0,
            is_test: false,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    /// Check structural invariants, returning a description of each violation.
    ///
    /// `paused_snapshot` and `resume_override` must never both be
    /// meaningful at once; every transition that sets one clears the other.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.segments.is_empty() {
            errors.push("segment ledger is empty".into());
        }

        let open_count = self.segments.iter().filter(|s| s.is_open()).count();
        match self.status {
            SessionStatus::Active => {
                if open_count != 1 {
                    errors.push(format!("active session has {} open segments", open_count));
                }
            }
            SessionStatus::Paused | SessionStatus::Ended => {
                if open_count != 0 {
                    errors.push(format!(
                        "{:?} session has {} open segments",
                        self.status, open_count
                    ));
                }
            }
        }

        if self.paused_snapshot.is_some() && self.resume_override.is_some() {
            errors.push("paused_snapshot and resume_override are both set".into());
        }

        if self.status != SessionStatus::Paused && self.paused_at.is_some() {
            errors.push("paused_at set while not paused".into());
        }

        if self.completed > self.goal {
            errors.push(format!(
                "completed {} exceeds goal {}",
                self.completed, self.goal
            ));
        }

        errors
    }
}

// ============================================================================
// Actions and Views
// ============================================================================

/// Parameters for creating a session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewSession {
    pub goal: u32,
    pub target_duration_seconds: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_test: bool,
}

/// A lifecycle action applied to an existing session.
///
/// This is also the wire shape of the PATCH body; the `action` tag
/// selects the transition and the remaining fields are its payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionAction {
    /// Log `count` additional jumps
    UpdateProgress { count: u32 },
    /// User-initiated pause, optionally carrying the client's displayed timer
    Pause { snapshot: Option<TimerState> },
    /// Plain resume from the real resume instant
    Resume,
    /// Resume as though the countdown never stopped after the last logged reps
    ResumeToLastActivity { compensation_seconds: Option<i64> },
    /// Inactivity-triggered pause; same side effects as `Pause`
    AutoPause { snapshot: Option<TimerState> },
    /// Finalize the session
    End,
}

/// A session together with its freshly derived timer state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session: TrainingSession,
    pub timer: Option<TimerState>,
}

/// One aggregate record per calendar day of finished training
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailySummary {
    pub date: chrono::NaiveDate,
    pub total_jumps: u32,
    pub session_count: u32,
    pub active_seconds: i64,
}
