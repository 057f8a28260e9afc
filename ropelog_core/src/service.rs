//! Session state machine and service layer.
//!
//! [`SessionService`] owns explicitly injected stores (spec'd lifecycle:
//! constructed once at process start, no ambient globals) and applies the
//! lifecycle transitions: create, update-progress, pause, resume,
//! resume-to-last-activity, auto-pause, end. Every mutation is an atomic
//! read-modify-write against the session document; failed validations
//! never touch storage.
//!
//! Callers supply the query instant explicitly, which keeps the state
//! machine deterministic and testable.

use crate::{
    archive::SessionSink, ledger, timer, Error, JsonlArchive, NewSession, PausedSnapshot, Result,
    ResumeOverride, SessionAction, SessionStatus, SessionStore, SessionView, SummaryStore,
    TimerState, TrainingSession,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Facts produced by an end transition, consumed by the aggregation side effects
struct EndOutcome {
    date: chrono::NaiveDate,
    jumps: u32,
    active_seconds: i64,
}

/// Service coordinating session lifecycle, persistence and aggregation
pub struct SessionService {
    store: SessionStore,
    summaries: SummaryStore,
    archive: JsonlArchive,
    min_goal: u32,
}

impl SessionService {
    pub fn new(
        store: SessionStore,
        summaries: SummaryStore,
        archive: JsonlArchive,
        min_goal: u32,
    ) -> Self {
        Self {
            store,
            summaries,
            archive,
            min_goal,
        }
    }

    /// Create a session for `owner`.
    ///
    /// Fails with `Conflict` if a non-ended session already exists, and
    /// with `Validation` for an out-of-range goal or target duration.
    pub fn create(&self, owner: &str, new: NewSession, now: DateTime<Utc>) -> Result<SessionView> {
        if new.goal < self.min_goal {
            return Err(Error::Validation(format!(
                "goal must be at least {}, got {}",
                self.min_goal, new.goal
            )));
        }
        if let Some(target) = new.target_duration_seconds {
            if target <= 0 {
                return Err(Error::Validation(format!(
                    "target duration must be positive, got {}",
                    target
                )));
            }
        }

        let started_at = new.started_at.unwrap_or(now);
        let session = self.store.update(|sessions| {
            if let Some(existing) = sessions.iter().find(|s| s.owner == owner && !s.is_ended()) {
                return Err(Error::Conflict(format!(
                    "session {} is still {:?}",
                    existing.id, existing.status
                )));
            }

            let mut session =
                TrainingSession::new(owner, new.goal, new.target_duration_seconds, started_at);
            session.is_test = new.is_test;
            sessions.push(session.clone());
            Ok(session)
        })?;

        tracing::info!(
            session_id = %session.id,
            goal = session.goal,
            "Started session"
        );
        Ok(view(session, now))
    }

    /// The owner's current non-ended session, with timer state derived at `now`.
    pub fn current(&self, owner: &str, now: DateTime<Utc>) -> Result<Option<SessionView>> {
        let sessions = self.store.load()?;
        Ok(sessions
            .into_iter()
            .find(|s| s.owner == owner && !s.is_ended())
            .map(|s| view(s, now)))
    }

    /// Apply a lifecycle action to the identified session.
    pub fn apply(
        &mut self,
        owner: &str,
        id: Uuid,
        action: SessionAction,
        now: DateTime<Utc>,
    ) -> Result<SessionView> {
        let (session, outcome) = self.store.update(|sessions| {
            let session = sessions
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| Error::NotFound(format!("no session {}", id)))?;

            if session.owner != owner {
                return Err(Error::Forbidden(format!(
                    "session {} belongs to another owner",
                    id
                )));
            }
            if session.is_ended() {
                return Err(Error::NotFound(format!("session {} already ended", id)));
            }

            let outcome = apply_action(session, &action, now)?;
            Ok((session.clone(), outcome))
        })?;

        if let Some(outcome) = outcome {
            self.archive.append(&session)?;
            self.summaries
                .upsert(outcome.date, outcome.jumps, outcome.active_seconds)?;
            tracing::info!(
                session_id = %session.id,
                jumps = outcome.jumps,
                active_seconds = outcome.active_seconds,
                "Session ended"
            );
        }

        Ok(view(session, now))
    }

    /// Bulk-remove the owner's sessions flagged as test data.
    pub fn delete_test_sessions(&self, owner: &str) -> Result<usize> {
        let removed = self.store.update(|sessions| {
            let before = sessions.len();
            sessions.retain(|s| !(s.owner == owner && s.is_test));
            Ok(before - sessions.len())
        })?;

        if removed > 0 {
            tracing::info!("Removed {} test sessions", removed);
        }
        Ok(removed)
    }
}

fn view(session: TrainingSession, now: DateTime<Utc>) -> SessionView {
    let timer = timer::derive(&session, now);
    SessionView { session, timer }
}

/// Apply one transition to a non-ended session. Returns the end outcome
/// if the action (or a reached goal) finalized the session.
fn apply_action(
    session: &mut TrainingSession,
    action: &SessionAction,
    now: DateTime<Utc>,
) -> Result<Option<EndOutcome>> {
    match action {
        SessionAction::UpdateProgress { count } => update_progress(session, *count, now),

        SessionAction::Pause { snapshot } => {
            pause(session, snapshot.as_ref(), now, "pause");
            Ok(None)
        }

        SessionAction::AutoPause { snapshot } => {
            pause(session, snapshot.as_ref(), now, "auto-pause");
            Ok(None)
        }

        SessionAction::Resume => {
            if session.status == SessionStatus::Active {
                tracing::debug!(session_id = %session.id, "Resume on active session is a no-op");
                return Ok(None);
            }
            ledger::open_segment(&mut session.segments, now)?;
            session.status = SessionStatus::Active;
            session.paused_at = None;
            session.paused_snapshot = None;
            tracing::info!(session_id = %session.id, "Resumed session");
            Ok(None)
        }

        SessionAction::ResumeToLastActivity {
            compensation_seconds,
        } => {
            if session.status == SessionStatus::Active {
                tracing::debug!(session_id = %session.id, "Resume on active session is a no-op");
                return Ok(None);
            }

            // Rebuild the timer as it stood at the last logged reps; the
            // idle gap since then is forgiven.
            let override_state = timer::remaining_at(session, session.last_activity_at)
                .map(TimerState::from_remaining);

            ledger::open_segment(&mut session.segments, now)?;
            session.status = SessionStatus::Active;
            session.paused_at = None;
            session.paused_snapshot = None;
            session.resume_override =
                override_state.map(|state| ResumeOverride::new(state, now));
            if let Some(offset) = compensation_seconds {
                session.compensation_seconds += offset;
            }

            tracing::info!(
                session_id = %session.id,
                last_activity = %session.last_activity_at,
                "Resumed session to last activity"
            );
            Ok(None)
        }

        SessionAction::End => Ok(Some(finalize(session, now))),
    }
}

fn update_progress(
    session: &mut TrainingSession,
    count: u32,
    now: DateTime<Utc>,
) -> Result<Option<EndOutcome>> {
    if count == 0 {
        return Err(Error::Validation("progress count must be positive".into()));
    }
    let updated = session.completed.checked_add(count).ok_or_else(|| {
        Error::Validation(format!("progress count {} overflows", count))
    })?;
    if updated > session.goal {
        return Err(Error::Validation(format!(
            "progress {} would exceed goal {} (completed {})",
            count, session.goal, session.completed
        )));
    }

    session.completed = updated;
    session.last_activity_at = now;
    tracing::debug!(
        session_id = %session.id,
        completed = session.completed,
        goal = session.goal,
        "Logged progress"
    );

    if session.completed == session.goal {
        tracing::info!(session_id = %session.id, "Goal reached");
        return Ok(Some(finalize(session, now)));
    }
    Ok(None)
}

fn pause(
    session: &mut TrainingSession,
    snapshot: Option<&TimerState>,
    now: DateTime<Utc>,
    trigger: &str,
) {
    if session.status == SessionStatus::Paused {
        tracing::debug!(session_id = %session.id, "Pause on paused session is a no-op");
        return;
    }

    ledger::close_segment(&mut session.segments, now);
    session.status = SessionStatus::Paused;
    session.paused_at = Some(now);
    session.resume_override = None;
    session.paused_snapshot = snapshot.map(|s| PausedSnapshot::new(*s, now));

    tracing::info!(
        session_id = %session.id,
        trigger,
        snapshot = snapshot.is_some(),
        "Paused session"
    );
}

fn finalize(session: &mut TrainingSession, now: DateTime<Utc>) -> EndOutcome {
    ledger::close_segment(&mut session.segments, now);
    session.status = SessionStatus::Ended;
    session.ended_at = Some(now);
    session.paused_at = None;
    session.paused_snapshot = None;
    session.resume_override = None;
    session.actual_active_seconds = ledger::total_active_seconds(&session.segments, now);

    EndOutcome {
        date: now.date_naive(),
        jumps: session.completed,
        active_seconds: session.actual_active_seconds,
    }
}
