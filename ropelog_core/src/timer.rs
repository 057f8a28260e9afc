//! Server-side timer-state derivation.
//!
//! [`derive`] computes `{remaining, expired, overtime}` for a session at
//! any query instant from durable session fields only. It is pure: the
//! same session snapshot and the same `now` always yield the same output.
//!
//! Three cases, in priority order:
//! 1. Paused with a snapshot: the client-reported display is returned
//!    verbatim. The server deliberately does not re-verify it against the
//!    segment ledger; the user must see exactly the value that was on
//!    screen when they hit pause. This is an accepted trust boundary.
//! 2. Active with a resume-override: the countdown runs from the override
//!    baseline instead of the natural start-time computation.
//! 3. General: target minus active elapsed time, where pause time is
//!    reconstructed from the segment ledger gaps plus any ongoing pause,
//!    and `compensation_seconds` is added back in.

use crate::{ledger, SessionStatus, TimerState, TrainingSession};
use chrono::{DateTime, Utc};

/// Derive the timer state for `session` as of `now`.
///
/// Returns `None` when the session has no target duration. For an ended
/// session, `now` is pinned to `ended_at` so historical reads reproduce
/// the final state.
pub fn derive(session: &TrainingSession, now: DateTime<Utc>) -> Option<TimerState> {
    let target = session.target_duration_seconds?;

    let now = match session.status {
        SessionStatus::Ended => session.ended_at.unwrap_or(now),
        _ => now,
    };

    if session.paused_snapshot.is_some() && session.resume_override.is_some() {
        // Transitions are supposed to keep these mutually exclusive;
        // prefer the snapshot per the documented priority order.
        tracing::warn!(
            session_id = %session.id,
            "paused_snapshot and resume_override both set; using snapshot"
        );
    }

    // Case 1: paused with a frozen client display
    if session.status == SessionStatus::Paused {
        if let Some(snapshot) = &session.paused_snapshot {
            return Some(snapshot.state());
        }
    }

    // Case 2: active with a resume-override baseline
    if session.status == SessionStatus::Active {
        if let Some(over) = &session.resume_override {
            let elapsed = (now - over.set_at).num_seconds();
            // An override captured after expiry carries the overtime that
            // had already accrued; it keeps counting up from there rather
            // than restarting at zero.
            if over.expired {
                return Some(TimerState {
                    remaining: 0,
                    expired: true,
                    overtime: over.overtime + elapsed,
                });
            }
            return Some(TimerState::from_remaining(over.remaining - elapsed));
        }
    }

    // Case 3: general start-time computation against the ledger
    let total_elapsed = (now - session.started_at).num_seconds();
    let mut paused_seconds = ledger::gap_seconds(&session.segments);
    if session.status == SessionStatus::Paused {
        if let Some(paused_at) = session.paused_at {
            paused_seconds += (now - paused_at).num_seconds();
        }
    }

    let active_elapsed = total_elapsed - paused_seconds;
    let remaining = target - active_elapsed + session.compensation_seconds;
    Some(TimerState::from_remaining(remaining))
}

/// Remaining seconds as of `at`, computed from the ledger alone.
///
/// Used by resume-to-last-activity to rebuild the timer as it stood at
/// the user's last logged reps; ignores any snapshot or override.
pub fn remaining_at(session: &TrainingSession, at: DateTime<Utc>) -> Option<i64> {
    let target = session.target_duration_seconds?;
    let total_elapsed = (at - session.started_at).num_seconds();
    let paused_seconds = ledger::gap_seconds_until(&session.segments, at);
    Some(target - (total_elapsed - paused_seconds) + session.compensation_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PausedSnapshot, ResumeOverride, Segment, TrainingSession};
    use chrono::{Duration, Utc};

    fn session_with_timer(target: i64) -> (TrainingSession, DateTime<Utc>) {
        let t0 = Utc::now();
        (TrainingSession::new("local", 500, Some(target), t0), t0)
    }

    #[test]
    fn test_no_timer_without_target_duration() {
        let t0 = Utc::now();
        let session = TrainingSession::new("local", 500, None, t0);
        assert_eq!(derive(&session, t0 + Duration::seconds(100)), None);
    }

    #[test]
    fn test_derivation_is_pure() {
        let (session, t0) = session_with_timer(600);
        let now = t0 + Duration::seconds(123);

        let first = derive(&session, now);
        let second = derive(&session, now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_active_countdown_counts_down() {
        let (session, t0) = session_with_timer(600);

        let state = derive(&session, t0 + Duration::seconds(100)).unwrap();
        assert_eq!(state.remaining, 500);
        assert!(!state.expired);
        assert_eq!(state.overtime, 0);
    }

    #[test]
    fn test_overtime_after_expiry() {
        // Scenario: 600s target, queried at +601s while still active
        let (session, t0) = session_with_timer(600);

        let state = derive(&session, t0 + Duration::seconds(601)).unwrap();
        assert_eq!(state.remaining, 0);
        assert!(state.expired);
        assert_eq!(state.overtime, 1);
    }

    #[test]
    fn test_monotonicity_until_zero_then_overtime_grows() {
        let (session, t0) = session_with_timer(600);

        let mut last_remaining = i64::MAX;
        let mut last_overtime = 0;
        for secs in [0, 100, 300, 599, 600, 601, 900] {
            let state = derive(&session, t0 + Duration::seconds(secs)).unwrap();
            assert!(state.remaining <= last_remaining);
            assert!(state.overtime >= last_overtime);
            last_remaining = state.remaining;
            last_overtime = state.overtime;
        }
    }

    #[test]
    fn test_paused_snapshot_frozen_verbatim() {
        // Scenario: pause at +300s with client-reported remaining=250;
        // any later query returns 250, not a recomputed 200.
        let (mut session, t0) = session_with_timer(600);
        let pause_at = t0 + Duration::seconds(300);
        ledger::close_segment(&mut session.segments, pause_at);
        session.status = SessionStatus::Paused;
        session.paused_at = Some(pause_at);
        session.paused_snapshot = Some(PausedSnapshot::new(
            TimerState {
                remaining: 250,
                expired: false,
                overtime: 0,
            },
            pause_at,
        ));

        for secs in [301, 400, 5000] {
            let state = derive(&session, t0 + Duration::seconds(secs)).unwrap();
            assert_eq!(state.remaining, 250);
            assert!(!state.expired);
        }
    }

    #[test]
    fn test_paused_without_snapshot_excludes_ongoing_pause() {
        let (mut session, t0) = session_with_timer(600);
        let pause_at = t0 + Duration::seconds(300);
        ledger::close_segment(&mut session.segments, pause_at);
        session.status = SessionStatus::Paused;
        session.paused_at = Some(pause_at);

        // 100s into the pause the countdown has not moved
        let state = derive(&session, t0 + Duration::seconds(400)).unwrap();
        assert_eq!(state.remaining, 300);
    }

    #[test]
    fn test_ledger_gaps_excluded_after_resume() {
        let (mut session, t0) = session_with_timer(600);
        // Pause 300..400, then resume
        ledger::close_segment(&mut session.segments, t0 + Duration::seconds(300));
        session.segments.push(Segment::open(t0 + Duration::seconds(400)));

        let state = derive(&session, t0 + Duration::seconds(500)).unwrap();
        // 500s wall, 100s paused, 400s active
        assert_eq!(state.remaining, 200);
    }

    #[test]
    fn test_resume_override_takes_priority_while_active() {
        let (mut session, t0) = session_with_timer(600);
        let resume_at = t0 + Duration::seconds(500);
        session.resume_override = Some(ResumeOverride::new(TimerState::from_remaining(50), resume_at));

        let state = derive(&session, resume_at).unwrap();
        assert_eq!(state.remaining, 50);

        let later = derive(&session, resume_at + Duration::seconds(70)).unwrap();
        assert!(later.expired);
        assert_eq!(later.overtime, 20);
    }

    #[test]
    fn test_expired_override_continues_overtime() {
        let (mut session, t0) = session_with_timer(600);
        let resume_at = t0 + Duration::seconds(700);
        // Timer had already run 30s past the target at the last activity
        session.resume_override = Some(ResumeOverride::new(
            TimerState::from_remaining(-30),
            resume_at,
        ));

        let state = derive(&session, resume_at).unwrap();
        assert!(state.expired);
        assert_eq!(state.overtime, 30);

        let later = derive(&session, resume_at + Duration::seconds(20)).unwrap();
        assert_eq!(later.overtime, 50);
    }

    #[test]
    fn test_compensation_extends_remaining() {
        let (mut session, t0) = session_with_timer(600);
        session.compensation_seconds = 120;

        let state = derive(&session, t0 + Duration::seconds(600)).unwrap();
        assert_eq!(state.remaining, 120);
        assert!(!state.expired);
    }

    #[test]
    fn test_ended_session_pins_now_to_ended_at() {
        let (mut session, t0) = session_with_timer(600);
        let end_at = t0 + Duration::seconds(450);
        ledger::close_segment(&mut session.segments, end_at);
        session.status = SessionStatus::Ended;
        session.ended_at = Some(end_at);

        let state = derive(&session, t0 + Duration::seconds(9999)).unwrap();
        assert_eq!(state.remaining, 150);
    }

    #[test]
    fn test_remaining_at_reconstructs_historical_value() {
        let (mut session, t0) = session_with_timer(600);
        // Active 0..200, paused 200..260, active 260.., last activity at 300
        ledger::close_segment(&mut session.segments, t0 + Duration::seconds(200));
        session.segments.push(Segment::open(t0 + Duration::seconds(260)));

        let at = t0 + Duration::seconds(300);
        // 300s wall - 60s paused = 240s active
        assert_eq!(remaining_at(&session, at), Some(360));
    }
}
