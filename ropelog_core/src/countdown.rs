//! Client-side predictive countdown.
//!
//! Renders a smooth 1-second countdown without per-second server calls:
//! the display is projected from a server-confirmed baseline plus local
//! elapsed time, and the baseline is replaced on every reconciliation so
//! drift is absorbed invisibly. The whole thing is one explicit state
//! object `{baseline, synced_at}`; scheduling (when to tick, when to
//! resync) belongs to the caller's loop.

use crate::TimerState;
use chrono::{DateTime, Utc};

/// Predictive countdown state
#[derive(Clone, Debug)]
pub struct Countdown {
    baseline: TimerState,
    synced_at: DateTime<Utc>,
    frozen: bool,
    expiry_notified: bool,
}

impl Countdown {
    /// Start ticking from a server-confirmed timer state received at `at`.
    pub fn new(baseline: TimerState, at: DateTime<Utc>) -> Self {
        Self {
            baseline,
            synced_at: at,
            frozen: false,
            // A baseline that is already expired means the expiry moment
            // happened before this countdown existed; don't replay it.
            expiry_notified: baseline.expired,
        }
    }

    /// Replace the baseline with a fresh authoritative state.
    ///
    /// Sub-second drift disappears without a visible jump; a larger
    /// correction simply redraws the number on the next tick.
    pub fn resync(&mut self, baseline: TimerState, at: DateTime<Utc>) {
        self.baseline = baseline;
        self.synced_at = at;
        self.frozen = false;
    }

    /// The value to render at `now`.
    ///
    /// While frozen the last baseline is returned verbatim; otherwise the
    /// baseline is projected forward, crossing into overtime at zero.
    pub fn display(&self, now: DateTime<Utc>) -> TimerState {
        if self.frozen {
            return self.baseline;
        }

        let elapsed = (now - self.synced_at).num_seconds().max(0);
        if self.baseline.expired {
            TimerState {
                remaining: 0,
                expired: true,
                overtime: self.baseline.overtime + elapsed,
            }
        } else {
            TimerState::from_remaining(self.baseline.remaining - elapsed)
        }
    }

    /// Stop ticking and keep showing the current value.
    ///
    /// Returns the frozen display; this is exactly what gets submitted to
    /// the server as the pause snapshot, so the stored value matches what
    /// was on screen.
    pub fn freeze(&mut self, now: DateTime<Utc>) -> TimerState {
        let display = self.display(now);
        self.baseline = display;
        self.synced_at = now;
        self.frozen = true;
        display
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// One-shot expiry event: true exactly once, when the display first
    /// crosses zero. Not re-armed until a new countdown is created.
    pub fn take_expiry(&mut self, now: DateTime<Utc>) -> bool {
        if !self.expiry_notified && self.display(now).expired {
            self.expiry_notified = true;
            return true;
        }
        false
    }

    /// Whether the periodic reconciliation is due.
    pub fn needs_resync(&self, now: DateTime<Utc>, interval_seconds: i64) -> bool {
        !self.frozen && (now - self.synced_at).num_seconds() >= interval_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn running(remaining: i64) -> TimerState {
        TimerState::from_remaining(remaining)
    }

    #[test]
    fn test_ticks_down_from_baseline() {
        let t0 = Utc::now();
        let countdown = Countdown::new(running(100), t0);

        assert_eq!(countdown.display(t0).remaining, 100);
        assert_eq!(countdown.display(t0 + Duration::seconds(30)).remaining, 70);
    }

    #[test]
    fn test_crosses_zero_into_overtime() {
        let t0 = Utc::now();
        let countdown = Countdown::new(running(10), t0);

        let display = countdown.display(t0 + Duration::seconds(25));
        assert!(display.expired);
        assert_eq!(display.remaining, 0);
        assert_eq!(display.overtime, 15);
    }

    #[test]
    fn test_expired_baseline_counts_overtime_up() {
        let t0 = Utc::now();
        let countdown = Countdown::new(
            TimerState {
                remaining: 0,
                expired: true,
                overtime: 40,
            },
            t0,
        );

        let display = countdown.display(t0 + Duration::seconds(5));
        assert_eq!(display.overtime, 45);
    }

    #[test]
    fn test_resync_replaces_baseline_and_absorbs_drift() {
        let t0 = Utc::now();
        let mut countdown = Countdown::new(running(100), t0);

        // Local projection says 70; server says 68 (client drifted)
        let sync_at = t0 + Duration::seconds(30);
        countdown.resync(running(68), sync_at);

        assert_eq!(countdown.display(sync_at).remaining, 68);
        assert_eq!(countdown.display(sync_at + Duration::seconds(8)).remaining, 60);
    }

    #[test]
    fn test_freeze_holds_display_and_returns_snapshot() {
        let t0 = Utc::now();
        let mut countdown = Countdown::new(running(100), t0);

        let snapshot = countdown.freeze(t0 + Duration::seconds(30));
        assert_eq!(snapshot.remaining, 70);

        // Frozen display does not move
        assert_eq!(countdown.display(t0 + Duration::seconds(500)).remaining, 70);
        assert!(countdown.is_frozen());
    }

    #[test]
    fn test_resync_then_freeze_holds_authoritative_value() {
        // A reconciliation that finds the session paused adopts the
        // stored snapshot and stops ticking at that exact value.
        let t0 = Utc::now();
        let mut countdown = Countdown::new(running(100), t0);

        let sync_at = t0 + Duration::seconds(30);
        countdown.resync(running(65), sync_at);
        countdown.freeze(sync_at);

        assert!(countdown.is_frozen());
        assert_eq!(countdown.display(sync_at + Duration::seconds(300)).remaining, 65);
    }

    #[test]
    fn test_resync_unfreezes() {
        let t0 = Utc::now();
        let mut countdown = Countdown::new(running(100), t0);
        countdown.freeze(t0 + Duration::seconds(10));

        let resume_at = t0 + Duration::seconds(60);
        countdown.resync(running(90), resume_at);
        assert!(!countdown.is_frozen());
        assert_eq!(countdown.display(resume_at + Duration::seconds(5)).remaining, 85);
    }

    #[test]
    fn test_expiry_fires_exactly_once() {
        let t0 = Utc::now();
        let mut countdown = Countdown::new(running(10), t0);

        assert!(!countdown.take_expiry(t0 + Duration::seconds(5)));
        assert!(countdown.take_expiry(t0 + Duration::seconds(11)));
        assert!(!countdown.take_expiry(t0 + Duration::seconds(12)));

        // A resync does not re-arm it
        countdown.resync(
            TimerState {
                remaining: 0,
                expired: true,
                overtime: 3,
            },
            t0 + Duration::seconds(13),
        );
        assert!(!countdown.take_expiry(t0 + Duration::seconds(14)));
    }

    #[test]
    fn test_already_expired_baseline_does_not_replay_expiry() {
        let t0 = Utc::now();
        let mut countdown = Countdown::new(
            TimerState {
                remaining: 0,
                expired: true,
                overtime: 100,
            },
            t0,
        );
        assert!(!countdown.take_expiry(t0));
    }

    #[test]
    fn test_needs_resync_interval() {
        let t0 = Utc::now();
        let mut countdown = Countdown::new(running(100), t0);

        assert!(!countdown.needs_resync(t0 + Duration::seconds(29), 30));
        assert!(countdown.needs_resync(t0 + Duration::seconds(30), 30));

        countdown.freeze(t0 + Duration::seconds(31));
        assert!(!countdown.needs_resync(t0 + Duration::seconds(120), 30));
    }
}
