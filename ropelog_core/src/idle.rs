//! Inactivity detection for the auto-pause controller.
//!
//! A resettable idle window armed while the session is active: every
//! progress update rearms it, and once the window elapses without
//! activity the client submits an auto-pause carrying its current
//! display as the snapshot.

use chrono::{DateTime, Utc};

/// Resettable inactivity monitor
#[derive(Clone, Copy, Debug)]
pub struct IdleMonitor {
    last_activity: DateTime<Utc>,
    window_seconds: i64,
}

impl IdleMonitor {
    pub fn new(last_activity: DateTime<Utc>, window_seconds: i64) -> Self {
        Self {
            last_activity,
            window_seconds,
        }
    }

    /// Rearm the window. Activity timestamps can arrive out of order
    /// from reconciliation; only forward movement counts.
    pub fn record_activity(&mut self, at: DateTime<Utc>) {
        if at > self.last_activity {
            self.last_activity = at;
        }
    }

    pub fn seconds_idle(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity).num_seconds().max(0)
    }

    /// Whether the idle window has fully elapsed.
    pub fn should_fire(&self, now: DateTime<Utc>) -> bool {
        self.seconds_idle(now) >= self.window_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fires_after_window() {
        let t0 = Utc::now();
        let monitor = IdleMonitor::new(t0, 600);

        assert!(!monitor.should_fire(t0 + Duration::seconds(599)));
        assert!(monitor.should_fire(t0 + Duration::seconds(600)));
    }

    #[test]
    fn test_activity_rearms_window() {
        let t0 = Utc::now();
        let mut monitor = IdleMonitor::new(t0, 600);

        monitor.record_activity(t0 + Duration::seconds(500));
        assert!(!monitor.should_fire(t0 + Duration::seconds(700)));
        assert!(monitor.should_fire(t0 + Duration::seconds(1100)));
    }

    #[test]
    fn test_stale_activity_is_ignored() {
        let t0 = Utc::now();
        let mut monitor = IdleMonitor::new(t0 + Duration::seconds(100), 600);

        monitor.record_activity(t0);
        assert_eq!(monitor.seconds_idle(t0 + Duration::seconds(100)), 0);
    }
}
