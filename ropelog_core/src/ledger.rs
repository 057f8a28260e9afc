//! Segment ledger operations.
//!
//! The ledger records exactly when a session was actively counting toward
//! elapsed time, as an ordered list of open/closed intervals. It is
//! append-only: pauses are reconstructed from the gaps between segments
//! rather than from a separately tracked duration that could drift.

use crate::{Error, Result, Segment};
use chrono::{DateTime, Utc};

/// Append a new open segment starting at `at`.
///
/// Fails if a segment is already open; the state machine must close the
/// previous segment before opening another.
pub fn open_segment(segments: &mut Vec<Segment>, at: DateTime<Utc>) -> Result<()> {
    if segments.iter().any(|s| s.is_open()) {
        return Err(Error::State("segment already open".into()));
    }
    segments.push(Segment::open(at));
    Ok(())
}

/// Close the currently open segment at `at`. No-op if none is open.
pub fn close_segment(segments: &mut [Segment], at: DateTime<Utc>) {
    if let Some(open) = segments.iter_mut().find(|s| s.is_open()) {
        open.end = Some(at);
    }
}

/// Total active seconds across the ledger.
///
/// Closed segments contribute `end - start`; a still-open segment is
/// treated as if it closed at `fallback_end`. Used at finalization with
/// `fallback_end = ended_at`.
pub fn total_active_seconds(segments: &[Segment], fallback_end: DateTime<Utc>) -> i64 {
    segments
        .iter()
        .map(|s| (s.end.unwrap_or(fallback_end) - s.start).num_seconds())
        .sum()
}

/// Total non-counting seconds reconstructed from the gaps between
/// consecutive segments. Does not include an ongoing pause, which has no
/// following segment yet.
pub fn gap_seconds(segments: &[Segment]) -> i64 {
    gap_seconds_until(segments, DateTime::<Utc>::MAX_UTC)
}

/// Like [`gap_seconds`], but only counts gap time that elapsed strictly
/// before `until`. A gap straddling `until` contributes its portion up
/// to that instant.
pub fn gap_seconds_until(segments: &[Segment], until: DateTime<Utc>) -> i64 {
    segments
        .windows(2)
        .filter_map(|pair| {
            let gap_start = pair[0].end?;
            let gap_end = pair[1].start.min(until);
            if gap_end > gap_start {
                Some((gap_end - gap_start).num_seconds())
            } else {
                None
            }
        })
        .sum()
}
