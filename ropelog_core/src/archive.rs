//! Append-only archive of ended sessions.
//!
//! Finalized sessions are appended to a JSONL (JSON Lines) file with
//! file locking so the history survives even if the live session
//! document is later pruned.

use crate::{Result, TrainingSession};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Sink for finalized sessions
pub trait SessionSink {
    fn append(&mut self, session: &TrainingSession) -> Result<()>;
}

/// JSONL-based archive with file locking
pub struct JsonlArchive {
    path: PathBuf,
}

impl JsonlArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl SessionSink for JsonlArchive {
    fn append(&mut self, session: &TrainingSession) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(session)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Archived session {} to {:?}", session.id, self.path);
        Ok(())
    }
}

/// Read all archived sessions, skipping unparseable lines.
pub fn read_archived(path: &Path) -> Result<Vec<TrainingSession>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut sessions = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<TrainingSession>(&line) {
            Ok(session) => sessions.push(session),
            Err(e) => {
                tracing::warn!("Failed to parse archived session at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} sessions from archive", sessions.len());
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger, SessionStatus};
    use chrono::{Duration, Utc};

    fn ended_session() -> TrainingSession {
        let t0 = Utc::now() - Duration::seconds(300);
        let mut session = TrainingSession::new("local", 500, Some(600), t0);
        let end = t0 + Duration::seconds(250);
        ledger::close_segment(&mut session.segments, end);
        session.status = SessionStatus::Ended;
        session.ended_at = Some(end);
        session.actual_active_seconds = 250;
        session
    }

    #[test]
    fn test_append_and_read_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sessions.jsonl");

        let session = ended_session();
        let id = session.id;

        let mut archive = JsonlArchive::new(&path);
        archive.append(&session).unwrap();

        let sessions = read_archived(&path).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].actual_active_seconds, 250);
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sessions.jsonl");

        let mut archive = JsonlArchive::new(&path);
        archive.append(&ended_session()).unwrap();

        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("not json\n");
        std::fs::write(&path, contents).unwrap();

        archive.append(&ended_session()).unwrap();

        let sessions = read_archived(&path).unwrap();
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_read_missing_archive() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sessions = read_archived(&temp_dir.path().join("nope.jsonl")).unwrap();
        assert!(sessions.is_empty());
    }
}
