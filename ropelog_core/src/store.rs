//! Session document persistence with file locking.
//!
//! All sessions (the owner's current one plus ended history) live in one
//! JSON document. Every service mutation goes through [`SessionStore::update`],
//! an atomic load-modify-save: writes go to a locked temp file that is
//! renamed over the original. Concurrent writers are serialized by the
//! exclusive lock; concurrent updates resolve last-writer-wins.

use crate::{Error, Result, TrainingSession};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Explicitly constructed storage client for session documents.
///
/// Built once at process start and injected into the session service;
/// there is no ambient global handle.
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all sessions with a shared lock.
    ///
    /// A missing file is an empty store. A file that cannot be parsed is
    /// an error: sessions are the source of truth and must not be
    /// silently discarded.
    pub fn load(&self) -> Result<Vec<TrainingSession>> {
        if !self.path.exists() {
            tracing::debug!("No session file at {:?}, starting empty", self.path);
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        let read_result = reader.read_to_string(&mut contents);
        file.unlock()?;
        read_result?;

        let sessions = serde_json::from_str::<Vec<TrainingSession>>(&contents)
            .map_err(|e| Error::State(format!("corrupt session file {:?}: {}", self.path, e)))?;

        tracing::debug!("Loaded {} sessions from {:?}", sessions.len(), self.path);
        Ok(sessions)
    }

    /// Save all sessions atomically with an exclusive lock.
    ///
    /// Writes to a temp file in the same directory, fsyncs, then renames
    /// over the original so readers never see a partial document.
    pub fn save(&self, sessions: &[TrainingSession]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "session path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(sessions)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} sessions to {:?}", sessions.len(), self.path);
        Ok(())
    }

    /// Load sessions, apply `f`, and save the result atomically.
    ///
    /// The closure's return value is passed through; an error aborts
    /// without writing, so failed mutations never touch the document.
    pub fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<TrainingSession>) -> Result<R>,
    {
        let mut sessions = self.load()?;
        let result = f(&mut sessions)?;
        self.save(&sessions)?;
        Ok(result)
    }
}
