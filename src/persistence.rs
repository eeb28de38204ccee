//! Where the timer record lives between requests

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{
    error::{TimerError, TimerResult},
    state::TimerRecord,
};

/// Storage backend for the timer record.
#[derive(Debug, Clone)]
pub enum Persistence {
    /// Nothing outlives the process.
    Memory,
    /// One JSON file, read fully on every request and rewritten on every mutation.
    File(StateFile),
}

impl Persistence {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Persistence::File(StateFile::new(path)),
            None => Persistence::Memory,
        }
    }

    /// Load the stored record; `Ok(None)` when nothing has been stored yet.
    pub async fn load(&self) -> TimerResult<Option<TimerRecord>> {
        match self {
            Persistence::Memory => Ok(None),
            Persistence::File(file) => file.load().await,
        }
    }

    pub async fn save(&self, record: &TimerRecord) -> TimerResult<()> {
        match self {
            Persistence::Memory => Ok(()),
            Persistence::File(file) => file.save(record).await,
        }
    }

    /// True when every request should re-read storage.
    pub fn is_durable(&self) -> bool {
        matches!(self, Persistence::File(_))
    }

    pub fn describe(&self) -> String {
        match self {
            Persistence::Memory => "memory".to_string(),
            Persistence::File(file) => format!("file {}", file.path().display()),
        }
    }
}

/// A JSON state file on local disk.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> TimerResult<Option<TimerRecord>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error("read", e)),
        };
        let record = serde_json::from_slice(&raw).map_err(|e| self.error("parse", e))?;
        debug!("Loaded timer record from {}", self.path.display());
        Ok(Some(record))
    }

    pub async fn save(&self, record: &TimerRecord) -> TimerResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error("create directory for", e))?;
        }
        let raw = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| self.error("write", e))?;
        debug!("Saved timer record v{} to {}", record.version, self.path.display());
        Ok(())
    }

    fn error(&self, verb: &str, e: impl std::fmt::Display) -> TimerError {
        TimerError::Persistence(format!("failed to {} {}: {}", verb, self.path.display(), e))
    }
}
