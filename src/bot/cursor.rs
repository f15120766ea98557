//! Cursor persistence: the id of the newest mention already handled.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{AccountId, MentionId};

#[derive(Debug)]
pub enum CursorError {
    Io { path: PathBuf, source: std::io::Error },
    Sqlite(rusqlite::Error),
    /// Stored value does not fit a mention id.
    Corrupt(String),
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cursor file '{}': {}", path.display(), source),
            Self::Sqlite(e) => write!(f, "cursor database: {e}"),
            Self::Corrupt(msg) => write!(f, "corrupt cursor: {msg}"),
        }
    }
}

impl std::error::Error for CursorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Sqlite(e) => Some(e),
            Self::Corrupt(_) => None,
        }
    }
}

impl From<rusqlite::Error> for CursorError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

/// Outcome of one reply attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Sent,
    Failed,
}

impl ReplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyStatus::Sent => "sent",
            ReplyStatus::Failed => "failed",
        }
    }
}

/// Journal entry for a handled mention.
#[derive(Debug, Clone)]
pub struct ReplyRecord {
    pub mention_id: MentionId,
    pub author_id: AccountId,
    pub text: String,
    /// Reply text, if the responder produced one.
    pub reply: Option<String>,
    pub status: ReplyStatus,
    pub replied_at: DateTime<Utc>,
}

pub trait CursorStore {
    fn load(&self) -> Result<Option<MentionId>, CursorError>;

    fn save(&self, id: MentionId) -> Result<(), CursorError>;

    /// Journal a reply. Stores without a journal ignore it.
    fn record_reply(&self, _record: &ReplyRecord) -> Result<(), CursorError> {
        Ok(())
    }
}

/// Cursor kept as a single decimal number in a text file.
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the cursor file, never equal to it.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cursor".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> CursorError {
        CursorError::Io { path: self.path.clone(), source }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Result<Option<MentionId>, CursorError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cursor file at {:?}, starting from the beginning", self.path);
                return Ok(None);
            }
            Err(e) => return Err(self.io_err(e)),
        };

        match content.trim().parse::<MentionId>() {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                warn!("Ignoring unreadable cursor in {:?} ({e}): {:?}", self.path, content.trim());
                Ok(None)
            }
        }
    }

    fn save(&self, id: MentionId) -> Result<(), CursorError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        // Write to a sibling temp file, then rename over the target
        let tmp = self.tmp_path();
        let mut file = std::fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
        file.write_all(id.to_string().as_bytes()).map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;
        drop(file);
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;

        debug!("Cursor saved: {}", id);
        Ok(())
    }
}
