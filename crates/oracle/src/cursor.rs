//! Scan cursor: the last fully-scanned source block, and where it is persisted.
//!
//! The cursor is the only state the oracle owns. Absence or corruption of the persisted value
//! means "no prior state"; the scanner then seeds from the current head.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Cursor: last fully-scanned block. `-1` means nothing scanned yet (fresh chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScanCursor {
    pub last_scanned_block: i64,
}

impl ScanCursor {
    pub fn new(last_scanned_block: i64) -> Self {
        Self { last_scanned_block }
    }

    /// First-run cursor: start just below the current head, skipping historical backlog.
    pub fn seeded(chain_head: u64) -> Self {
        Self::new(i64::try_from(chain_head).unwrap_or(i64::MAX) - 1)
    }
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor I/O at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cursor encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cursor {0} is below -1")]
    OutOfRange(i64),
}

/// Durable single-value persistence for the cursor.
pub trait CursorStore: Send + Sync {
    /// Last saved block, or `None` if nothing usable is stored.
    fn load(&self) -> Option<i64>;

    fn save(&self, last_scanned_block: i64) -> Result<(), CursorError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorFile {
    last_scanned_block: i64,
}

/// JSON file store: `{"last_scanned_block": <n>}`. Writes go through a temporary sibling that
/// is renamed into place, so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
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

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn io_error(&self, source: std::io::Error) -> CursorError {
        CursorError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Option<i64> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "cursor file not found");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), reason = %e, "cursor file unreadable");
                return None;
            }
        };
        match serde_json::from_str::<CursorFile>(&text) {
            Ok(f) if f.last_scanned_block >= -1 => Some(f.last_scanned_block),
            Ok(f) => {
                tracing::warn!(
                    path = %self.path.display(),
                    value = f.last_scanned_block,
                    "cursor out of range, ignoring"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    reason = %e,
                    "cursor file invalid, ignoring"
                );
                None
            }
        }
    }

    fn save(&self, last_scanned_block: i64) -> Result<(), CursorError> {
        if last_scanned_block < -1 {
            return Err(CursorError::OutOfRange(last_scanned_block));
        }
        let body = serde_json::to_vec(&CursorFile { last_scanned_block })?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, body).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// In-memory store (no disk persistence). Keeps every saved value for inspection.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    saved: Mutex<Vec<i64>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with a prior value, as if from an earlier run.
    pub fn with_value(last_scanned_block: i64) -> Self {
        Self {
            saved: Mutex::new(vec![last_scanned_block]),
        }
    }

    /// Every value saved so far, oldest first.
    pub fn history(&self) -> Vec<i64> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Option<i64> {
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .copied()
    }

    fn save(&self, last_scanned_block: i64) -> Result<(), CursorError> {
        if last_scanned_block < -1 {
            return Err(CursorError::OutOfRange(last_scanned_block));
        }
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(last_scanned_block);
        Ok(())
    }
}

impl<T: CursorStore + ?Sized> CursorStore for std::sync::Arc<T> {
    fn load(&self) -> Option<i64> {
        (**self).load()
    }

    fn save(&self, last_scanned_block: i64) -> Result<(), CursorError> {
        (**self).save(last_scanned_block)
    }
}
