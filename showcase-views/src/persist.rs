//! Pending-queue persistence.
//!
//! Undelivered view ids are saved periodically so a restarted tracker can
//! pick them up again. The stored form is a JSON array of string ids under
//! the fixed key [`PENDING_VIEWS_KEY`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use showcase_core::{PersistError, WorkId};

/// Storage key of the persisted queue.
pub const PENDING_VIEWS_KEY: &str = "pendingViews";

/// Durable slot for the pending queue.
pub trait PendingStore: Send + Sync {
    /// Read the saved queue. `Ok(None)` when nothing is saved.
    fn load(&self) -> Result<Option<Vec<WorkId>>, PersistError>;

    /// Replace the saved queue.
    fn save(&self, ids: &[WorkId]) -> Result<(), PersistError>;

    /// Remove the saved queue. Clearing an empty slot succeeds.
    fn clear(&self) -> Result<(), PersistError>;
}

fn decode(raw: &str) -> Result<Vec<WorkId>, PersistError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| PersistError::Malformed {
            reason: e.to_string(),
        })?;
    serde_json::from_value(value).map_err(|e| PersistError::Malformed {
        reason: format!("expected an array of strings: {}", e),
    })
}

fn encode(ids: &[WorkId]) -> Result<String, PersistError> {
    serde_json::to_string(ids).map_err(|e| PersistError::Malformed {
        reason: e.to_string(),
    })
}

// ============================================================================
// FILE STORE
// ============================================================================

/// Stores the queue as `<dir>/pendingViews.json`.
#[derive(Debug, Clone)]
pub struct FilePendingStore {
    path: PathBuf,
}

impl FilePendingStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", PENDING_VIEWS_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

impl PendingStore for FilePendingStore {
    fn load(&self) -> Result<Option<Vec<WorkId>>, PersistError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => decode(&raw).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, ids: &[WorkId]) -> Result<(), PersistError> {
        let raw = encode(ids)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        // Write-then-rename keeps a reader from seeing a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// Process-local store; keeps the serialized form so decoding is exercised.
#[derive(Debug, Default)]
pub struct MemoryPendingStore {
    slot: Mutex<Option<String>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-serialized contents, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    /// Raw stored contents.
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl PendingStore for MemoryPendingStore {
    fn load(&self) -> Result<Option<Vec<WorkId>>, PersistError> {
        match self.raw() {
            Some(raw) => decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, ids: &[WorkId]) -> Result<(), PersistError> {
        let raw = encode(ids)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
