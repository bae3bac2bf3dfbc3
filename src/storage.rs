//! Storage backends for the clock state
//!
//! ## Table of Contents
//! - **ClockStore**: Trait for clock state persistence
//! - **FileStore**: TOML file on disk, replaced atomically on every write
//! - **MemoryStore**: In-memory store for tests and embedding
//!
//! Both backends share the same text format:
//!
//! ```toml
//! [time]
//! ticks = 0
//! totalDays = 0
//! year = 1
//! month = 1
//! day = 1
//! ```

use crate::error::{Result, TimeSyncError};
use crate::types::ClockState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// File name of the persisted state inside the data directory
pub const STATE_FILE_NAME: &str = "time.toml";

/// Trait for clock state storage backends
pub trait ClockStore: Send + Sync {
    /// Read the persisted state. `Ok(None)` means nothing has been stored yet.
    fn read(&self) -> Result<Option<ClockState>>;

    /// Overwrite the persisted state
    fn write(&self, state: &ClockState) -> Result<()>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Type alias for a shared store
pub type BoxedClockStore = Arc<dyn ClockStore>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    time: ClockState,
}

/// Render a state in the persisted text format
pub fn encode_state(state: &ClockState) -> Result<String> {
    Ok(toml::to_string(&StateDocument { time: *state })?)
}

/// Parse the persisted text format. Missing keys take their default value.
pub fn decode_state(contents: &str) -> Result<ClockState> {
    let doc: StateDocument = toml::from_str(contents)?;
    Ok(doc.time)
}

/// File-based persistent storage
///
/// Writes go to a sibling temp file which then replaces the real one, so a
/// crash mid-write leaves the previous state intact.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Store at an explicit file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!(path = %path.display(), "File store opened");
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Store at `<dir>/time.toml`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(STATE_FILE_NAME))
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| STATE_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ClockStore for FileStore {
    fn read(&self) -> Result<Option<ClockState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| TimeSyncError::storage(format!("Failed to read state: {}", e)))?;
        let state = decode_state(&contents)
            .map_err(|e| TimeSyncError::storage(format!("Failed to parse state: {}", e)))?;

        Ok(Some(state))
    }

    fn write(&self, state: &ClockState) -> Result<()> {
        let contents = encode_state(state)?;
        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| TimeSyncError::storage(format!("Failed to create dir: {}", e)))?;
            }
        }

        let tmp = self.temp_path();
        std::fs::write(&tmp, contents)
            .map_err(|e| TimeSyncError::storage(format!("Failed to write state: {}", e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| TimeSyncError::storage(format!("Failed to replace state: {}", e)))?;

        debug!(path = %self.path.display(), ticks = state.ticks, "State flushed");
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// In-memory store
///
/// Keeps the encoded text rather than the struct so reads go through the
/// same parser as the file store. Writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryStore {
    contents: Mutex<Option<String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with raw text
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Raw text currently stored
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ClockStore for MemoryStore {
    fn read(&self) -> Result<Option<ClockState>> {
        match self.contents.lock().as_deref() {
            Some(text) => decode_state(text)
                .map(Some)
                .map_err(|e| TimeSyncError::storage(format!("Failed to parse state: {}", e))),
            None => Ok(None),
        }
    }

    fn write(&self, state: &ClockState) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TimeSyncError::storage("write rejected"));
        }
        let text = encode_state(state)?;
        *self.contents.lock() = Some(text);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClockState {
        ClockState {
            ticks: 18_020,
            total_days: 42,
            year: 3,
            month: 7,
            day: 12,
        }
    }

    #[test]
    fn test_encoded_layout() {
        let text = encode_state(&ClockState::default()).unwrap();
        assert!(text.starts_with("[time]"));
        assert!(text.contains("ticks = 0"));
        assert!(text.contains("totalDays = 0"));
        assert!(text.contains("year = 1"));
        assert!(text.contains("month = 1"));
        assert!(text.contains("day = 1"));
    }

    #[test]
    fn test_decode_missing_keys_default() {
        let state = decode_state("[time]\nticks = 400\n").unwrap();
        assert_eq!(state.ticks, 400);
        assert_eq!(state.total_days, 0);
        assert_eq!((state.day, state.month, state.year), (1, 1, 1));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode_state("[time\nticks = ").is_err());
        assert!(decode_state("[time]\nticks = \"noon\"\n").is_err());
    }

    #[test]
    fn test_file_store_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_file_store_creates_dir_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path().join("plugins").join("TimeSync"));

        store.write(&sample()).unwrap();
        assert!(store.path().exists());
        assert!(!store.temp_path().exists());
        assert_eq!(store.read().unwrap(), Some(sample()));
    }

    #[test]
    fn test_file_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());

        store.write(&ClockState::default()).unwrap();
        store.write(&sample()).unwrap();
        assert_eq!(store.read().unwrap(), Some(sample()));
    }

    #[test]
    fn test_file_store_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        std::fs::write(store.path(), "not toml at all [").unwrap();

        let err = store.read().unwrap_err();
        assert!(matches!(err, TimeSyncError::Storage(_)));
    }

    #[test]
    fn test_memory_store_failures() {
        let store = MemoryStore::new();
        store.write(&sample()).unwrap();

        store.set_fail_writes(true);
        assert!(store.write(&ClockState::default()).is_err());
        assert_eq!(store.read().unwrap(), Some(sample()));

        store.set_fail_writes(false);
        store.write(&ClockState::default()).unwrap();
        assert_eq!(store.read().unwrap(), Some(ClockState::default()));
    }
}
