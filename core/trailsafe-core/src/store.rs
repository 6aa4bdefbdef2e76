//! Shared key/value store visible to all three processes.
//!
//! The main app, live activity and widget have no shared address space; the
//! only thing they share is this store plus a best-effort wake signal. The
//! backing storage is crash-atomic per key, and nothing here assumes
//! read-after-write consistency *across* processes: every higher-level
//! protocol (snapshot, journal) tolerates an observer seeing a stale value.
//!
//! # Writer Discipline
//!
//! Each key has effectively one writer role. The trip snapshot is written
//! only by the main process; a pending-action key is written by whichever
//! context originates the action and resolved only by the main process.
//!
//! # Defensive Reads
//!
//! Another process may be mid-rollout on a different build version, so reads
//! never hard-fail: corrupt bytes, wrong schema versions and missing keys all
//! decode to `None` with a logged warning.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::config;
use crate::error::{Result, TripError};
use crate::trip::TripSnapshot;

/// Key holding the current trip snapshot blob.
pub const TRIP_SNAPSHOT_KEY: &str = "trip-snapshot";
/// Key holding the widget display mode flag.
pub const DISPLAY_MODE_KEY: &str = "display-mode";
/// Key holding the target environment flag.
pub const ENVIRONMENT_KEY: &str = "environment";

/// Snapshot blob schema version. Bump on incompatible layout changes.
const SNAPSHOT_VERSION: u32 = 1;

/// Synchronous per-key byte store shared by all three processes.
///
/// All operations are safe to call concurrently from different processes;
/// callers must not race `set` on the same key from the same process without
/// external mutual exclusion.
pub trait SharedStore {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, bytes: &[u8]) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-per-key store under a shared directory (the App-Group-style
/// container). Writes go through a temp file + rename so a process killed
/// mid-write never leaves a torn value.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    /// Opens the store at the default shared directory, creating it if needed.
    pub fn open_default() -> Result<Self> {
        let dir = config::shared_dir()?;
        fs::create_dir_all(&dir)
            .map_err(|e| TripError::io(format!("Creating shared dir {}", dir.display()), e))?;
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(sanitize_key(key))
    }
}

/// Maps a store key to a safe file name. Keys are dot/dash separated ASCII;
/// anything else collapses to a dash.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

impl SharedStore for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match fs::read(self.key_path(key)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read shared store key");
                None
            }
        }
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| TripError::io(format!("Creating shared dir {}", self.dir.display()), e))?;
        let mut temp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| TripError::io(format!("Creating temp file for key {key}"), e))?;
        temp.write_all(bytes)
            .map_err(|e| TripError::io(format!("Writing temp file for key {key}"), e))?;
        temp.flush()
            .map_err(|e| TripError::io(format!("Flushing temp file for key {key}"), e))?;
        temp.persist(self.key_path(key))
            .map_err(|e| TripError::io(format!("Persisting key {key}"), e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TripError::io(format!("Removing key {key}"), e)),
        }
    }
}

/// In-memory store for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// Versioned wrapper around the stored snapshot blob.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    trip: TripSnapshot,
}

/// Loads the current trip snapshot, or `None` when absent, corrupt or from
/// an incompatible schema version. A `None` here is the "no active trip"
/// presentation, never an error.
pub fn load_snapshot<S: SharedStore + ?Sized>(store: &S) -> Option<TripSnapshot> {
    let bytes = store.get(TRIP_SNAPSHOT_KEY)?;
    match serde_json::from_slice::<SnapshotFile>(&bytes) {
        Ok(file) if file.version == SNAPSHOT_VERSION => Some(file.trip),
        Ok(file) => {
            warn!(
                version = file.version,
                expected = SNAPSHOT_VERSION,
                "Unsupported snapshot version, treating as no active trip"
            );
            None
        }
        Err(e) => {
            warn!(error = %e, "Failed to decode trip snapshot, treating as no active trip");
            None
        }
    }
}

/// Persists the trip snapshot. Main process only.
pub fn save_snapshot<S: SharedStore + ?Sized>(store: &S, trip: &TripSnapshot) -> Result<()> {
    let file = SnapshotFile {
        version: SNAPSHOT_VERSION,
        trip: trip.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&file)
        .map_err(|e| TripError::json("Encoding trip snapshot", e))?;
    store.set(TRIP_SNAPSHOT_KEY, &bytes)
}

/// Clears the trip snapshot so all surfaces fall back to "no active trip".
pub fn clear_snapshot<S: SharedStore + ?Sized>(store: &S) -> Result<()> {
    store.remove(TRIP_SNAPSHOT_KEY)
}
