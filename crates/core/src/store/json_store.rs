//! JSON snapshot stores.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::snapshot::{Snapshot, SNAPSHOT_VERSION};
use super::{StoreError, WorkUnitStore};
use crate::granule::WorkUnit;
use crate::metrics;

/// Default minimum spacing between two consecutive saves.
pub const DEFAULT_MIN_SAVE_INTERVAL: Duration = Duration::from_secs(1);

fn encode(units: &[WorkUnit]) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(&Snapshot::from_units(units))
        .map_err(|e| StoreError::Serialize(e.to_string()))
}

fn decode(path: &Path, bytes: &[u8]) -> Result<Vec<WorkUnit>, StoreError> {
    let snapshot: Snapshot = serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(snapshot.into_units())
}

/// File-backed snapshot store.
///
/// Saves go to a sibling temp file that is flushed to disk and then renamed
/// over the target, so a crash mid-save leaves the previous snapshot intact.
/// Consecutive saves are spaced at least `min_interval` apart.
pub struct JsonFileStore {
    path: PathBuf,
    min_interval: Duration,
    last_save: Mutex<Option<Instant>>,
}

impl JsonFileStore {
    /// Create a store writing to `path` with the default save spacing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_interval: DEFAULT_MIN_SAVE_INTERVAL,
            last_save: Mutex::new(None),
        }
    }

    /// Override the minimum spacing between saves.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("snapshot");
        self.path.with_extension(format!("{}.tmp", ext))
    }

    fn write_atomically(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp_path = self.temp_path();
        let mut file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        // Make the rename itself durable. Not every platform can open a directory.
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

impl WorkUnitStore for JsonFileStore {
    fn save(&self, units: &[WorkUnit]) -> Result<(), StoreError> {
        let mut last = self
            .last_save
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Sync callers that did not wait out `save_delay` are held here.
        let wait = remaining(*last, self.min_interval);
        if !wait.is_zero() {
            debug!("Snapshot save spacing: blocking for {:?}", wait);
            std::thread::sleep(wait);
        }

        let bytes = encode(units)?;
        self.write_atomically(&bytes)?;
        *last = Some(Instant::now());

        metrics::SNAPSHOT_SAVES.inc();
        debug!("Saved {} work units to {:?}", units.len(), self.path);
        Ok(())
    }

    fn load(&self) -> Result<Vec<WorkUnit>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot at {:?}, starting cold", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        decode(&self.path, &bytes)
    }

    fn save_delay(&self) -> Duration {
        let last = self
            .last_save
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        remaining(*last, self.min_interval)
    }
}

fn remaining(last_save: Option<Instant>, min_interval: Duration) -> Duration {
    last_save.map_or(Duration::ZERO, |t| min_interval.saturating_sub(t.elapsed()))
}

/// In-memory snapshot store (useful for testing).
///
/// Still round-trips through the serialized schema, so it exercises the
/// same encoding as the file store.
#[derive(Default)]
pub struct InMemoryStore {
    snapshot: Mutex<Option<Vec<u8>>>,
    saves: Mutex<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves performed so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkUnitStore for InMemoryStore {
    fn save(&self, units: &[WorkUnit]) -> Result<(), StoreError> {
        let bytes = encode(units)?;
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    fn load(&self) -> Result<Vec<WorkUnit>, StoreError> {
        match self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
        {
            Some(bytes) => decode(Path::new("<memory>"), bytes),
            None => Ok(Vec::new()),
        }
    }
}
