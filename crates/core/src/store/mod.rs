//! Durable storage for the tracked work unit set.

mod json_store;
mod merge;
mod snapshot;

pub use json_store::{InMemoryStore, JsonFileStore};
pub use merge::merge_preserving_status;
pub use snapshot::SNAPSHOT_VERSION;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::granule::WorkUnit;

/// Errors that can occur while saving or loading snapshots.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Trait for work unit snapshot backends.
///
/// A save replaces the whole set. A reader never observes a partially
/// written snapshot: it sees the previous one or the new one.
pub trait WorkUnitStore: Send + Sync {
    /// Persist the full set, overwriting any previous snapshot.
    fn save(&self, units: &[WorkUnit]) -> Result<(), StoreError>;

    /// Load the last saved set. A missing snapshot yields an empty set.
    fn load(&self) -> Result<Vec<WorkUnit>, StoreError>;

    /// How long a save issued now would have to wait for its spacing.
    ///
    /// Async callers await this before saving so that `save` never has to
    /// block the thread.
    fn save_delay(&self) -> Duration {
        Duration::ZERO
    }
}
