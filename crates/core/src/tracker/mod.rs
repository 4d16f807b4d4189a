//! Job tracking and reconciliation.
//!
//! The [`Tracker`] owns the set of work units for one area of interest. At
//! startup it reconciles three sources: the persisted snapshot, a fresh
//! catalog query and local products. After that every status change goes
//! through a transition method that persists the full set before returning.

mod engine;
mod types;

pub use engine::{job_name, Tracker};
pub use types::{TrackerOptions, TrackerStatus};

use thiserror::Error;

use crate::catalog::{BoundaryError, CatalogError};
use crate::store::StoreError;

/// Errors that can occur while tracking.
///
/// Invalid transitions are not errors; they are logged and ignored.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The startup catalog query failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The area of interest could not be loaded.
    #[error("Boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    /// Loading or saving the snapshot failed.
    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),
}
