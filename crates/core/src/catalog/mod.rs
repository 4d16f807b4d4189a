//! Remote scene catalog: querying, parsing, and reconciliation.
//!
//! The catalog is queried exactly once per tracker startup. Any failure
//! here is fatal to startup; retrying is up to whoever runs the tracker.

mod asf;
mod boundary;
mod parse;
mod query;

pub use asf::{AsfCatalogClient, DEFAULT_ASF_SEARCH_URL};
pub use boundary::{Boundary, BoundaryError};
pub use parse::parse_catalog_response;
pub use query::{normalize_date, CatalogQuery, CATALOG_DATE_FORMAT};

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::granule::Granule;
use crate::metrics;

/// Errors that can occur when querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// A date parameter could not be understood.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Failed to read or write the catalog snapshot.
    #[error("Catalog snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for catalog search backends.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Run the search and return the raw response body.
    async fn fetch(&self, query: &CatalogQuery) -> Result<String, CatalogError>;
}

/// Runs one catalog search and parses the result.
///
/// When `snapshot_path` is given, the raw response is written there for
/// inspection; it is never read back.
pub async fn query_catalog(
    client: &dyn CatalogClient,
    query: &CatalogQuery,
    snapshot_path: Option<&Path>,
) -> Result<Vec<Granule>, CatalogError> {
    info!(
        "Querying catalog (orbit: {:?}, start: {:?}, end: {:?})",
        query.relative_orbit, query.start, query.end
    );
    let started = Instant::now();
    let result = client.fetch(query).await;
    metrics::CATALOG_QUERY_DURATION
        .with_label_values(&[if result.is_ok() { "success" } else { "failed" }])
        .observe(started.elapsed().as_secs_f64());
    let body = result?;

    if let Some(path) = snapshot_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &body).await?;
        debug!("Wrote catalog snapshot to {:?}", path);
    }

    let granules = parse_catalog_response(&body)?;
    info!("Catalog returned {} scenes", granules.len());
    Ok(granules)
}

/// Removes a catalog snapshot left by a previous run, so startup always re-queries.
pub async fn remove_stale_snapshot(path: &Path) -> Result<(), CatalogError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed stale catalog snapshot {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Appends fetched scenes whose id is not yet known. Existing entries are
/// left untouched. Returns how many were added.
pub fn reconcile_granules(known: &mut Vec<Granule>, fetched: Vec<Granule>) -> usize {
    let mut ids: HashSet<String> = known.iter().map(|g| g.id.clone()).collect();
    let before = known.len();
    for granule in fetched {
        if ids.insert(granule.id.clone()) {
            known.push(granule);
        }
    }
    known.len() - before
}
