//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! allowing tracker and runner tests without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use scenetrack_core::testing::{fixtures, MockCatalogClient, MockJobService};
//!
//! let catalog = MockCatalogClient::with_granules(fixtures::granule_series(5));
//! let jobs = MockJobService::new();
//! ```

mod mock_catalog;
mod mock_job_service;

pub use mock_catalog::MockCatalogClient;
pub use mock_job_service::{MockJobService, RecordedSubmission};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use crate::granule::Granule;

    /// Revisit interval of the fixture series, in days.
    pub const REVISIT_DAYS: i64 = 12;

    /// Create a scene name for a date and 4-character id.
    pub fn scene_name(date: chrono::DateTime<Utc>, id: &str) -> String {
        let stamp = date.format("%Y%m%dT%H%M%S");
        let end = (date + Duration::seconds(27)).format("%Y%m%dT%H%M%S");
        format!("S1A_IW_SLC__1SSH_{}_{}_030000_036F1A_{}", stamp, end, id)
    }

    /// Create `n` scenes acquired every 12 days from 2020-01-01 12:00 UTC,
    /// with ids `A000`, `A001`, ...
    pub fn granule_series(n: usize) -> Vec<Granule> {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let date = start + Duration::days(REVISIT_DAYS * i as i64);
                Granule::new(scene_name(date, &format!("A{:03}", i)), date)
            })
            .collect()
    }

    /// Create a catalog response body listing `granules` in one batch.
    pub fn catalog_response_json(granules: &[Granule]) -> String {
        let batch: Vec<_> = granules
            .iter()
            .map(|g| {
                json!({
                    "granuleName": g.name,
                    "sceneDate": g.scene_date.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
                    "platform": "Sentinel-1A",
                })
            })
            .collect();
        json!([batch]).to_string()
    }

    /// Filename of the pair product built from two scenes.
    pub fn pair_product_filename(primary: &Granule, secondary: &Granule) -> String {
        format!("{}{}.nc", primary.name, secondary.name)
    }

    /// Processing log content naming the source scene.
    pub fn processing_log(scene_name: &str) -> String {
        format!(
            "Processing started\nSAFE directory      : {}.SAFE\nProcessing finished\n",
            scene_name
        )
    }

    /// Directory name of the single-scene product for a scene.
    pub fn single_product_entry(granule: &Granule) -> String {
        format!(
            "S1A_IW_{}_HHP_RTC30_G_gpuned_{}",
            granule.scene_date.format("%Y%m%dT%H%M%S"),
            granule.id
        )
    }

    /// Write a single-scene product with its processing log into `dir`.
    pub fn write_single_product(dir: &std::path::Path, granule: &Granule) {
        let entry = single_product_entry(granule);
        let product = dir.join(&entry);
        std::fs::create_dir_all(&product).unwrap();
        std::fs::write(
            product.join(format!("{}.log", entry)),
            processing_log(&granule.name),
        )
        .unwrap();
    }
}
