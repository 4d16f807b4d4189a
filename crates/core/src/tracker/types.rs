//! Tracker options and status report.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::{TrackerConfig, TrackingMode};
use crate::granule::{UnitStatus, WorkUnit};

/// How a tracker finds its units and products.
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub mode: TrackingMode,
    /// Directory scanned for finished products.
    pub scan_dir: PathBuf,
    /// Where the raw catalog response is kept, if anywhere.
    pub catalog_snapshot: Option<PathBuf>,
}

impl TrackerOptions {
    pub fn new(mode: TrackingMode, scan_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            scan_dir: scan_dir.into(),
            catalog_snapshot: None,
        }
    }

    pub fn with_catalog_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_snapshot = Some(path.into());
        self
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.mode, config.scan_dir()).with_catalog_snapshot(&config.catalog_snapshot)
    }
}

/// Unit counts at a point in time.
///
/// `unsubmitted` includes units whose status is still `unknown`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStatus {
    pub mode: TrackingMode,
    pub total: usize,
    pub unsubmitted: usize,
    pub submitted: usize,
    pub localized: usize,
    pub failed: usize,
    pub blacklisted: usize,
    pub complete: bool,
}

impl TrackerStatus {
    pub fn from_units(mode: TrackingMode, units: &[WorkUnit]) -> Self {
        let mut status = Self {
            mode,
            total: units.len(),
            ..Self::default()
        };
        for unit in units {
            match unit.status() {
                UnitStatus::Unknown | UnitStatus::Unsubmitted => status.unsubmitted += 1,
                UnitStatus::Submitted => status.submitted += 1,
                UnitStatus::Localized => status.localized += 1,
                UnitStatus::Failed => status.failed += 1,
                UnitStatus::Blacklisted => status.blacklisted += 1,
            }
        }
        status.complete = status.unsubmitted == 0 && status.submitted == 0;
        status
    }
}

impl std::fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} units: {} unsubmitted, {} submitted, {} localized, {} failed, {} blacklisted",
            self.total,
            self.unsubmitted,
            self.submitted,
            self.localized,
            self.failed,
            self.blacklisted
        )
    }
}
