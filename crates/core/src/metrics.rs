//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Tracker (units by status, submissions)
//! - Job service (terminal outcomes)
//! - Catalog queries and snapshot persistence

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts};

use crate::granule::UnitStatus;

// =============================================================================
// Tracker Metrics
// =============================================================================

/// Tracked work units by status.
pub static UNITS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("scenetrack_units", "Tracked work units by status"),
        &["status"], // "unsubmitted" (includes unknown), "submitted", "localized", "failed", "blacklisted"
    )
    .unwrap()
});

/// Jobs submitted total.
pub static SUBMISSIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scenetrack_submissions_total",
        "Total jobs submitted to the job service",
    )
    .unwrap()
});

/// Job outcomes total by result.
pub static JOB_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scenetrack_job_outcomes_total", "Finished jobs by result"),
        &["result"], // "localized", "failed"
    )
    .unwrap()
});

// =============================================================================
// Catalog & Persistence Metrics
// =============================================================================

/// Catalog query duration in seconds.
pub static CATALOG_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scenetrack_catalog_query_duration_seconds",
            "Duration of catalog queries",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Snapshot saves total.
pub static SNAPSHOT_SAVES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scenetrack_snapshot_saves_total",
        "Total work-unit snapshots written",
    )
    .unwrap()
});

/// Sets the status gauge from a full set of counts.
pub fn set_unit_counts(counts: &[(UnitStatus, usize)]) {
    for (status, count) in counts {
        UNITS_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(*count as i64);
    }
}

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Tracker
        Box::new(UNITS_BY_STATUS.clone()),
        Box::new(SUBMISSIONS_TOTAL.clone()),
        Box::new(JOB_OUTCOMES.clone()),
        // Catalog & persistence
        Box::new(CATALOG_QUERY_DURATION.clone()),
        Box::new(SNAPSHOT_SAVES.clone()),
    ]
}
