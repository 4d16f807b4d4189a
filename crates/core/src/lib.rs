pub mod catalog;
pub mod config;
pub mod granule;
pub mod jobs;
pub mod metrics;
pub mod pairing;
pub mod runner;
pub mod scanner;
pub mod store;
pub mod testing;
pub mod tracker;

pub use catalog::{
    parse_catalog_response, query_catalog, AsfCatalogClient, Boundary, BoundaryError,
    CatalogClient, CatalogError, CatalogQuery,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    TrackingMode,
};
pub use granule::{Granule, GranulePair, UnitKey, UnitStatus, WorkUnit};
pub use jobs::{Hyp3Client, JobService, JobServiceError, JobStatus};
pub use pairing::{build_sequential_pairs, ConnectivityReport, Gap, ProductSpan};
pub use runner::{IterationReport, Runner, RunnerError, RunnerSettings};
pub use scanner::{scan_pair_spans, scan_paired_products, scan_single_products};
pub use store::{merge_preserving_status, InMemoryStore, JsonFileStore, StoreError, WorkUnitStore};
pub use tracker::{job_name, Tracker, TrackerError, TrackerOptions, TrackerStatus};
