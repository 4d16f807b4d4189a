use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::catalog::DEFAULT_ASF_SEARCH_URL;
use crate::jobs::DEFAULT_HYP3_API_URL;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Where finished job outputs are downloaded. Falls back to the
    /// directory the scanner reads for the configured mode.
    pub fn download_dir(&self) -> PathBuf {
        self.runner
            .download_dir
            .clone()
            .unwrap_or_else(|| self.tracker.scan_dir())
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Catalog search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Search endpoint
    #[serde(default = "default_catalog_url")]
    pub url: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_polarization")]
    pub polarization: String,
    #[serde(default = "default_processing_level")]
    pub processing_level: String,
    /// GeoJSON file with the area of interest (WGS84)
    pub boundary_path: PathBuf,
    /// Earliest acquisition, any format `normalize_date` accepts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_orbit: Option<u32>,
    /// Request timeout in seconds (default: 120)
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

fn default_catalog_url() -> String {
    DEFAULT_ASF_SEARCH_URL.to_string()
}

fn default_platform() -> String {
    "S1".to_string()
}

fn default_polarization() -> String {
    "HH".to_string()
}

fn default_processing_level() -> String {
    "SLC".to_string()
}

fn default_catalog_timeout() -> u64 {
    120
}

impl CatalogConfig {
    /// Defaults for everything but the boundary.
    pub fn with_boundary(boundary_path: impl Into<PathBuf>) -> Self {
        Self {
            url: default_catalog_url(),
            platform: default_platform(),
            polarization: default_polarization(),
            processing_level: default_processing_level(),
            boundary_path: boundary_path.into(),
            start: None,
            end: None,
            relative_orbit: None,
            timeout_secs: default_catalog_timeout(),
        }
    }
}

/// What kind of work unit is tracked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// One job per scene
    #[default]
    Single,
    /// One job per pair of date-adjacent scenes
    Pair,
}

/// Tracker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub mode: TrackingMode,
    /// Directory holding single-scene products
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory holding pair products (default: `output_dir`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_dir: Option<PathBuf>,
    /// Persisted work-unit snapshot
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Raw catalog response, rewritten on every startup
    #[serde(default = "default_catalog_snapshot")]
    pub catalog_snapshot: PathBuf,
    /// Maximum number of jobs in flight (default: 40)
    #[serde(default = "default_submission_ceiling")]
    pub submission_ceiling: usize,
    /// Minimum spacing between snapshot saves in milliseconds (default: 1000)
    #[serde(default = "default_min_save_interval")]
    pub min_save_interval_ms: u64,
}

impl TrackerConfig {
    pub fn pair_dir(&self) -> PathBuf {
        self.pair_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.clone())
    }

    /// Directory the scanner reads in the configured mode.
    pub fn scan_dir(&self) -> PathBuf {
        match self.mode {
            TrackingMode::Single => self.output_dir.clone(),
            TrackingMode::Pair => self.pair_dir(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::default(),
            output_dir: default_output_dir(),
            pair_dir: None,
            state_file: default_state_file(),
            catalog_snapshot: default_catalog_snapshot(),
            submission_ceiling: default_submission_ceiling(),
            min_save_interval_ms: default_min_save_interval(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("products/RTC")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("products/tracker-state.json")
}

fn default_catalog_snapshot() -> PathBuf {
    PathBuf::from("products/asf-results.json")
}

fn default_submission_ceiling() -> usize {
    40
}

fn default_min_save_interval() -> u64 {
    1000
}

/// Job service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token for the job API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Job names are `<prefix>_<unit key>` (default: "job")
    #[serde(default = "default_job_name_prefix")]
    pub job_name_prefix: String,
    /// Match scenes to the DEM before terrain correction (default: true)
    #[serde(default = "default_dem_matching")]
    pub dem_matching: bool,
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_jobs_timeout")]
    pub timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_token: None,
            job_name_prefix: default_job_name_prefix(),
            dem_matching: default_dem_matching(),
            timeout_secs: default_jobs_timeout(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_HYP3_API_URL.to_string()
}

fn default_job_name_prefix() -> String {
    "job".to_string()
}

fn default_dem_matching() -> bool {
    true
}

fn default_jobs_timeout() -> u64 {
    60
}

/// Poll loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Seconds between poll iterations (default: 60)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Where finished outputs are downloaded (default: the scan directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            download_dir: None,
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub catalog: CatalogConfig,
    pub tracker: TrackerConfig,
    pub jobs: SanitizedJobsConfig,
    pub runner: RunnerConfig,
    pub server: ServerConfig,
}

/// Sanitized jobs config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJobsConfig {
    pub api_url: String,
    pub api_token_configured: bool,
    pub job_name_prefix: String,
    pub dem_matching: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            catalog: config.catalog.clone(),
            tracker: config.tracker.clone(),
            jobs: SanitizedJobsConfig {
                api_url: config.jobs.api_url.clone(),
                api_token_configured: config
                    .jobs
                    .api_token
                    .as_ref()
                    .is_some_and(|t| !t.is_empty()),
                job_name_prefix: config.jobs.job_name_prefix.clone(),
                dem_matching: config.jobs.dem_matching,
                timeout_secs: config.jobs.timeout_secs,
            },
            runner: config.runner.clone(),
            server: config.server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[catalog]
boundary_path = "aoi.geojson"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.catalog.platform, "S1");
        assert_eq!(config.catalog.url, DEFAULT_ASF_SEARCH_URL);
        assert_eq!(config.tracker.mode, TrackingMode::Single);
        assert_eq!(config.tracker.submission_ceiling, 40);
        assert_eq!(config.jobs.job_name_prefix, "job");
        assert!(config.jobs.dem_matching);
        assert_eq!(config.runner.poll_interval_secs, 60);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_deserialize_missing_boundary_fails() {
        let toml = r#"
[catalog]
platform = "S1"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_pair_dir_defaults_to_output_dir() {
        let mut tracker = TrackerConfig {
            mode: TrackingMode::Pair,
            output_dir: PathBuf::from("/products"),
            ..TrackerConfig::default()
        };
        assert_eq!(tracker.scan_dir(), PathBuf::from("/products"));

        tracker.pair_dir = Some(PathBuf::from("/products/autorift"));
        assert_eq!(tracker.scan_dir(), PathBuf::from("/products/autorift"));
    }

    #[test]
    fn test_download_dir_follows_mode() {
        let toml = r#"
[catalog]
boundary_path = "aoi.geojson"

[tracker]
mode = "pair"
output_dir = "/products/RTC"
pair_dir = "/products/pairs"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.download_dir(), PathBuf::from("/products/pairs"));
    }

    #[test]
    fn test_sanitized_config_hides_token() {
        let toml = r#"
[catalog]
boundary_path = "aoi.geojson"

[jobs]
api_token = "secret-token"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.jobs.api_token_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-token"));
    }
}
