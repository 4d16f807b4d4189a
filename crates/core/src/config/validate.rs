use super::{types::Config, ConfigError};
use crate::catalog::normalize_date;

/// Validate configuration
/// Currently validates:
/// - Catalog boundary exists (enforced by serde)
/// - Catalog dates parse and are in order
/// - Submission ceiling and poll interval are not 0
/// - Job name prefix is not empty
/// - Server port is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let parse = |field: &str, value: &Option<String>| {
        value
            .as_deref()
            .map(normalize_date)
            .transpose()
            .map_err(|e| ConfigError::ValidationError(format!("catalog.{}: {}", field, e)))
    };
    let start = parse("start", &config.catalog.start)?;
    let end = parse("end", &config.catalog.end)?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ConfigError::ValidationError(
                "catalog.end is before catalog.start".to_string(),
            ));
        }
    }

    if config.tracker.submission_ceiling == 0 {
        return Err(ConfigError::ValidationError(
            "tracker.submission_ceiling cannot be 0".to_string(),
        ));
    }

    if config.jobs.job_name_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "jobs.job_name_prefix cannot be empty".to_string(),
        ));
    }

    if config.runner.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "runner.poll_interval_secs cannot be 0".to_string(),
        ));
    }

    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CatalogConfig, JobsConfig, RunnerConfig, ServerConfig, TrackerConfig,
    };
    use std::net::IpAddr;

    fn valid_config() -> Config {
        Config {
            catalog: CatalogConfig::with_boundary("aoi.geojson"),
            tracker: TrackerConfig::default(),
            jobs: JobsConfig::default(),
            runner: RunnerConfig::default(),
            server: ServerConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..valid_config()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_ceiling_fails() {
        let mut config = valid_config();
        config.tracker.submission_ceiling = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_poll_interval_fails() {
        let mut config = valid_config();
        config.runner.poll_interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_dates() {
        let mut config = valid_config();
        config.catalog.start = Some("2021-01-01".to_string());
        config.catalog.end = Some("2021-06-01T00:00:00Z".to_string());
        assert!(validate_config(&config).is_ok());

        config.catalog.end = Some("2020-12-31".to_string());
        assert!(validate_config(&config).is_err());

        config.catalog.end = Some("last tuesday".to_string());
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("catalog.end"));
    }

    #[test]
    fn test_validate_empty_prefix_fails() {
        let mut config = valid_config();
        config.jobs.job_name_prefix = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }
}
