use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "SCENETRACK_CONFIG";

/// Config file used when `SCENETRACK_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Load configuration from file with environment variable overrides.
///
/// Overrides use `SCENETRACK_<SECTION>__<KEY>`, e.g.
/// `SCENETRACK_TRACKER__SUBMISSION_CEILING=20`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("SCENETRACK_").ignore(&["CONFIG"]).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
