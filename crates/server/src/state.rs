use scenetrack_core::{Config, SanitizedConfig, TrackerStatus};
use tokio::sync::watch;

/// Shared application state
pub struct AppState {
    config: Config,
    status: watch::Receiver<TrackerStatus>,
}

impl AppState {
    pub fn new(config: Config, status: watch::Receiver<TrackerStatus>) -> Self {
        Self { config, status }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Latest status published by the poll loop.
    pub fn status(&self) -> TrackerStatus {
        self.status.borrow().clone()
    }
}
