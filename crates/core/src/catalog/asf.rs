//! ASF search API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::{CatalogClient, CatalogError, CatalogQuery};
use crate::config::CatalogConfig;

/// Default ASF search endpoint.
pub const DEFAULT_ASF_SEARCH_URL: &str = "https://api.daac.asf.alaska.edu/services/search/param";

/// Catalog client for the ASF parameter search API.
pub struct AsfCatalogClient {
    client: Client,
    url: String,
}

impl AsfCatalogClient {
    /// Create a new client from the catalog configuration.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(format!("scenetrack/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl CatalogClient for AsfCatalogClient {
    async fn fetch(&self, query: &CatalogQuery) -> Result<String, CatalogError> {
        let params = query.params();
        debug!("ASF search: url={}, params={:?}", self.url, params);

        let response = self.client.get(&self.url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("ASF search failed with status {}", status);
            return Err(CatalogError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response.text().await?)
    }
}
