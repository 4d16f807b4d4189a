//! Mock catalog client for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::fixtures;
use crate::catalog::{CatalogClient, CatalogError, CatalogQuery};
use crate::granule::Granule;

#[derive(Debug, Clone)]
enum Reply {
    Body(String),
    Fail { status: u16, message: String },
}

/// Mock implementation of the CatalogClient trait.
///
/// Serves one canned response (or failure) and records the queries it saw.
#[derive(Debug)]
pub struct MockCatalogClient {
    reply: Mutex<Reply>,
    queries: Mutex<Vec<CatalogQuery>>,
    fetches: AtomicUsize,
}

impl MockCatalogClient {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            queries: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Serve a well-formed response listing `granules`.
    pub fn with_granules(granules: Vec<Granule>) -> Self {
        Self::with_reply(Reply::Body(fixtures::catalog_response_json(&granules)))
    }

    /// Serve an arbitrary response body.
    pub fn with_body(body: &str) -> Self {
        Self::with_reply(Reply::Body(body.to_string()))
    }

    /// Fail every query with a 503.
    pub fn failing() -> Self {
        Self::with_reply(Reply::Fail {
            status: 503,
            message: "catalog unavailable".to_string(),
        })
    }

    /// Replace the served scenes.
    pub fn set_granules(&self, granules: &[Granule]) {
        *self.reply.lock().unwrap() = Reply::Body(fixtures::catalog_response_json(granules));
    }

    /// Number of queries issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// The most recent query, if any.
    pub fn last_query(&self) -> Option<CatalogQuery> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    async fn fetch(&self, query: &CatalogQuery) -> Result<String, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());

        match self.reply.lock().unwrap().clone() {
            Reply::Body(body) => Ok(body),
            Reply::Fail { status, message } => Err(CatalogError::ApiError { status, message }),
        }
    }
}
