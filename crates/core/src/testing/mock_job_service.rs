//! Mock job service for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::granule::{UnitKey, WorkUnit};
use crate::jobs::{JobService, JobServiceError, JobStatus};

/// A recorded submission for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    pub key: UnitKey,
    pub name: String,
    pub job_id: String,
}

/// Mock implementation of the JobService trait.
///
/// Provides controllable behavior for testing:
/// - Track submitted units for assertions
/// - Drive job states by hand
/// - Simulate failures
///
/// # Example
///
/// ```rust,ignore
/// let service = MockJobService::new();
/// let job_id = service.submit(&unit, "job_ABCD").await?;
///
/// service.set_status(&job_id, JobStatus::Succeeded).await;
/// let paths = service.download(&job_id, dir.path()).await?;
/// ```
#[derive(Debug)]
pub struct MockJobService {
    submissions: Arc<RwLock<Vec<RecordedSubmission>>>,
    statuses: Arc<RwLock<HashMap<String, JobStatus>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<JobServiceError>>>,
    /// State reported by newly submitted jobs.
    initial_status: JobStatus,
}

impl Default for MockJobService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobService {
    pub fn new() -> Self {
        Self {
            submissions: Arc::new(RwLock::new(Vec::new())),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            initial_status: JobStatus::Pending,
        }
    }

    /// A service whose jobs finish with `status` as soon as they are submitted.
    pub fn finishing_with(status: JobStatus) -> Self {
        Self {
            initial_status: status,
            ..Self::new()
        }
    }

    /// Get all recorded submissions.
    pub async fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.read().await.clone()
    }

    /// Set the state a job reports.
    pub async fn set_status(&self, job_id: &str, status: JobStatus) {
        self.statuses
            .write()
            .await
            .insert(job_id.to_string(), status);
    }

    /// Set every known job to the same state.
    pub async fn set_all(&self, status: JobStatus) {
        for s in self.statuses.write().await.values_mut() {
            *s = status;
        }
    }

    /// Make the next operation fail.
    pub async fn set_next_error(&self, error: JobServiceError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Result<(), JobServiceError> {
        match self.next_error.write().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl JobService for MockJobService {
    async fn submit(&self, unit: &WorkUnit, name: &str) -> Result<String, JobServiceError> {
        self.take_error().await?;

        let mut submissions = self.submissions.write().await;
        let job_id = format!("mock-job-{:04}", submissions.len() + 1);
        submissions.push(RecordedSubmission {
            key: unit.key(),
            name: name.to_string(),
            job_id: job_id.clone(),
        });
        self.statuses
            .write()
            .await
            .insert(job_id.clone(), self.initial_status);
        Ok(job_id)
    }

    async fn refresh(&self, job_id: &str) -> Result<JobStatus, JobServiceError> {
        self.take_error().await?;
        self.statuses
            .read()
            .await
            .get(job_id)
            .copied()
            .ok_or_else(|| JobServiceError::JobNotFound(job_id.to_string()))
    }

    async fn download(
        &self,
        job_id: &str,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, JobServiceError> {
        self.take_error().await?;
        match self.statuses.read().await.get(job_id) {
            Some(JobStatus::Succeeded) => {}
            Some(_) => return Err(JobServiceError::NoOutputs(job_id.to_string())),
            None => return Err(JobServiceError::JobNotFound(job_id.to_string())),
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(format!("{}.zip", job_id));
        tokio::fs::write(&path, b"mock product").await?;
        Ok(vec![path])
    }
}
