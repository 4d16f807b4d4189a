//! Remote processing job service.
//!
//! A job service accepts one work unit per job, reports its progress, and
//! hands back the output files once it has succeeded.

mod hyp3;

pub use hyp3::{Hyp3Client, JobRequest, DEFAULT_HYP3_API_URL};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::granule::WorkUnit;

/// Errors returned by a job service.
#[derive(Debug, Error)]
pub enum JobServiceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The service does not know this job.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The job has no outputs to download.
    #[error("Job {0} has no output files")]
    NoOutputs(String),

    /// Writing a downloaded file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobServiceError {
    /// Whether a later poll may succeed where this one failed.
    ///
    /// Network failures, rate limiting and server-side errors are retryable.
    /// Malformed requests, unknown jobs and parse failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            Self::Io(_) => true,
            Self::ParseError(_) | Self::JobNotFound(_) | Self::NoOutputs(_) => false,
        }
    }

    /// Whether the error is about one job or unit rather than the service.
    ///
    /// Such a unit is marked failed and the loop moves on to the others.
    /// Credential and other request errors stay fatal.
    pub fn is_unit_fault(&self) -> bool {
        match self {
            Self::ParseError(_) | Self::JobNotFound(_) | Self::NoOutputs(_) => true,
            Self::ApiError { status, .. } => matches!(status, 400 | 404 | 410 | 422),
            Self::HttpError(_) | Self::Io(_) => false,
        }
    }
}

/// Remote job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = JobServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            other => Err(JobServiceError::ParseError(format!(
                "unknown job status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for remote processing services.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit one unit under the given job name. Returns the job id.
    async fn submit(&self, unit: &WorkUnit, name: &str) -> Result<String, JobServiceError>;

    /// Fetch the current state of a job.
    async fn refresh(&self, job_id: &str) -> Result<JobStatus, JobServiceError>;

    /// Download a finished job's outputs into `dest_dir`.
    async fn download(&self, job_id: &str, dest_dir: &Path)
        -> Result<Vec<PathBuf>, JobServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_parse() {
        assert_eq!("SUCCEEDED".parse::<JobStatus>().unwrap(), JobStatus::Succeeded);
        assert_eq!("PENDING".parse::<JobStatus>().unwrap(), JobStatus::Pending);
        assert!("succeeded".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_retryable_classification() {
        let server = JobServiceError::ApiError {
            status: 503,
            message: "unavailable".into(),
        };
        let throttled = JobServiceError::ApiError {
            status: 429,
            message: "slow down".into(),
        };
        let bad_request = JobServiceError::ApiError {
            status: 400,
            message: "bad granule".into(),
        };
        assert!(server.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!JobServiceError::ParseError("x".into()).is_retryable());
        assert!(!JobServiceError::JobNotFound("j".into()).is_retryable());
    }

    #[test]
    fn test_unit_fault_classification() {
        let gone = JobServiceError::ApiError {
            status: 410,
            message: "expired".into(),
        };
        let unauthorized = JobServiceError::ApiError {
            status: 401,
            message: "bad token".into(),
        };
        assert!(gone.is_unit_fault());
        assert!(!unauthorized.is_unit_fault());
        assert!(JobServiceError::JobNotFound("j".into()).is_unit_fault());
        assert!(JobServiceError::NoOutputs("j".into()).is_unit_fault());
        assert!(JobServiceError::ParseError("unknown job status: X".into()).is_unit_fault());
        assert!(!JobServiceError::Io(std::io::Error::other("disk")).is_unit_fault());
    }
}
