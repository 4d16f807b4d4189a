//! HyP3 on-demand processing API client.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{JobService, JobServiceError, JobStatus};
use crate::config::JobsConfig;
use crate::granule::WorkUnit;

/// Default HyP3 API endpoint.
pub const DEFAULT_HYP3_API_URL: &str = "https://hyp3-api.asf.alaska.edu";

/// One job entry in a submission request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobRequest {
    pub job_type: &'static str,
    pub name: String,
    pub job_parameters: JobParameters,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobParameters {
    pub granules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dem_matching: Option<bool>,
}

impl JobRequest {
    /// Builds the request for a unit: terrain correction for a single scene,
    /// offset tracking for a pair.
    pub fn for_unit(unit: &WorkUnit, name: &str, dem_matching: bool) -> Self {
        match unit {
            WorkUnit::Granule(g) => Self {
                job_type: "RTC_GAMMA",
                name: name.to_string(),
                job_parameters: JobParameters {
                    granules: vec![g.name.clone()],
                    dem_matching: Some(dem_matching),
                },
            },
            WorkUnit::Pair(p) => Self {
                job_type: "AUTORIFT",
                name: name.to_string(),
                job_parameters: JobParameters {
                    granules: vec![p.primary.name.clone(), p.secondary.name.clone()],
                    dem_matching: None,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    jobs: &'a [JobRequest],
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    jobs: Vec<JobRecord>,
}

#[derive(Debug, Deserialize)]
struct JobRecord {
    job_id: String,
    status_code: String,
    #[serde(default)]
    files: Vec<JobFile>,
}

#[derive(Debug, Deserialize)]
struct JobFile {
    url: String,
    filename: String,
}

/// HyP3 API client.
pub struct Hyp3Client {
    client: Client,
    api_url: String,
    api_token: Option<String>,
    dem_matching: bool,
}

impl Hyp3Client {
    /// Create a new client from the jobs configuration.
    pub fn new(config: &JobsConfig) -> Result<Self, JobServiceError> {
        let client = Client::builder()
            .user_agent(format!("scenetrack/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            dem_matching: config.dem_matching,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord, JobServiceError> {
        let url = format!("{}/jobs/{}", self.api_url, job_id);
        debug!("HyP3 job lookup: {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(JobServiceError::JobNotFound(job_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobServiceError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| JobServiceError::ParseError(e.to_string()))
    }

    async fn download_file(&self, file: &JobFile, dest_dir: &Path) -> Result<PathBuf, JobServiceError> {
        let filename = output_file_name(&file.filename)?;
        let target = dest_dir.join(filename);
        let partial = dest_dir.join(format!("{}.part", filename));

        let response = self.client.get(&file.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(JobServiceError::ApiError {
                status: status.as_u16(),
                message: format!("download of {} failed", filename),
            });
        }

        let mut out = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            out.write_all(&chunk?).await?;
        }
        out.flush().await?;
        drop(out);
        tokio::fs::rename(&partial, &target).await?;

        debug!("Downloaded {} to {:?}", filename, target);
        Ok(target)
    }
}

/// Accepts a server-supplied output name only if it is a bare file name.
fn output_file_name(name: &str) -> Result<&str, JobServiceError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(name),
        _ => Err(JobServiceError::ParseError(format!(
            "refusing output file name {:?}",
            name
        ))),
    }
}

#[async_trait]
impl JobService for Hyp3Client {
    async fn submit(&self, unit: &WorkUnit, name: &str) -> Result<String, JobServiceError> {
        let jobs = [JobRequest::for_unit(unit, name, self.dem_matching)];
        let url = format!("{}/jobs", self.api_url);

        let response = self
            .authorize(self.client.post(&url))
            .json(&SubmitRequest { jobs: &jobs })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("HyP3 rejected job {} with status {}", name, status);
            return Err(JobServiceError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| JobServiceError::ParseError(e.to_string()))?;
        let job = parsed
            .jobs
            .into_iter()
            .next()
            .ok_or_else(|| JobServiceError::ParseError("empty jobs list".to_string()))?;

        info!("Submitted {} as job {}", name, job.job_id);
        Ok(job.job_id)
    }

    async fn refresh(&self, job_id: &str) -> Result<JobStatus, JobServiceError> {
        self.fetch_job(job_id).await?.status_code.parse()
    }

    async fn download(
        &self,
        job_id: &str,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, JobServiceError> {
        let job = self.fetch_job(job_id).await?;
        if job.files.is_empty() {
            return Err(JobServiceError::NoOutputs(job_id.to_string()));
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let mut paths = Vec::with_capacity(job.files.len());
        for file in &job.files {
            paths.push(self.download_file(file, dest_dir).await?);
        }
        Ok(paths)
    }
}
