//! Poll loop driving a tracker against a job service.
//!
//! Each iteration refreshes jobs in flight, rescans local products, submits
//! as many waiting units as the ceiling allows and publishes the status.
//! Retryable job-service errors are logged and left for the next iteration.
//! An error about a single job fails that unit only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::config::{Config, TrackingMode};
use crate::granule::WorkUnit;
use crate::jobs::{JobService, JobServiceError, JobStatus};
use crate::tracker::{job_name, Tracker, TrackerError, TrackerStatus};

/// Errors that stop the poll loop.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Job service error: {0}")]
    Jobs(#[from] JobServiceError),
}

/// Poll loop settings.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub submission_ceiling: usize,
    pub job_name_prefix: String,
    pub download_dir: PathBuf,
    pub poll_interval: Duration,
}

impl RunnerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            submission_ceiling: config.tracker.submission_ceiling,
            job_name_prefix: config.jobs.job_name_prefix.clone(),
            download_dir: config.download_dir(),
            poll_interval: Duration::from_secs(config.runner.poll_interval_secs),
        }
    }
}

/// What one iteration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationReport {
    pub localized: usize,
    pub failed: usize,
    pub promoted: usize,
    pub submitted: usize,
}

/// Owns a tracker and drives it until every unit is finished.
pub struct Runner {
    tracker: Tracker,
    jobs: Arc<dyn JobService>,
    settings: RunnerSettings,
    status_tx: watch::Sender<TrackerStatus>,
}

impl Runner {
    pub fn new(tracker: Tracker, jobs: Arc<dyn JobService>, settings: RunnerSettings) -> Self {
        let (status_tx, _) = watch::channel(tracker.status());
        Self {
            tracker,
            jobs,
            settings,
            status_tx,
        }
    }

    /// Receives the status published after every iteration.
    pub fn subscribe(&self) -> watch::Receiver<TrackerStatus> {
        self.status_tx.subscribe()
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Deals with a job-service error raised while handling `unit`.
    ///
    /// Retryable errors wait for the next iteration. Errors about this one
    /// job mark the unit failed so the rest keep moving. Anything else
    /// stops the loop.
    async fn handle_job_error(
        &mut self,
        context: &str,
        unit: &WorkUnit,
        e: JobServiceError,
        report: &mut IterationReport,
    ) -> Result<(), RunnerError> {
        if e.is_retryable() {
            warn!("{} (will retry next iteration): {}", context, e);
            return Ok(());
        }
        if e.is_unit_fault() {
            warn!("{}: {}; marking {} failed", context, e, unit.key());
            self.tracker.save_ready().await;
            if self.tracker.mark_failed(unit)? {
                report.failed += 1;
            }
            return Ok(());
        }
        error!("{}: {}", context, e);
        Err(e.into())
    }

    /// Runs one poll iteration.
    pub async fn run_iteration(&mut self) -> Result<IterationReport, RunnerError> {
        let mut report = IterationReport::default();

        for unit in self.tracker.submitted() {
            let Some(job_id) = unit.job_id().map(str::to_string) else {
                warn!("{} is submitted without a job id", unit.key());
                continue;
            };
            self.refresh_one(&unit, &job_id, &mut report).await?;
        }

        self.tracker.save_ready().await;
        report.promoted = self.tracker.refresh_local()?;

        for unit in self.tracker.select_for_submission(self.settings.submission_ceiling) {
            let name = job_name(&self.settings.job_name_prefix, &unit);
            match self.jobs.submit(&unit, &name).await {
                Ok(job_id) => {
                    self.tracker.save_ready().await;
                    if self.tracker.mark_submitted(&unit, job_id)? {
                        report.submitted += 1;
                    }
                }
                Err(e) => {
                    // Service trouble: leave the rest of the batch for later.
                    let stop = e.is_retryable();
                    self.handle_job_error(&format!("Submitting {}", name), &unit, e, &mut report)
                        .await?;
                    if stop {
                        break;
                    }
                }
            }
        }

        let status = self.tracker.status();
        info!("{}", status);
        self.status_tx.send_replace(status);
        Ok(report)
    }

    async fn refresh_one(
        &mut self,
        unit: &WorkUnit,
        job_id: &str,
        report: &mut IterationReport,
    ) -> Result<(), RunnerError> {
        let status = match self.jobs.refresh(job_id).await {
            Ok(status) => status,
            Err(e) => {
                let context = format!("Refreshing job {}", job_id);
                return self.handle_job_error(&context, unit, e, report).await;
            }
        };

        match status {
            JobStatus::Pending | JobStatus::Running => {
                debug!("Job {} for {} is {}", job_id, unit.key(), status);
            }
            JobStatus::Failed => {
                warn!("Job {} for {} failed", job_id, unit.display_name());
                self.tracker.save_ready().await;
                if self.tracker.mark_failed(unit)? {
                    report.failed += 1;
                }
            }
            JobStatus::Succeeded => {
                match self.jobs.download(job_id, &self.settings.download_dir).await {
                    Ok(paths) => {
                        info!("Downloaded {} files for {}", paths.len(), unit.key());
                        self.tracker.save_ready().await;
                        if self.tracker.mark_localized(unit)? {
                            report.localized += 1;
                        }
                    }
                    Err(e) => {
                        let context = format!("Downloading job {}", job_id);
                        return self.handle_job_error(&context, unit, e, report).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Polls until every unit is finished or a shutdown signal arrives.
    ///
    /// In pair mode the product chain is checked and logged on completion.
    /// Returns the tracker so callers can inspect the final state.
    pub async fn run_until_complete(
        mut self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<Tracker, RunnerError> {
        info!(
            "Poll loop started (ceiling {}, every {:?})",
            self.settings.submission_ceiling, self.settings.poll_interval
        );
        loop {
            self.run_iteration().await?;

            if self.tracker.is_complete() {
                info!("All units finished: {}", self.tracker.status());
                if self.tracker.mode() == TrackingMode::Pair {
                    self.tracker.connectivity_report().log();
                }
                break;
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Poll loop received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
        Ok(self.tracker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::granule::UnitStatus;
    use crate::store::{InMemoryStore, JsonFileStore};
    use crate::testing::{fixtures, MockJobService};
    use crate::tracker::TrackerOptions;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tempfile::TempDir;

    fn settings(dir: &Path, ceiling: usize) -> RunnerSettings {
        RunnerSettings {
            submission_ceiling: ceiling,
            job_name_prefix: "job".to_string(),
            download_dir: dir.to_path_buf(),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn runner(dir: &Path, n: usize, ceiling: usize, jobs: Arc<MockJobService>) -> Runner {
        let tracker = Tracker::from_granules(
            TrackerOptions::new(TrackingMode::Single, dir),
            Arc::new(InMemoryStore::new()),
            fixtures::granule_series(n),
        )
        .unwrap();
        Runner::new(tracker, jobs, settings(dir, ceiling))
    }

    #[tokio::test]
    async fn test_iteration_submits_up_to_ceiling() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::new());
        let mut runner = runner(dir.path(), 5, 3, jobs.clone());

        let report = runner.run_iteration().await.unwrap();
        assert_eq!(report.submitted, 3);

        let names: Vec<String> = jobs.submissions().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["job_A000", "job_A001", "job_A002"]);
        assert_eq!(runner.tracker().submitted().len(), 3);

        let report = runner.run_iteration().await.unwrap();
        assert_eq!(report.submitted, 0);
    }

    #[tokio::test]
    async fn test_succeeded_jobs_are_downloaded_and_localized() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::new());
        let mut runner = runner(dir.path(), 3, 2, jobs.clone());
        runner.run_iteration().await.unwrap();

        let first = jobs.submissions().await.remove(0);
        jobs.set_status(&first.job_id, JobStatus::Succeeded).await;

        let report = runner.run_iteration().await.unwrap();
        assert_eq!(report.localized, 1);
        assert_eq!(report.submitted, 1);
        assert!(dir.path().join(format!("{}.zip", first.job_id)).exists());
        assert_eq!(
            runner.tracker().get(&first.key).unwrap().status(),
            UnitStatus::Localized
        );
    }

    #[tokio::test]
    async fn test_failed_jobs_are_not_resubmitted() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::new());
        let mut runner = runner(dir.path(), 1, 5, jobs.clone());
        runner.run_iteration().await.unwrap();
        jobs.set_all(JobStatus::Failed).await;

        let report = runner.run_iteration().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.submitted, 0);
        assert_eq!(jobs.submissions().await.len(), 1);
        assert!(runner.tracker().is_complete());
    }

    #[tokio::test]
    async fn test_retryable_errors_do_not_stop_the_loop() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::new());
        let mut runner = runner(dir.path(), 2, 5, jobs.clone());
        jobs.set_next_error(JobServiceError::ApiError {
            status: 503,
            message: "maintenance".to_string(),
        })
        .await;

        let report = runner.run_iteration().await.unwrap();
        assert_eq!(report.submitted, 0);

        let report = runner.run_iteration().await.unwrap();
        assert_eq!(report.submitted, 2);
    }

    #[tokio::test]
    async fn test_credential_errors_are_surfaced() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::new());
        let mut runner = runner(dir.path(), 2, 5, jobs.clone());
        jobs.set_next_error(JobServiceError::ApiError {
            status: 401,
            message: "bad token".to_string(),
        })
        .await;

        let result = runner.run_iteration().await;
        assert!(matches!(result, Err(RunnerError::Jobs(_))));
    }

    #[tokio::test]
    async fn test_rejected_submission_fails_only_that_unit() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::new());
        let mut runner = runner(dir.path(), 3, 5, jobs.clone());
        jobs.set_next_error(JobServiceError::ApiError {
            status: 400,
            message: "bad granule".to_string(),
        })
        .await;

        let report = runner.run_iteration().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.submitted, 2);

        let failed = runner.tracker().failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].key().to_string(), "A000");
    }

    #[tokio::test]
    async fn test_expired_job_fails_its_unit_and_others_are_submitted() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::new());
        let mut runner = runner(dir.path(), 4, 40, jobs.clone());
        let first = runner.tracker().unsubmitted().remove(0);
        runner
            .tracker
            .mark_submitted(&first, "expired-job".to_string())
            .unwrap();

        let report = runner.run_iteration().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.submitted, 3);
        assert_eq!(
            runner.tracker().get(&first.key()).unwrap().status(),
            UnitStatus::Failed
        );

        // Nothing left to trip over on the next round.
        let report = runner.run_iteration().await.unwrap();
        assert_eq!(report, IterationReport::default());
        assert_eq!(runner.tracker().submitted().len(), 3);
    }

    #[tokio::test]
    async fn test_save_spacing_does_not_block_the_runtime() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"))
            .with_min_interval(Duration::from_millis(100));
        let tracker = Tracker::from_granules(
            TrackerOptions::new(TrackingMode::Single, dir.path()),
            Arc::new(store),
            fixtures::granule_series(3),
        )
        .unwrap();
        let jobs = Arc::new(MockJobService::new());
        let mut runner = Runner::new(tracker, jobs, settings(dir.path(), 3));

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let started = Instant::now();
        let report = runner.run_iteration().await.unwrap();
        let elapsed = started.elapsed();
        ticker.abort();

        assert_eq!(report.submitted, 3);
        assert!(elapsed >= Duration::from_millis(200));
        assert!(ticks.load(Ordering::SeqCst) >= 10);
    }

    #[tokio::test]
    async fn test_status_is_published() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::new());
        let mut runner = runner(dir.path(), 4, 3, jobs);
        let rx = runner.subscribe();
        assert_eq!(rx.borrow().unsubmitted, 4);

        runner.run_iteration().await.unwrap();
        let status = rx.borrow().clone();
        assert_eq!(status.submitted, 3);
        assert_eq!(status.unsubmitted, 1);
    }

    #[tokio::test]
    async fn test_run_until_complete() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::finishing_with(JobStatus::Succeeded));
        let runner = runner(dir.path(), 5, 2, jobs.clone());
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let tracker = runner.run_until_complete(shutdown_rx).await.unwrap();
        assert!(tracker.is_complete());
        assert_eq!(tracker.localized().len(), 5);
        assert_eq!(jobs.submissions().await.len(), 5);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(MockJobService::new());
        let runner = runner(dir.path(), 3, 3, jobs);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        let tracker = runner.run_until_complete(shutdown_rx).await.unwrap();
        assert!(!tracker.is_complete());
        assert_eq!(tracker.submitted().len(), 3);
    }
}
