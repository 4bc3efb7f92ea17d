//! Periodic maintenance loop.
//!
//! Runs the cache expiry sweep and the shared-employment inference pass on
//! fixed intervals until a shutdown signal arrives. Store work is synchronous,
//! so each run is moved onto the blocking pool.

use super::CacheExpiryService;
use crate::config::{ConflictGraphConfig, InferenceConfig};
use crate::models::EntityId;
use crate::services::RelationshipDetector;
use crate::storage::{ConflictCacheBackend, GraphBackend};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Counts of what a scheduler run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerReport {
    /// Completed cache sweeps.
    pub sweeps_run: usize,
    /// Cache sweeps that failed.
    pub sweep_failures: usize,
    /// Completed inference passes.
    pub inference_runs: usize,
    /// Inference passes that could not run.
    pub inference_failures: usize,
}

/// Runs maintenance jobs on intervals.
pub struct JobScheduler<B> {
    backend: Arc<B>,
    sweep_period: Duration,
    inference_period: Duration,
    companies: Vec<EntityId>,
    inference: InferenceConfig,
}

impl<B> JobScheduler<B>
where
    B: GraphBackend + ConflictCacheBackend + 'static,
{
    /// Creates a scheduler using the `jobs` and `inference` sections of the config.
    #[must_use]
    pub fn new(backend: Arc<B>, config: &ConflictGraphConfig) -> Self {
        let jobs = config.jobs.clone().clamped();
        Self {
            backend,
            sweep_period: Duration::from_secs(jobs.cache_sweep_interval_secs),
            inference_period: Duration::from_secs(jobs.inference_interval_secs),
            companies: jobs
                .companies
                .iter()
                .map(String::as_str)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(EntityId::new)
                .collect(),
            inference: config.inference,
        }
    }

    /// Overrides both periods.
    #[must_use]
    pub const fn with_periods(mut self, sweep: Duration, inference: Duration) -> Self {
        self.sweep_period = sweep;
        self.inference_period = inference;
        self
    }

    /// Overrides the companies scanned by the inference pass.
    #[must_use]
    pub fn with_companies(mut self, companies: Vec<EntityId>) -> Self {
        self.companies = companies;
        self
    }

    /// Runs until Ctrl-C.
    pub async fn run(&self) -> SchedulerReport {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C; stopping scheduler");
            }
        })
        .await
    }

    /// Runs until `shutdown` completes.
    ///
    /// The first run of each job happens one period after start. A job that
    /// fails is logged and retried on its next tick.
    pub async fn run_until<F>(&self, shutdown: F) -> SchedulerReport
    where
        F: Future<Output = ()>,
    {
        let mut report = SchedulerReport::default();
        let mut sweep_tick = interval_after(self.sweep_period);
        let mut inference_tick = interval_after(self.inference_period);
        tokio::pin!(shutdown);

        info!(
            sweep_secs = self.sweep_period.as_secs(),
            inference_secs = self.inference_period.as_secs(),
            companies = self.companies.len(),
            "Job scheduler started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = sweep_tick.tick() => {
                    if self.run_sweep().await {
                        report.sweeps_run += 1;
                    } else {
                        report.sweep_failures += 1;
                    }
                }
                _ = inference_tick.tick() => {
                    if self.run_inference().await {
                        report.inference_runs += 1;
                    } else {
                        report.inference_failures += 1;
                    }
                }
            }
        }

        info!(
            sweeps_run = report.sweeps_run,
            sweep_failures = report.sweep_failures,
            inference_runs = report.inference_runs,
            inference_failures = report.inference_failures,
            "Job scheduler stopped"
        );
        report
    }

    async fn run_sweep(&self) -> bool {
        let service = CacheExpiryService::new(Arc::clone(&self.backend));
        match tokio::task::spawn_blocking(move || service.sweep(false)).await {
            Ok(Ok(result)) => {
                info!(summary = %result.summary(), "Scheduled cache sweep");
                true
            },
            Ok(Err(e)) => {
                warn!(error = %e, "Scheduled cache sweep failed");
                false
            },
            Err(e) => {
                warn!(error = %e, "Scheduled cache sweep panicked or was cancelled");
                false
            },
        }
    }

    async fn run_inference(&self) -> bool {
        if self.companies.is_empty() {
            info!("No companies configured for inference; skipping");
            return true;
        }
        let detector =
            RelationshipDetector::with_config(Arc::clone(&self.backend), self.inference);
        let companies = self.companies.clone();
        match tokio::task::spawn_blocking(move || detector.run_inference_pass(&companies)).await {
            Ok(report) => {
                info!(summary = %report.summary(), "Scheduled inference pass");
                true
            },
            Err(e) => {
                warn!(error = %e, "Scheduled inference pass panicked or was cancelled");
                false
            },
        }
    }
}

fn interval_after(period: Duration) -> time::Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictPathEntry, Direction, RiskLevel};
    use crate::storage::InMemoryGraphBackend;

    fn expired_entry() -> ConflictPathEntry {
        ConflictPathEntry {
            subject_id: EntityId::new("s"),
            opposing_id: EntityId::new("o"),
            paths: Vec::new(),
            max_depth: 3,
            relationship_types: None,
            direction: Direction::Both,
            risk_score: 0.0,
            risk_level: RiskLevel::Green,
            recommendation: String::new(),
            created_at: 0,
            expires_at: 1,
        }
    }

    #[tokio::test]
    async fn test_scheduler_runs_jobs_until_shutdown() {
        let backend = Arc::new(InMemoryGraphBackend::new());
        backend.upsert_conflict_path(&expired_entry()).unwrap();

        let scheduler = JobScheduler::new(Arc::clone(&backend), &ConflictGraphConfig::default())
            .with_periods(Duration::from_millis(10), Duration::from_millis(15))
            .with_companies(vec![EntityId::new("missing-co")]);
        let report = scheduler
            .run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await;

        assert!(report.sweeps_run >= 1);
        assert_eq!(report.sweep_failures, 0);
        assert!(report.inference_runs >= 1);
        assert_eq!(backend.conflict_path_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scheduler_stops_before_first_tick() {
        let backend = Arc::new(InMemoryGraphBackend::new());
        let scheduler = JobScheduler::new(backend, &ConflictGraphConfig::default());
        let report = scheduler.run_until(async {}).await;
        assert_eq!(report, SchedulerReport::default());
    }
}
