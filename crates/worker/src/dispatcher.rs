//! The worker loop: claim, resolve, execute, report.
//!
//! Polls the store on a fixed interval and drains every configured lane
//! each tick. A single job's failure never takes the loop down: handler
//! errors and panics are converted into a `fail` report and the loop
//! moves on to the next claim.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use renderq_core::paths::StorageRoot;
use renderq_db::{JobRecord, JobStore};

use crate::registry::{TaskContext, TaskRegistry};

/// Default polling interval for the dispatcher loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A worker-side dispatcher pulling jobs from one or more lanes.
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    registry: Arc<TaskRegistry>,
    root: StorageRoot,
    lanes: Vec<String>,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<TaskRegistry>,
        root: StorageRoot,
        lanes: Vec<String>,
    ) -> Self {
        Self {
            store,
            registry,
            root,
            lanes,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the claim polling interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            lanes = ?self.lanes,
            tasks = ?self.registry.names(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.drain_lanes(&cancel).await;
                }
            }
        }
    }

    /// Claim and execute jobs from every lane until all are empty.
    async fn drain_lanes(&self, cancel: &CancellationToken) {
        for lane in &self.lanes {
            loop {
                if cancel.is_cancelled() {
                    return;
                }
                let claimed = match self.store.claim_next(lane).await {
                    Ok(claimed) => claimed,
                    Err(e) => {
                        tracing::error!(lane = %lane, error = %e, "Claim failed");
                        break;
                    }
                };
                match claimed {
                    Some(job) => self.execute(lane, job).await,
                    None => break,
                }
            }
        }
    }

    /// Execute one claimed job and report its outcome.
    async fn execute(&self, lane: &str, job: JobRecord) {
        tracing::info!(
            job_id = %job.id,
            lane = %lane,
            task = %job.task_name,
            "Job claimed",
        );

        let handler = match self.registry.get(&job.task_name) {
            Some(handler) => handler,
            None => {
                // Unregistered task: fail the job, keep serving the lane.
                let error = renderq_core::error::QueueError::UnknownTask(job.task_name.clone());
                tracing::warn!(job_id = %job.id, task = %job.task_name, "Unknown task");
                self.report_failure(job.id, &error.to_string()).await;
                return;
            }
        };

        let ctx = TaskContext {
            store: self.store.clone(),
            lane: lane.to_string(),
            root: self.root.clone(),
        };
        let args = job.args_slice().to_vec();
        let kwargs = job.kwargs_map();

        // Run the handler in its own task so a panic surfaces as a
        // JoinError here instead of unwinding through the loop.
        let outcome = tokio::spawn(async move {
            handler.run(&ctx, &args, &kwargs).await
        })
        .await;

        match outcome {
            Ok(Ok(result)) => {
                tracing::info!(job_id = %job.id, task = %job.task_name, "Job succeeded");
                match self.store.complete(job.id, result).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(job_id = %job.id, "Completion was a no-op: job already terminal");
                    }
                    Err(e) => {
                        tracing::error!(job_id = %job.id, error = %e, "Failed to record completion");
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(job_id = %job.id, task = %job.task_name, error = %e, "Job failed");
                self.report_failure(job.id, &e.job_error_text()).await;
            }
            Err(join_error) => {
                tracing::error!(job_id = %job.id, task = %job.task_name, error = %join_error, "Handler panicked");
                self.report_failure(job.id, &format!("handler panicked: {join_error}"))
                    .await;
            }
        }
    }

    async fn report_failure(&self, id: renderq_core::types::JobId, error: &str) {
        match self.store.fail(id, error).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(job_id = %id, "Failure report was a no-op: job already terminal");
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Failed to record failure");
            }
        }
    }
}
