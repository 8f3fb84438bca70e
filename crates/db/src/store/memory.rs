//! In-memory job store.
//!
//! Implements the full [`JobStore`] contract over process-local state.
//! Used by the queue-semantics tests and by single-process farms where a
//! shared server would be overkill. State does not survive a restart.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use renderq_core::error::QueueError;
use renderq_core::types::{new_job_id, JobId, Timestamp};

use crate::models::job::{JobRecord, Submission};
use crate::models::status::JobStatus;
use crate::store::JobStore;

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, JobRecord>,
    /// Queued job ids per lane, in submission order.
    lanes: HashMap<String, VecDeque<JobId>>,
}

/// Process-local job store.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn submit(&self, lane: &str, submission: Submission) -> Result<JobRecord, QueueError> {
        if lane.trim().is_empty() {
            return Err(QueueError::Validation(
                "Lane not specified. You must specify the name of a renderq lane.".to_string(),
            ));
        }
        submission.validate()?;

        let record = JobRecord {
            id: new_job_id(),
            lane: lane.to_string(),
            task_name: submission.task_name,
            args: Value::Array(submission.args),
            kwargs: Value::Object(submission.kwargs),
            status_id: JobStatus::Queued.id(),
            result: None,
            error_message: None,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };

        let mut inner = self.inner.lock().await;
        inner
            .lanes
            .entry(lane.to_string())
            .or_default()
            .push_back(record.id);
        inner.jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn claim_next(&self, lane: &str) -> Result<Option<JobRecord>, QueueError> {
        let mut inner = self.inner.lock().await;
        let id = match inner.lanes.get_mut(lane).and_then(VecDeque::pop_front) {
            Some(id) => id,
            None => return Ok(None),
        };
        let record = inner
            .jobs
            .get_mut(&id)
            .ok_or(QueueError::NotFound { id })?;
        record.status_id = JobStatus::Running.id();
        record.started_at = Some(Utc::now());
        Ok(Some(record.clone()))
    }

    async fn complete(&self, id: JobId, result: Value) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock().await;
        let record = inner.jobs.get_mut(&id).ok_or(QueueError::NotFound { id })?;
        if record.status() != JobStatus::Running {
            return Ok(false);
        }
        record.status_id = JobStatus::Succeeded.id();
        record.result = Some(result);
        record.finished_at = Some(Utc::now());
        Ok(true)
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock().await;
        let (status, lane) = match inner.jobs.get(&id) {
            Some(record) => (record.status(), record.lane.clone()),
            None => return Err(QueueError::NotFound { id }),
        };
        if status.is_terminal() {
            return Ok(false);
        }
        // Failing a still-queued job must also drop it from the lane so a
        // dispatcher never claims it afterwards.
        if status == JobStatus::Queued {
            if let Some(queue) = inner.lanes.get_mut(&lane) {
                queue.retain(|queued| *queued != id);
            }
        }
        let record = inner.jobs.get_mut(&id).ok_or(QueueError::NotFound { id })?;
        record.status_id = JobStatus::Failed.id();
        record.error_message = Some(error.to_string());
        record.finished_at = Some(Utc::now());
        Ok(true)
    }

    async fn get(&self, id: JobId) -> Result<JobRecord, QueueError> {
        let inner = self.inner.lock().await;
        inner
            .jobs
            .get(&id)
            .cloned()
            .ok_or(QueueError::NotFound { id })
    }

    async fn purge_finished(&self, cutoff: Timestamp) -> Result<u64, QueueError> {
        let mut inner = self.inner.lock().await;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, record| {
            !(record.status().is_terminal()
                && record.finished_at.is_some_and(|at| at < cutoff))
        });
        Ok((before - inner.jobs.len()) as u64)
    }
}
