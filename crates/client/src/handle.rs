//! Handle to one submitted job.

use std::sync::Arc;

use serde_json::Value;

use renderq_core::error::QueueError;
use renderq_core::types::JobId;
use renderq_db::{JobRecord, JobStatus, JobStore};

use crate::poll::PollConfig;

/// The submitter's reference to a job: poll it, or block until it
/// finishes.
pub struct JobHandle {
    store: Arc<dyn JobStore>,
    id: JobId,
}

impl JobHandle {
    pub fn new(store: Arc<dyn JobStore>, id: JobId) -> Self {
        Self { store, id }
    }

    /// The job's queue-assigned identifier.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Block until the job reaches a terminal state.
    ///
    /// Polls the store with the backoff described by `poll`. On success
    /// returns the handler's stored result; on failure returns
    /// [`QueueError::TaskFailure`] carrying the stored error text
    /// verbatim.
    ///
    /// This has no timeout: if no dispatcher ever picks the job up (for
    /// example, none has its task name registered), `wait` blocks
    /// indefinitely. Callers that need a deadline wrap this in
    /// `tokio::time::timeout`.
    pub async fn wait(&self, poll: &PollConfig) -> Result<Value, QueueError> {
        let mut delay = poll.initial_delay;
        loop {
            let record = self.store.get(self.id).await?;
            match record.status() {
                JobStatus::Succeeded => {
                    return Ok(record.result.unwrap_or(Value::Null));
                }
                JobStatus::Failed => {
                    return Err(QueueError::TaskFailure(
                        record.error_message.unwrap_or_default(),
                    ));
                }
                JobStatus::Queued | JobStatus::Running => {
                    tokio::time::sleep(delay).await;
                    delay = poll.next_delay(delay);
                }
            }
        }
    }

    /// Single non-blocking lookup: `Some(result)` once the job has
    /// succeeded, `None` while it is queued, running, or failed.
    pub async fn result(&self) -> Result<Option<Value>, QueueError> {
        let record = self.store.get(self.id).await?;
        Ok(match record.status() {
            JobStatus::Succeeded => record.result.or(Some(Value::Null)),
            _ => None,
        })
    }

    /// Full snapshot of the job record.
    pub async fn record(&self) -> Result<JobRecord, QueueError> {
        self.store.get(self.id).await
    }
}
