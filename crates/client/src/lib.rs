//! Submitter-side API: enqueue jobs and poll or block on their outcome.

pub mod handle;
pub mod poll;

use std::sync::Arc;

use serde_json::{Map, Value};

use renderq_core::config::QueueConfig;
use renderq_core::error::QueueError;
use renderq_db::store::PgJobStore;
use renderq_db::{JobStore, Submission};

pub use handle::JobHandle;
pub use poll::PollConfig;

/// A submitter's endpoint on one lane of the shared queue.
pub struct Queue {
    store: Arc<dyn JobStore>,
    lane: String,
}

impl Queue {
    /// Wrap an already-constructed store (in-memory farms, tests).
    pub fn new(store: Arc<dyn JobStore>, lane: &str) -> Result<Self, QueueError> {
        if lane.trim().is_empty() {
            return Err(QueueError::Configuration(
                "Lane not specified. You must specify the name of a renderq lane.".to_string(),
            ));
        }
        Ok(Self {
            store,
            lane: lane.to_string(),
        })
    }

    /// Connect to the shared store named by `config` and target its lane.
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let store = PgJobStore::connect(config).await?;
        Self::new(Arc::new(store), &config.lane)
    }

    /// The lane this queue submits to.
    pub fn lane(&self) -> &str {
        &self.lane
    }

    /// Enqueue a task and return a handle to its eventual outcome.
    pub async fn submit(
        &self,
        task_name: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<JobHandle, QueueError> {
        let submission = Submission {
            task_name: task_name.to_string(),
            args,
            kwargs,
        };
        let record = self.store.submit(&self.lane, submission).await?;
        tracing::info!(job_id = %record.id, lane = %self.lane, task = task_name, "Submitted job");
        Ok(JobHandle::new(self.store.clone(), record.id))
    }
}
