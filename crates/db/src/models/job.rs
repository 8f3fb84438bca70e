//! Job entity model and the submission DTO.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use renderq_core::error::QueueError;
use renderq_core::types::{JobId, Timestamp};

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table: the persisted unit of work.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub lane: String,
    pub task_name: String,
    /// Positional arguments, always a JSON array.
    pub args: Value,
    /// Named arguments, always a JSON object.
    pub kwargs: Value,
    pub status_id: StatusId,
    /// Present only when the job succeeded.
    pub result: Option<Value>,
    /// Present only when the job failed.
    pub error_message: Option<String>,
    pub enqueued_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl JobRecord {
    /// Decoded lifecycle status.
    pub fn status(&self) -> JobStatus {
        // An unknown id can only come from a newer schema; surface it as
        // failed rather than panicking in a worker loop.
        JobStatus::from_id(self.status_id).unwrap_or(JobStatus::Failed)
    }

    /// Positional arguments as a slice.
    pub fn args_slice(&self) -> &[Value] {
        self.args.as_array().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Named arguments as a map. Empty map if the column holds anything
    /// other than an object.
    pub fn kwargs_map(&self) -> Map<String, Value> {
        self.kwargs.as_object().cloned().unwrap_or_default()
    }
}

/// DTO for enqueueing a new job.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    /// Dotted task name, e.g. `render.frame`. Must be registered on every
    /// dispatcher that may execute it.
    pub task_name: String,
    /// Positional arguments; JSON-compatible values only.
    pub args: Vec<Value>,
    /// Named arguments; JSON-compatible values only.
    pub kwargs: Map<String, Value>,
}

impl Submission {
    /// Submission with positional arguments only.
    pub fn new(task_name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            task_name: task_name.into(),
            args,
            kwargs: Map::new(),
        }
    }

    /// Fail fast on an empty task name, before any network call.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.task_name.trim().is_empty() {
            return Err(QueueError::Validation(
                "Task name not specified. You must specify the name of a renderq task.".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_task_name_fails_validation() {
        let submission = Submission::new("", vec![]);
        assert_matches!(submission.validate(), Err(QueueError::Validation(_)));

        let submission = Submission::new("   ", vec![]);
        assert_matches!(submission.validate(), Err(QueueError::Validation(_)));
    }

    #[test]
    fn named_task_passes_validation() {
        let submission = Submission::new("render.frame", vec![serde_json::json!(1)]);
        assert!(submission.validate().is_ok());
    }
}
