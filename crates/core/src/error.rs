use crate::types::JobId;

/// Error taxonomy shared across the queue, client, and worker crates.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Missing or invalid lane name, host, or storage root. Raised before
    /// any network call is attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The backing store was unreachable or timed out. Names the host and
    /// port so a misconfigured address is distinguishable from a server
    /// that is down.
    #[error("Couldn't connect to server: verify that the renderq store is listening at {host} port {port} ({detail})")]
    Connection {
        host: String,
        port: u16,
        detail: String,
    },

    /// Invalid submission input: empty task name, non-absolute path, path
    /// escaping the configured root, malformed frame range.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Lookup of an unknown or expired job id.
    #[error("Job not found: {id}")]
    NotFound { id: JobId },

    /// A task handler or the external renderer failed. Carries the error
    /// text stored on the job record, verbatim.
    #[error("Job failed: {0}")]
    TaskFailure(String),

    /// A dispatcher dequeued a job whose task name is not registered.
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// The store was reachable but an operation on it failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl QueueError {
    /// Short error text suitable for persisting on a failed job record.
    pub fn job_error_text(&self) -> String {
        match self {
            Self::TaskFailure(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
