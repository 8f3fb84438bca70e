//! The `JobStore` contract and its backends.
//!
//! All mutation of persisted job state goes through the five operations
//! on [`JobStore`]. Dispatchers and client handles hold only job ids plus
//! snapshots no older than one operation.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;

use renderq_core::error::QueueError;
use renderq_core::types::{JobId, Timestamp};

use crate::models::job::{JobRecord, Submission};

/// Shared, crash-tolerant job storage with at-least-once delivery of each
/// job to exactly one claimant at a time.
///
/// Dequeueing is non-blocking at this level ([`claim_next`] returns
/// `None` on an empty lane); callers that need to wait poll with a
/// bounded interval, never a tight loop.
///
/// [`claim_next`]: JobStore::claim_next
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically append a job in `Queued` state to the named lane.
    ///
    /// Validates the submission first; a partially-written record is
    /// never visible to a consumer. Returns the stored record with its
    /// freshly assigned id.
    async fn submit(&self, lane: &str, submission: Submission) -> Result<JobRecord, QueueError>;

    /// Atomically pop the FIFO head of the lane and transition it to
    /// `Running`, recording `started_at`.
    ///
    /// At most one caller ever obtains a given job; concurrent claimants
    /// on one lane receive disjoint jobs. Returns `None` when the lane
    /// has no queued jobs.
    async fn claim_next(&self, lane: &str) -> Result<Option<JobRecord>, QueueError>;

    /// Transition `Running -> Succeeded`, storing the result and
    /// `finished_at`.
    ///
    /// Idempotent: returns `false` (affecting nothing) if the job is not
    /// currently running, so a duplicate report never overwrites a
    /// terminal state.
    async fn complete(&self, id: JobId, result: Value) -> Result<bool, QueueError>;

    /// Transition to `Failed`, storing the error text and `finished_at`.
    ///
    /// Accepted from `Queued` or `Running`; a no-op returning `false` on
    /// jobs already in a terminal state.
    async fn fail(&self, id: JobId, error: &str) -> Result<bool, QueueError>;

    /// Point lookup. Fails with `NotFound` for unknown or purged ids.
    async fn get(&self, id: JobId) -> Result<JobRecord, QueueError>;

    /// Delete terminal jobs whose `finished_at` precedes `cutoff`.
    /// Returns the number of purged records.
    async fn purge_finished(&self, cutoff: Timestamp) -> Result<u64, QueueError>;
}

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;
