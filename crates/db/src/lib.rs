//! Durable job queue: the Job Record model and the pluggable stores that
//! persist it.
//!
//! The store is the sole owner of persisted job state and the only
//! synchronization primitive in the system: its atomic claim is what
//! guarantees that no two dispatchers execute the same job concurrently.

pub mod models;
pub mod store;

pub use models::job::{JobRecord, Submission};
pub use models::status::JobStatus;
pub use store::JobStore;
