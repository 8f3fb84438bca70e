//! Worker process: the task registry, the dispatcher loop that pulls and
//! executes jobs, the external-renderer adapter, and the built-in render
//! tasks.

pub mod config;
pub mod dispatcher;
pub mod registry;
pub mod render;
pub mod retention;
pub mod tasks;
