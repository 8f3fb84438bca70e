//! Shared types for the renderq job queue.
//!
//! This crate has zero internal dependencies so it can be used by the
//! store, client, and worker crates alike.

pub mod config;
pub mod error;
pub mod frames;
pub mod paths;
pub mod types;
