//! Task registry: dotted task names mapped to typed handlers.
//!
//! The registry is populated once at worker startup and immutable
//! thereafter (moved into an `Arc` before the dispatcher starts). A job
//! whose task name is missing here is failed, never executed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use renderq_core::error::QueueError;
use renderq_core::paths::StorageRoot;
use renderq_db::{JobStore, Submission};

/// Everything a handler may touch: the shared store (for fan-out), the
/// lane it was dequeued from, and the machine-local storage root.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<dyn JobStore>,
    pub lane: String,
    pub root: StorageRoot,
}

impl TaskContext {
    /// Enqueue a child job on the same lane.
    ///
    /// This is the fan-out primitive: the handler returns immediately
    /// after submitting, freeing its worker slot while the dispatcher
    /// pool executes the children.
    pub async fn submit(
        &self,
        task_name: &str,
        args: Vec<Value>,
    ) -> Result<renderq_core::types::JobId, QueueError> {
        let record = self
            .store
            .submit(&self.lane, Submission::new(task_name, args))
            .await?;
        Ok(record.id)
    }
}

/// An executable task: a pure function of `(args, kwargs)` producing a
/// serializable result or a failure.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(
        &self,
        ctx: &TaskContext,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, QueueError>;
}

/// Process-local map of task name to handler.
#[derive(Default)]
pub struct TaskRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a dotted task name.
    ///
    /// Names are validated here so a bad registration fails at startup,
    /// not when the first job arrives: non-empty, lowercase dotted
    /// segments of `[a-z0-9_]`, and not already registered.
    pub fn register(
        &mut self,
        name: &str,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), QueueError> {
        validate_task_name(name)?;
        if self.handlers.contains_key(name) {
            return Err(QueueError::Configuration(format!(
                "Task {name} is already registered"
            )));
        }
        self.handlers.insert(name.to_string(), handler);
        Ok(())
    }

    /// Look up a handler by task name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Registered task names, for startup logging.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn validate_task_name(name: &str) -> Result<(), QueueError> {
    if name.is_empty() {
        return Err(QueueError::Configuration(
            "Task name must not be empty".to_string(),
        ));
    }
    let valid_segments = name
        .split('.')
        .all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        });
    if !valid_segments {
        return Err(QueueError::Configuration(format!(
            "Task name {name} must be dotted lowercase segments of [a-z0-9_]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct Noop;

    #[async_trait]
    impl TaskHandler for Noop {
        async fn run(
            &self,
            _ctx: &TaskContext,
            _args: &[Value],
            _kwargs: &Map<String, Value>,
        ) -> Result<Value, QueueError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn registers_and_resolves_dotted_names() {
        let mut registry = TaskRegistry::new();
        registry.register("render.frame", Arc::new(Noop)).unwrap();
        registry.register("worker.ping", Arc::new(Noop)).unwrap();

        assert!(registry.get("render.frame").is_some());
        assert!(registry.get("render.scene").is_none());
        assert_eq!(registry.names(), vec!["render.frame", "worker.ping"]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = TaskRegistry::new();
        registry.register("render.frame", Arc::new(Noop)).unwrap();
        assert_matches!(
            registry.register("render.frame", Arc::new(Noop)),
            Err(QueueError::Configuration(_))
        );
    }

    #[test]
    fn malformed_names_are_rejected() {
        let mut registry = TaskRegistry::new();
        for bad in ["", "Render.Frame", "render..frame", "render frame", ".render"] {
            assert_matches!(
                registry.register(bad, Arc::new(Noop)),
                Err(QueueError::Configuration(_)),
                "expected rejection of {bad:?}"
            );
        }
    }
}
