//! Worker configuration loaded from environment variables.

use renderq_core::config::QueueConfig;
use renderq_core::error::QueueError;
use renderq_core::paths::StorageRoot;

use crate::retention::DEFAULT_RETENTION_HOURS;

/// Default dispatcher polling interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Worker process configuration.
#[derive(Debug)]
pub struct WorkerConfig {
    /// Store connection parameters (shared with submitters).
    pub queue: QueueConfig,
    /// Lanes to pull from, in order (default: the queue config's lane).
    pub lanes: Vec<String>,
    /// Dispatcher polling interval in milliseconds (default: `1000`).
    pub poll_interval_ms: u64,
    /// Hours to keep finished jobs before the retention sweep deletes
    /// them (default: `24`).
    pub retention_hours: i64,
    /// Shared storage root on this machine.
    pub root: StorageRoot,
    /// Renderer executable (default: `hython`).
    pub renderer_bin: String,
    /// Optional script template piped to the renderer's stdin. When
    /// unset, the renderer receives `scene target frame` as arguments.
    pub renderer_script: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `RENDERQ_LANES`            | the `RENDERQ_LANE` lane |
    /// | `RENDERQ_POLL_INTERVAL_MS` | `1000`                  |
    /// | `RENDERQ_RETENTION_HOURS`  | `24`                    |
    /// | `RENDERQ_ROOT`             | (required)              |
    /// | `RENDERQ_RENDERER_BIN`     | `hython`                |
    /// | `RENDERQ_RENDERER_SCRIPT`  | (unset, argv mode)      |
    ///
    /// Plus the `RENDERQ_*` store variables consumed by
    /// [`QueueConfig::from_env`].
    pub fn from_env() -> Result<Self, QueueError> {
        let queue = QueueConfig::from_env()?;

        let lanes: Vec<String> = std::env::var("RENDERQ_LANES")
            .unwrap_or_else(|_| queue.lane.clone())
            .split(',')
            .map(|lane| lane.trim().to_string())
            .filter(|lane| !lane.is_empty())
            .collect();
        if lanes.is_empty() {
            return Err(QueueError::Configuration(
                "RENDERQ_LANES must name at least one lane".to_string(),
            ));
        }

        let poll_interval_ms = parse_env("RENDERQ_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let retention_hours = parse_env("RENDERQ_RETENTION_HOURS", DEFAULT_RETENTION_HOURS)?;

        let root = std::env::var("RENDERQ_ROOT").map_err(|_| {
            QueueError::Configuration(
                "RENDERQ_ROOT not set. You must specify the path to the shared storage directory for this machine.".to_string(),
            )
        })?;
        let root = StorageRoot::new(root)?;

        let renderer_bin =
            std::env::var("RENDERQ_RENDERER_BIN").unwrap_or_else(|_| "hython".to_string());
        let renderer_script = match std::env::var("RENDERQ_RENDERER_SCRIPT") {
            Ok(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                QueueError::Configuration(format!(
                    "Couldn't read renderer script template {path}: {e}"
                ))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            queue,
            lanes,
            poll_interval_ms,
            retention_hours,
            root,
            renderer_bin,
            renderer_script,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, QueueError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| QueueError::Configuration(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}
