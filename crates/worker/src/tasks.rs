//! Built-in render tasks.
//!
//! - `render.scene` fans a frame range out into one `render.frame` child
//!   per frame and returns immediately.
//! - `render.frame` expands the logical scene path and invokes the
//!   external renderer.
//! - `worker.ping` reports worker metadata for farm diagnostics.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use renderq_core::error::QueueError;
use renderq_core::frames::FrameRange;

use crate::registry::{TaskContext, TaskHandler, TaskRegistry};
use crate::render::{RenderError, Renderer};

/// Task name for the fan-out entry point.
pub const RENDER_SCENE: &str = "render.scene";

/// Task name for a single-frame render.
pub const RENDER_FRAME: &str = "render.frame";

/// Task name for the worker metadata report.
pub const WORKER_PING: &str = "worker.ping";

/// Register the built-in tasks against one renderer.
pub fn register_builtin(
    registry: &mut TaskRegistry,
    renderer: Arc<dyn Renderer>,
) -> Result<(), QueueError> {
    registry.register(RENDER_SCENE, Arc::new(RenderScene))?;
    registry.register(RENDER_FRAME, Arc::new(RenderFrame { renderer }))?;
    registry.register(WORKER_PING, Arc::new(Ping))?;
    Ok(())
}

fn string_arg(args: &[Value], index: usize, what: &str) -> Result<String, QueueError> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            QueueError::Validation(format!("Argument {index} must be a string ({what})"))
        })
}

/// Fan-out: `render.scene(scene, target, [start, end, step?])`.
///
/// Splits the range deterministically and submits one `render.frame`
/// child per frame on the same lane, then returns without waiting —
/// blocking here would pin a worker slot for the whole scene. Re-running
/// the same fan-out enqueues the same set of child frames; children are
/// not deduplicated, so a retried fan-out delivers at-least-once.
pub struct RenderScene;

#[async_trait]
impl TaskHandler for RenderScene {
    async fn run(
        &self,
        ctx: &TaskContext,
        args: &[Value],
        _kwargs: &Map<String, Value>,
    ) -> Result<Value, QueueError> {
        let scene = string_arg(args, 0, "logical scene path")?;
        let target = string_arg(args, 1, "render target")?;
        let range = FrameRange::from_json(args.get(2).ok_or_else(|| {
            QueueError::Validation("Argument 2 must be a frame range array".to_string())
        })?)?;

        let mut submitted = 0u64;
        for frame in range.frames() {
            ctx.submit(
                RENDER_FRAME,
                vec![json!(scene), json!(target), json!(frame)],
            )
            .await?;
            submitted += 1;
        }

        tracing::info!(
            scene = %scene,
            target = %target,
            frames = submitted,
            lane = %ctx.lane,
            "Fanned scene out into per-frame jobs",
        );
        Ok(json!({ "frames": submitted }))
    }
}

/// Single frame: `render.frame(scene, target, frame)`.
pub struct RenderFrame {
    pub renderer: Arc<dyn Renderer>,
}

#[async_trait]
impl TaskHandler for RenderFrame {
    async fn run(
        &self,
        ctx: &TaskContext,
        args: &[Value],
        _kwargs: &Map<String, Value>,
    ) -> Result<Value, QueueError> {
        let scene = string_arg(args, 0, "logical scene path")?;
        let target = string_arg(args, 1, "render target")?;
        let frame = args.get(2).and_then(Value::as_i64).ok_or_else(|| {
            QueueError::Validation("Argument 2 must be an integer frame".to_string())
        })?;

        let scene_path = ctx.root.to_absolute(&scene);
        self.renderer
            .render_frame(&scene_path, &target, frame)
            .await
            .map_err(|e| match e {
                RenderError::ExecutionFailed { exit_code, stderr } => QueueError::TaskFailure(
                    format!("renderer exited with code {exit_code:?}: {stderr}"),
                ),
                other => QueueError::TaskFailure(other.to_string()),
            })?;

        Ok(json!({ "frame": frame }))
    }
}

/// Worker metadata report, useful for checking which machine serves a lane.
pub struct Ping;

fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[async_trait]
impl TaskHandler for Ping {
    async fn run(
        &self,
        ctx: &TaskContext,
        _args: &[Value],
        _kwargs: &Map<String, Value>,
    ) -> Result<Value, QueueError> {
        Ok(json!({
            "host": host_name(),
            "pid": std::process::id(),
            "platform": std::env::consts::OS,
            "user": std::env::var("USER").unwrap_or_default(),
            "root": ctx.root.path().display().to_string(),
            "lane": ctx.lane,
        }))
    }
}
