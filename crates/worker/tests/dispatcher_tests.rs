//! End-to-end dispatcher tests over the in-memory store: lifecycle
//! reporting, unknown tasks, handler failures and panics, and recursive
//! fan-out.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use renderq_client::{PollConfig, Queue};
use renderq_core::error::QueueError;
use renderq_core::paths::StorageRoot;
use renderq_db::store::MemoryJobStore;
use renderq_db::JobStore;
use renderq_worker::dispatcher::Dispatcher;
use renderq_worker::registry::{TaskContext, TaskHandler, TaskRegistry};
use renderq_worker::render::{RenderError, Renderer};
use renderq_worker::tasks;

const WAIT_BUDGET: Duration = Duration::from_secs(5);

fn fast_poll() -> PollConfig {
    PollConfig::fixed(Duration::from_millis(5))
}

/// Renderer double that records every frame it is asked to render.
#[derive(Default)]
struct RecordingRenderer {
    frames: Mutex<Vec<(String, i64)>>,
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render_frame(
        &self,
        scene: &std::path::Path,
        _target: &str,
        frame: i64,
    ) -> Result<(), RenderError> {
        self.frames
            .lock()
            .unwrap()
            .push((scene.to_string_lossy().to_string(), frame));
        Ok(())
    }
}

/// Handler that echoes its first argument back as the result.
struct Echo;

#[async_trait]
impl TaskHandler for Echo {
    async fn run(
        &self,
        _ctx: &TaskContext,
        args: &[Value],
        _kwargs: &Map<String, Value>,
    ) -> Result<Value, QueueError> {
        Ok(args.first().cloned().unwrap_or(Value::Null))
    }
}

/// Handler that always fails.
struct Boom;

#[async_trait]
impl TaskHandler for Boom {
    async fn run(
        &self,
        _ctx: &TaskContext,
        _args: &[Value],
        _kwargs: &Map<String, Value>,
    ) -> Result<Value, QueueError> {
        Err(QueueError::TaskFailure("lamp fell over".to_string()))
    }
}

/// Handler that panics outright.
struct Panics;

#[async_trait]
impl TaskHandler for Panics {
    async fn run(
        &self,
        _ctx: &TaskContext,
        _args: &[Value],
        _kwargs: &Map<String, Value>,
    ) -> Result<Value, QueueError> {
        panic!("handler blew up");
    }
}

struct Harness {
    store: Arc<MemoryJobStore>,
    queue: Queue,
    renderer: Arc<RecordingRenderer>,
    cancel: CancellationToken,
    _root_dir: tempfile::TempDir,
}

/// Spin up a dispatcher over a fresh in-memory store with the built-in
/// render tasks plus the test handlers registered.
fn start_dispatcher() -> Harness {
    let root_dir = tempfile::tempdir().unwrap();
    let root = StorageRoot::new(root_dir.path()).unwrap();

    let store = Arc::new(MemoryJobStore::new());
    let renderer = Arc::new(RecordingRenderer::default());

    let mut registry = TaskRegistry::new();
    tasks::register_builtin(&mut registry, renderer.clone()).unwrap();
    registry.register("test.echo", Arc::new(Echo)).unwrap();
    registry.register("test.boom", Arc::new(Boom)).unwrap();
    registry.register("test.panics", Arc::new(Panics)).unwrap();

    let dispatcher = Dispatcher::new(
        store.clone(),
        Arc::new(registry),
        root,
        vec!["default".to_string()],
    )
    .with_poll_interval(Duration::from_millis(10));

    let cancel = CancellationToken::new();
    let dispatcher_cancel = cancel.clone();
    tokio::spawn(async move { dispatcher.run(dispatcher_cancel).await });

    let queue = Queue::new(store.clone(), "default").unwrap();
    Harness {
        store,
        queue,
        renderer,
        cancel,
        _root_dir: root_dir,
    }
}

async fn wait_bounded(
    handle: &renderq_client::JobHandle,
) -> Result<Value, QueueError> {
    tokio::time::timeout(WAIT_BUDGET, handle.wait(&fast_poll()))
        .await
        .expect("job did not finish within the test budget")
}

#[tokio::test]
async fn executed_job_reports_its_result() {
    let harness = start_dispatcher();
    let handle = harness
        .queue
        .submit("test.echo", vec![json!({"ok": true})], Map::new())
        .await
        .unwrap();

    assert_eq!(wait_bounded(&handle).await.unwrap(), json!({"ok": true}));
    harness.cancel.cancel();
}

#[tokio::test]
async fn unknown_task_fails_and_the_dispatcher_keeps_serving() {
    let harness = start_dispatcher();

    let unknown = harness
        .queue
        .submit("no.such.task", vec![], Map::new())
        .await
        .unwrap();
    let err = wait_bounded(&unknown).await.unwrap_err();
    match err {
        QueueError::TaskFailure(text) => {
            assert!(text.contains("unknown task"), "error text was {text:?}")
        }
        other => panic!("expected TaskFailure, got {other:?}"),
    }

    // The loop moved on: a registered task submitted afterwards still runs.
    let next = harness
        .queue
        .submit("test.echo", vec![json!("still alive")], Map::new())
        .await
        .unwrap();
    assert_eq!(wait_bounded(&next).await.unwrap(), json!("still alive"));
    harness.cancel.cancel();
}

#[tokio::test]
async fn handler_error_becomes_a_failed_job_with_verbatim_text() {
    let harness = start_dispatcher();
    let handle = harness
        .queue
        .submit("test.boom", vec![], Map::new())
        .await
        .unwrap();

    let err = wait_bounded(&handle).await.unwrap_err();
    match err {
        QueueError::TaskFailure(text) => assert_eq!(text, "lamp fell over"),
        other => panic!("expected TaskFailure, got {other:?}"),
    }
    harness.cancel.cancel();
}

#[tokio::test]
async fn handler_panic_is_contained_and_reported() {
    let harness = start_dispatcher();

    let handle = harness
        .queue
        .submit("test.panics", vec![], Map::new())
        .await
        .unwrap();
    let err = wait_bounded(&handle).await.unwrap_err();
    match err {
        QueueError::TaskFailure(text) => {
            assert!(text.contains("panicked"), "error text was {text:?}")
        }
        other => panic!("expected TaskFailure, got {other:?}"),
    }

    // The dispatcher survived the panic.
    let next = harness
        .queue
        .submit("test.echo", vec![json!(1)], Map::new())
        .await
        .unwrap();
    assert_eq!(wait_bounded(&next).await.unwrap(), json!(1));
    harness.cancel.cancel();
}

#[tokio::test]
async fn fan_out_renders_every_frame_of_the_range() {
    let harness = start_dispatcher();

    let handle = harness
        .queue
        .submit(
            "render.scene",
            vec![
                json!("$RENDERQ_ROOT/shots/010/scene.hip"),
                json!("/out/beauty"),
                json!([0, 10]),
            ],
            Map::new(),
        )
        .await
        .unwrap();

    // The parent returns immediately with the child count; it never
    // blocks its own worker slot on the children.
    assert_eq!(wait_bounded(&handle).await.unwrap(), json!({"frames": 10}));

    // The dispatcher pool then drains the children.
    let deadline = tokio::time::Instant::now() + WAIT_BUDGET;
    loop {
        let rendered = harness.renderer.frames.lock().unwrap().len();
        if rendered == 10 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "only {rendered} of 10 frames rendered in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let frames: BTreeSet<i64> = harness
        .renderer
        .frames
        .lock()
        .unwrap()
        .iter()
        .map(|(_, frame)| *frame)
        .collect();
    assert_eq!(frames, (0..10).collect::<BTreeSet<i64>>());

    // Scene paths reached the renderer expanded against the local root.
    let scene = harness.renderer.frames.lock().unwrap()[0].0.clone();
    assert!(
        scene.ends_with("shots/010/scene.hip") && !scene.contains("$RENDERQ_ROOT"),
        "scene path was not expanded: {scene}"
    );
    harness.cancel.cancel();
}

#[tokio::test]
async fn stepped_fan_out_renders_the_strided_frames() {
    let harness = start_dispatcher();

    let handle = harness
        .queue
        .submit(
            "render.scene",
            vec![
                json!("$RENDERQ_ROOT/scene.lxo"),
                json!("Render"),
                json!([0, 10, 3]),
            ],
            Map::new(),
        )
        .await
        .unwrap();
    assert_eq!(wait_bounded(&handle).await.unwrap(), json!({"frames": 4}));

    let deadline = tokio::time::Instant::now() + WAIT_BUDGET;
    loop {
        let frames: BTreeSet<i64> = harness
            .renderer
            .frames
            .lock()
            .unwrap()
            .iter()
            .map(|(_, frame)| *frame)
            .collect();
        if frames == BTreeSet::from([0, 3, 6, 9]) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "strided frames incomplete in time: {frames:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    harness.cancel.cancel();
}

#[tokio::test]
async fn ping_reports_worker_metadata() {
    let harness = start_dispatcher();
    let handle = harness
        .queue
        .submit("worker.ping", vec![], Map::new())
        .await
        .unwrap();

    let info = wait_bounded(&handle).await.unwrap();
    assert_eq!(info["lane"], json!("default"));
    assert!(info["pid"].as_u64().is_some());
    assert!(info["root"].as_str().is_some());
    assert!(!info["host"].as_str().unwrap().is_empty());
    harness.cancel.cancel();
}

#[tokio::test]
async fn malformed_fan_out_arguments_fail_the_parent_job() {
    let harness = start_dispatcher();
    let handle = harness
        .queue
        .submit(
            "render.scene",
            vec![json!("$RENDERQ_ROOT/scene.hip"), json!("/out"), json!("1-10")],
            Map::new(),
        )
        .await
        .unwrap();

    let err = wait_bounded(&handle).await.unwrap_err();
    match err {
        QueueError::TaskFailure(text) => {
            assert!(text.contains("Frame range"), "error text was {text:?}")
        }
        other => panic!("expected TaskFailure, got {other:?}"),
    }

    // Nothing was rendered for the malformed request.
    assert!(harness.renderer.frames.lock().unwrap().is_empty());
    assert!(harness.store.claim_next("default").await.unwrap().is_none());
    harness.cancel.cancel();
}
