use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use renderq_db::store::PgJobStore;
use renderq_db::JobStore;
use renderq_worker::config::WorkerConfig;
use renderq_worker::dispatcher::Dispatcher;
use renderq_worker::registry::TaskRegistry;
use renderq_worker::render::CommandRenderer;
use renderq_worker::{retention, tasks};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "renderq_worker=info,renderq_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;

    let store = PgJobStore::connect(&config.queue).await?;
    store.run_migrations().await?;
    let store: Arc<dyn JobStore> = Arc::new(store);

    let renderer = match &config.renderer_script {
        Some(template) => {
            CommandRenderer::with_script(config.renderer_bin.clone(), template.clone())
        }
        None => CommandRenderer::with_args(config.renderer_bin.clone()),
    };

    let mut registry = TaskRegistry::new();
    tasks::register_builtin(&mut registry, Arc::new(renderer))?;
    let registry = Arc::new(registry);

    let cancel = CancellationToken::new();

    let sweep = tokio::spawn(retention::run(
        store.clone(),
        config.retention_hours,
        cancel.clone(),
    ));

    let dispatcher = Dispatcher::new(
        store,
        registry,
        config.root.clone(),
        config.lanes.clone(),
    )
    .with_poll_interval(std::time::Duration::from_millis(config.poll_interval_ms));

    let runner = {
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();

    runner.await?;
    sweep.await?;
    Ok(())
}
