use distributed_indexer::broker::redis::connect_with_backoff;
use distributed_indexer::config::{self, WorkerConfig};
use distributed_indexer::worker::{HeartbeatReporter, WorkerRuntime};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_tracing();

    let config = WorkerConfig::from_env();
    tracing::info!(
        "Worker {} starting (language: {})",
        config.worker_id,
        config.language.as_str()
    );

    let broker = connect_with_backoff(&config.redis_url).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reporter = HeartbeatReporter::new(broker.clone(), config.worker_id.clone())?;
    let heartbeat_handle = tokio::spawn(reporter.run(shutdown_rx.clone()));

    let runtime = WorkerRuntime::new(broker, config.worker_id.clone(), config.language);
    let task_handle = tokio::spawn(runtime.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = task_handle.await;
    let _ = heartbeat_handle.await;

    tracing::info!("Worker {} stopped", config.worker_id);
    Ok(())
}
