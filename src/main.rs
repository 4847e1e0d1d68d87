use axum::routing::{get, post};
use axum::{Extension, Router};
use dashmap::DashSet;
use distributed_indexer::broker::redis::connect_with_backoff;
use distributed_indexer::config::{self, CoordinatorConfig};
use distributed_indexer::coordinator::handlers::{
    handle_healthz, handle_index_status, handle_load_index, handle_save_index, handle_search,
    handle_trigger_local_indexing, handle_workers_status,
};
use distributed_indexer::coordinator::{Dispatcher, GlobalIndex, Merger};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_tracing();

    let config = Arc::new(CoordinatorConfig::from_env());
    tracing::info!(
        "Coordinator starting (language: {}, uploads: {}, snapshot: {})",
        config.language.as_str(),
        config.uploads_path.display(),
        config.index_path.display()
    );

    // 1. Broker first; nothing is served until it answers.
    let broker = connect_with_backoff(&config.redis_url).await?;

    // 2. Restore the index from the last snapshot, if there is one.
    let index = Arc::new(GlobalIndex::new());
    if let Err(e) = index.load(&config.index_path).await {
        tracing::warn!("Could not load index snapshot: {:#}; starting empty", e);
    }

    let pending: Arc<DashSet<String>> = Arc::new(DashSet::new());
    let dispatcher = Arc::new(Dispatcher::new(broker.clone(), pending.clone()));

    // 3. Merger subscription as a background task.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let merger = Merger::new(broker.clone(), index.clone(), pending.clone());
    let merger_handle = tokio::spawn(merger.run(shutdown_rx));

    // 4. HTTP surface.
    let app = Router::new()
        .route("/trigger-local-indexing/", post(handle_trigger_local_indexing))
        .route("/search/", post(handle_search))
        .route("/index-status/", get(handle_index_status))
        .route("/index/save/", post(handle_save_index))
        .route("/index/load/", post(handle_load_index))
        .route("/healthz", get(handle_healthz))
        .route("/workers/status/", get(handle_workers_status))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(index.clone()))
        .layer(Extension(pending))
        .layer(Extension(dispatcher))
        .layer(Extension(broker))
        .layer(Extension(config.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the merger, let the in-flight merge finish, then snapshot.
    tracing::info!("Coordinator shutting down");
    let _ = shutdown_tx.send(true);
    let _ = merger_handle.await;
    if let Err(e) = index.save(&config.index_path).await {
        tracing::error!("Failed to save index on shutdown: {:#}", e);
    }
    tracing::info!("Coordinator shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
