//! shoebox service entry point

use anyhow::Context;
use chrono::Utc;
use shoebox::config::{ensure_storage_root, Settings};
use shoebox::pipeline::{FileProcessor, RenameExecutor};
use shoebox::progress::ProgressBroadcaster;
use shoebox::services::vision::OllamaVisionClient;
use shoebox::storage::StorageLayout;
use shoebox::watch::WatcherManager;
use shoebox::{build_router, AppState, EventBus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli_root = std::env::args().nth(1);
    let settings = Settings::load(cli_root.as_deref()).context("loading configuration")?;
    tracing::info!("storage root: {}", settings.storage_root.display());

    ensure_storage_root(&settings.storage_root)?;
    StorageLayout::new(settings.storage_root.clone()).ensure_dirs()?;

    let db = shoebox::db::init_database_pool(&settings.database_path())
        .await
        .context("opening database")?;

    let event_bus = EventBus::new(256);
    let vision = Arc::new(OllamaVisionClient::new(&settings)?);
    let processor = Arc::new(FileProcessor::new(
        db.clone(),
        &settings,
        event_bus.clone(),
        vision,
    )?);
    let executor = Arc::new(RenameExecutor::new(
        db.clone(),
        event_bus.clone(),
        settings.create_backups,
    ));

    let watcher = Arc::new(WatcherManager::new(
        db.clone(),
        event_bus.clone(),
        &settings,
        processor,
    ));
    watcher.start().await.context("starting watchers")?;

    let shutdown = CancellationToken::new();
    let broadcaster = ProgressBroadcaster::new(
        db.clone(),
        event_bus.clone(),
        Arc::clone(&watcher),
        settings.progress_interval_secs,
    );
    tokio::spawn(broadcaster.run(shutdown.clone()));

    let bind_addr = format!("{}:{}", settings.host, settings.port);
    let state = AppState {
        db,
        event_bus,
        settings: Arc::new(settings),
        watcher: Arc::clone(&watcher),
        executor,
        startup_time: Utc::now(),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    shutdown.cancel();
    watcher.stop();
    tracing::info!("shoebox stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("ctrl-c handler failed: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("sigterm handler failed: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
