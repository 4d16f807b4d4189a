use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, oneshot};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scenetrack_core::config::{CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
use scenetrack_core::{
    load_config, validate_config, AsfCatalogClient, Hyp3Client, JobService, Runner,
    RunnerSettings, Tracker,
};
use scenetrack_server::api::create_router;
use scenetrack_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("scenetrack {}", VERSION);

    // Determine config path
    let config_path = std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Tracking mode: {:?}", config.tracker.mode);
    info!("State file: {:?}", config.tracker.state_file);

    // Reconcile catalog, persisted state and local products
    let catalog =
        AsfCatalogClient::new(&config.catalog).context("Failed to create catalog client")?;
    let tracker = Tracker::open(&config, &catalog)
        .await
        .context("Failed to initialize tracker")?;
    info!("Tracker ready: {}", tracker.status());

    let jobs: Arc<dyn JobService> =
        Arc::new(Hyp3Client::new(&config.jobs).context("Failed to create job service client")?);
    info!("Job service at {}", config.jobs.api_url);

    let runner = Runner::new(tracker, jobs, RunnerSettings::from_config(&config));
    let status_rx = runner.subscribe();

    // Spawn poll loop
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (done_tx, done_rx) = oneshot::channel::<()>();
    let runner_handle = tokio::spawn(async move {
        let result = runner.run_until_complete(shutdown_rx).await;
        let _ = done_tx.send(());
        result
    });

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), status_rx));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Serve until a signal arrives or the poll loop finishes
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => info!("Shutdown signal received"),
                _ = done_rx => info!("Poll loop finished"),
            }
        })
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(());

    let tracker = runner_handle
        .await
        .context("Poll loop task panicked")?
        .context("Poll loop failed")?;
    info!("Final state: {}", tracker.status());

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
