use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playsigner_core::{
    create_authenticator, create_dispatcher, load_config, validate_config, Authenticator,
    DistributionClient, GooglePlayConnector, SanitizedConfig, ServiceToken, SigningPipeline,
    TargetingSelection,
};
use playsigner_server::api::create_router;
use playsigner_server::state::AppState;

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

    // Determine config path
    let config_path = std::env::var("PLAYSIGNER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Effective configuration: {}", config_json);

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Remote clients
    let connector = GooglePlayConnector::new(config.publisher.clone())
        .context("Failed to create publishing client")?;
    info!("Publishing API at {}", config.publisher.base_url);

    let distributor = DistributionClient::new(&config.distribution)
        .context("Failed to create distribution client")?;
    info!("Distribution service at {}", config.distribution.uploader_url);

    let service_token = ServiceToken::from_config(&config.distribution)
        .context("Failed to load distribution token")?;
    info!(token = ?service_token, "Distribution token source");

    // Signing pipeline and workers
    let selection = TargetingSelection::from(&config.targeting);
    info!(
        densities = ?config.targeting.densities,
        languages = ?config.targeting.languages,
        "Targeting selection"
    );
    let pipeline = SigningPipeline::new(Arc::new(connector), Arc::new(distributor), selection)
        .with_track(config.publisher.track.clone());

    let (queue, workers) = create_dispatcher(Arc::new(pipeline), &config.dispatcher);
    info!(
        workers = workers.size(),
        queue_capacity = config.dispatcher.queue_capacity,
        "Dispatcher started"
    );

    tokio::fs::create_dir_all(&config.server.temp_dir)
        .await
        .with_context(|| format!("Failed to create temp dir {:?}", config.server.temp_dir))?;

    let addr = SocketAddr::new(config.server.host, config.server.port);

    // Create app state
    let state = Arc::new(AppState::new(config, authenticator, queue, service_token));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    // The router owned the last queue handle; workers drain what is queued and exit.
    info!("Server shutting down, waiting for queued jobs...");
    workers.join().await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
