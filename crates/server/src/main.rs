use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harmonia_core::{
    load_config, AdapterFactory, Config, ConfigError, RankedSearch, SearchEngine,
};

use harmonia_server::api::create_router;
use harmonia_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
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

    // Load configuration; a missing file means defaults, not a crash, so
    // the service can come up with just environment variables.
    let config_path = std::env::var("HARMONIA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = match load_config(&config_path) {
        Ok(config) => {
            info!("Loaded configuration from {:?}", config_path);
            config
        }
        Err(ConfigError::FileNotFound(_)) => {
            warn!("No config file at {:?}, using defaults", config_path);
            Config::default()
        }
        Err(e) => return Err(e).context("Configuration load failed"),
    };

    // Variable context for profile ${VAR} substitution: the environment.
    let context: HashMap<String, String> = std::env::vars().collect();

    // Build the adapter set from the source profile.
    let factory = AdapterFactory::from_path(&config.search.profile_path);
    let profile_names = factory.profile_names();
    let active_profile = config
        .search
        .profile
        .clone()
        .unwrap_or_else(|| factory.default_profile().to_string());
    let built = factory.build(Some(&active_profile), &context);

    info!(
        profile = %active_profile,
        adapters = built.adapters.len(),
        stream = built.stream.is_some(),
        "Search infrastructure ready"
    );

    let engine = Arc::new(SearchEngine::new(built.adapters));
    let search = RankedSearch::new(engine);

    let state = Arc::new(AppState::new(
        config.clone(),
        search,
        built.stream,
        profile_names,
        active_profile,
    ));

    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
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
