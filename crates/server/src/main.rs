use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use encodeq_core::{
    load_config, load_config_from_env, validate_config, AttributePropagator, Config,
    ConversionEngine, FfmpegStrategyFactory, FsAttributePropagator, LogFormat, StrategyFactory,
};
use encodeq_server::api::create_router;
use encodeq_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extra time granted on shutdown on top of the engine's terminate grace.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var("ENCODEQ_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Logging needs the configured format, so load first and report errors after
    let loaded = load(&config_path);
    init_tracing(
        loaded
            .as_ref()
            .map(|config| config.logging.format)
            .unwrap_or_default(),
    );
    let config = loaded?;

    info!(version = VERSION, config = ?config_path, "Starting encodeq");

    let factory = FfmpegStrategyFactory::new(config.encoder.clone());
    if let Err(e) = factory.validate().await {
        warn!("Encoder check failed, conversions will fail until fixed: {}", e);
    }

    let engine = ConversionEngine::new(
        config.engine.clone(),
        Arc::new(factory) as Arc<dyn StrategyFactory>,
        Arc::new(FsAttributePropagator::new()) as Arc<dyn AttributePropagator>,
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, engine.clone()));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let an in-flight encode settle so it does not leave a partial output
    if engine.terminate().await {
        info!("Terminating active conversion...");
        let idle = engine.wait_until_idle();
        match engine.config().terminate_grace() {
            Some(grace) => {
                if tokio::time::timeout(grace + SHUTDOWN_SLACK, idle).await.is_err() {
                    warn!("Conversion did not stop in time, exiting anyway");
                }
            }
            None => idle.await,
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Load and validate configuration.
///
/// A missing config file is not an error: defaults plus `ENCODEQ_*`
/// environment variables are used instead.
fn load(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
    } else {
        load_config_from_env().context("Failed to load config from environment")?
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
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

    info!("Shutdown signal received");
}
