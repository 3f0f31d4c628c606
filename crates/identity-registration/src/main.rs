//! Identity Registration - Entry point.

use anyhow::{Context, Result};
use identity_registration::{
    api::{create_router, AppState, RateLimitState},
    config::{Config, LogConfig, StorageBackend},
    Registrar,
};
use registration_store::{EncryptedFileStore, MemoryStore, RegistrationStore};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log);

    if let Err(e) = run(config).await {
        tracing::error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn RegistrationStore>> {
    let store_config = config.storage.store_config();

    let store: Arc<dyn RegistrationStore> = match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage (registrations are lost on restart)");
            Arc::new(MemoryStore::new(store_config, config.registration.sweep_interval))
        }
        StorageBackend::File => {
            let secret = config
                .storage
                .encryption_secret
                .clone()
                .context("encryption secret missing for file backend")?;
            let store = EncryptedFileStore::open(
                &config.storage.data_dir,
                store_config,
                secret,
            )
            .await
            .with_context(|| format!("Failed to open store in {:?}", config.storage.data_dir))?;
            Arc::new(store)
        }
    };

    Ok(store)
}

async fn run(config: Config) -> Result<()> {
    info!("Starting Identity Registration service");

    let store = open_store(&config).await?;
    let settings = config.registration.settings()?;
    info!(
        pending_ttl = %settings.pending_ttl,
        max_one_time_keys = settings.max_one_time_keys,
        "Registration settings loaded"
    );

    let registrar = Registrar::new(store, settings);
    let rate_limit = RateLimitState::new(
        config.rate_limit.global_per_minute,
        config.rate_limit.finalize_per_phone_per_hour,
    );
    rate_limit.spawn_pruning(config.rate_limit.prune_interval);
    let app = create_router(AppState::new(registrar, rate_limit));

    let listen_addr = config
        .server
        .listen_addr
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid listen address {}", config.server.listen_addr))?;
    let addr = SocketAddr::new(listen_addr, config.server.port);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
