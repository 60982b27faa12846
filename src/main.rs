use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use biolink::api;
use biolink::auth::AuthService;
use biolink::config::{AuthMode, Config};
use biolink::ordering::LinkOrdering;
use biolink::public;
use biolink::storage::{self, CachedStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let database = storage::connect(&config.database).await?;
    info!("Database initialized successfully");

    let cached = Arc::new(CachedStorage::new(
        database,
        config.cache.max_entries,
        config.cache.ttl_secs,
        config.cache.flush_interval_secs,
    ));
    let storage: Arc<dyn Storage> = cached.clone();
    let ordering = Arc::new(LinkOrdering::new(
        Arc::clone(&storage),
        config.ordering.append_max_attempts,
    ));

    let auth_service = Arc::new(AuthService::new(config.auth.clone())?);
    match auth_service.mode() {
        AuthMode::None => {
            info!(
                dev_owner = %config.auth.dev_owner_id,
                "🔓 Authentication is disabled - requests act as X-Owner-Id or the dev owner"
            );
        }
        AuthMode::Jwt => info!("🔐 Session token authentication enabled"),
    }

    let api_router = api::create_api_router(Arc::clone(&storage), ordering, auth_service);
    let public_router = public::create_public_router(Arc::clone(&storage));

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {api_addr}"))?;
    info!("🚀 API server listening on http://{}", api_addr);

    let public_addr = format!("{}:{}", config.public_server.host, config.public_server.port);
    let public_listener = tokio::net::TcpListener::bind(&public_addr)
        .await
        .with_context(|| format!("failed to bind public listener on {public_addr}"))?;
    info!("🚀 Public profile server listening on http://{}", public_addr);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
        let _ = stop_tx.send(true);
    });

    tokio::try_join!(
        axum::serve(api_listener, api_router).with_graceful_shutdown(wait_for_stop(stop_rx.clone())),
        axum::serve(public_listener, public_router).with_graceful_shutdown(wait_for_stop(stop_rx)),
    )?;

    cached.flush().await.context("failed to flush buffered clicks")?;
    cached.shutdown();
    info!("Buffered clicks flushed, bye");

    Ok(())
}

async fn wait_for_stop(mut stop_rx: watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|stop| *stop).await;
}
