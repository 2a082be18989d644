mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use warbler_api::credentials::Hasher;
use warbler_api::{AppState, AppStateInner};
use warbler_db::Database;

use config::{Config, DEV_SECRET};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warbler=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.secret_key == DEV_SECRET {
        warn!("WARBLER_SECRET_KEY is not set; using the development secret");
    }

    // Init database
    let db = Database::open(&config.db_path)?;
    info!("Database ready at {}", config.db_path.display());

    let state: AppState = Arc::new(AppStateInner {
        db,
        session_secret: config.secret_key.clone(),
        session_days: config.session_days,
        hasher: Hasher::with_cost(config.hash_memory_kib, config.hash_iterations)?,
    });

    let app = warbler_api::router(state);

    let addr: SocketAddr = config.server_address().parse()?;
    info!("Warbler listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
