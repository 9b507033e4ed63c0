use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use release_notifications::config::Config;
use release_notifications::services::init;
use release_notifications::{app, AppState};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "release_notifications=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to bind SIGTERM: {}", e);
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before tracing so RUST_LOG and LOG_FORMAT can come from it.
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting Release Notifications Service");

    let pool = init::init_db(&config).await?;
    let registry = init::build_channel_registry(&config, &pool);
    tracing::info!("Channels available: {:?}", registry.channels());

    let app_state = AppState::new(pool, config.clone(), registry);

    // Shutdown notifier for background workers
    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let bg_handles = init::spawn_background_workers(app_state.clone(), shutdown_tx.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let shutdown_tx_clone = shutdown_tx.clone();
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, notifying background workers");
            let _ = shutdown_tx_clone.send(());
        })
        .await?;

    // Give an in-flight scheduler tick time to finish.
    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for background workers to exit",
        shutdown_wait.as_secs()
    );

    let bg_wait = async {
        for h in bg_handles {
            let _ = h.await;
        }
    };
    if tokio::time::timeout(shutdown_wait, bg_wait).await.is_err() {
        tracing::warn!("Background workers did not exit in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
