use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tubedrop::common::files;
use tubedrop::config::settings::AppConfig;
use tubedrop::infrastructure::messenger::{HttpMessenger, LogMessenger, Messenger};
use tubedrop::infrastructure::process::TokioExecutor;
use tubedrop::state::AppState;
use tubedrop::workers::{self, downloader::{RunnerConfig, YtDlpRunner}};

/// How long in-flight jobs get to wind down after shutdown starts.
const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting server...");

    let config = AppConfig::new()?;
    info!(
        download_dir = %config.download_dir.display(),
        proxy = config.http_proxy.is_some(),
        "✅ Configuration loaded"
    );

    let messenger: Arc<dyn Messenger> = match &config.messenger_url {
        Some(url) => Arc::new(HttpMessenger::new(url)?),
        None => {
            warn!("MESSENGER_URL not set, outbound messages are only logged");
            Arc::new(LogMessenger)
        }
    };
    let downloader = Arc::new(YtDlpRunner::new(
        RunnerConfig::from(&config),
        Arc::new(TokioExecutor),
    ));

    let port = config.server_port;
    let state = AppState::new(config, downloader, messenger);
    let cancel = CancellationToken::new();

    let sweeper = state
        .tokens
        .start_sweeper(state.config.token_sweep_interval(), cancel.clone());
    let cleanup = state.config.cleanup_ttl().map(|ttl| {
        files::start_cleanup(state.config.download_dir.clone(), ttl, cancel.clone())
    });
    let workers = workers::start_download_workers(state.clone(), cancel.clone());

    let app = tubedrop::app::create_app(state.clone());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{addr}");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();
    state.queue.close();

    if tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, workers.wait())
        .await
        .is_err()
    {
        warn!("Workers did not stop in time");
    }
    let _ = sweeper.await;
    if let Some(cleanup) = cleanup {
        let _ = cleanup.await;
    }

    info!("Graceful shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
