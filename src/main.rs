use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use signaller::config::RelayConfig;
use signaller::state::AppState;

/// Grace period held open after the shutdown signal fires, so the close
/// frame each writer task sends (see `transport::run_writer`) has time to
/// reach its socket before the process exits. A close frame on shutdown
/// is required, but draining in-flight broadcasts is not.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    let config = RelayConfig::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    let state = AppState::new();
    let router = signaller::build_router(state.clone());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|error| panic!("failed to bind {addr}: {error}"));
    info!(%addr, "signaller listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("server error");
    info!("signaller shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C, fires the shutdown broadcast so every
/// connection's writer task sends a close frame, then holds the grace
/// period before letting `axum::serve` finish its own graceful drain.
async fn shutdown_signal(state: AppState) {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }

    info!("broadcasting close frames to live sockets");
    let _ = state.shutdown.send(());
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
