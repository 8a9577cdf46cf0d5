//! OS signal handling.
//!
//! SIGINT (Ctrl+C) and, on unix, SIGTERM start a graceful shutdown.

use tokio::signal;

use super::Shutdown;

/// Resolve once the process receives an interrupt or terminate signal.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}

/// Turn the first OS signal into a shutdown trigger. Returns early if some
/// other worker triggers shutdown first.
pub async fn watch_signals(shutdown: Shutdown) {
    tokio::select! {
        _ = shutdown_signal() => shutdown.trigger(),
        _ = shutdown.cancelled() => {},
    }
}
