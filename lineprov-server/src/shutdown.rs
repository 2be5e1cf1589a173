//! Signal handling and orderly teardown.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// Wait for the notification dispatcher to finish after the server stopped.
///
/// The dispatcher exits on its own once every `StatusChanged` sender is
/// gone. Besides the router, senders live in update tasks that keep running
/// after their client hung up, so their notifications are still published.
/// If some task is still holding a sender after `grace`, the dispatcher is
/// told to stop and publishes only what is already queued.
pub async fn finish_dispatch(
    mut dispatcher: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    grace: Duration,
) {
    let joined = match tokio::time::timeout(grace, &mut dispatcher).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::warn!(
                ?grace,
                "Updates still in flight, stopping notification dispatcher"
            );
            let _ = shutdown_tx.send(true);
            dispatcher.await
        }
    };
    report_dispatcher_exit(joined);
}

fn report_dispatcher_exit(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Notification dispatcher task failed");
    }
}
