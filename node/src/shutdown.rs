//! Graceful shutdown controller for the Bastion node.
//!
//! Listens for SIGINT/SIGTERM and broadcasts a shutdown signal to every
//! task holding a receiver, via a `tokio::sync::broadcast` channel.

use tokio::signal;
use tokio::sync::broadcast;

/// Coordinates graceful shutdown across the node's tasks.
///
/// Tasks call [`subscribe`](Self::subscribe) to get a receiver, then
/// `select!` on it alongside their main loop. When shutdown is triggered
/// (either by OS signal or programmatically), every receiver is notified.
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Get a receiver that will be notified on shutdown.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }

    /// Wait for SIGTERM, SIGINT or a programmatic shutdown, then notify
    /// every subscriber.
    pub async fn wait_for_signal(&self) {
        let mut requested = self.subscribe();
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(error) => {
                    tracing::warn!(%error, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
            _ = requested.recv() => { tracing::info!("shutdown requested"); return; }
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_notifies_subscribers() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();
        controller.shutdown();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn programmatic_shutdown_ends_the_wait() {
        let controller = std::sync::Arc::new(ShutdownController::new());
        let waiter = {
            let controller = std::sync::Arc::clone(&controller);
            tokio::spawn(async move { controller.wait_for_signal().await })
        };
        tokio::task::yield_now().await;
        // The waiter may not have subscribed yet; keep signalling until it returns.
        while !waiter.is_finished() {
            controller.shutdown();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        waiter.await.unwrap();
    }
}
