// Server loop module
// Accepts connections until a shutdown signal arrives

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};

use super::connection::accept_connection;
use crate::config;
use crate::logger;

/// Upper bound on waiting for in-flight connections after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Accept loop for the counter server.
///
/// Must run inside a `LocalSet`; connections are served with `spawn_local`.
/// Once `shutdown` is notified, open connections are asked to close after
/// their current request (idle keep-alive connections close at once). Returns
/// when they have all finished or `DRAIN_TIMEOUT` has elapsed.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (closing_tx, closing_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            closing_rx.clone(),
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown.notified() => {
                break;
            }
        }
    }

    drop(listener);
    closing_tx.send_replace(true);
    logger::log_shutdown(active_connections.load(Ordering::SeqCst));

    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutting down with {} connections still open",
                active_connections.load(Ordering::SeqCst)
            ));
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    Ok(())
}
