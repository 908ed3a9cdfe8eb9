//! WebSocket server for the chat relay.
//!
//! The server:
//! - Listens on a TCP socket and upgrades each connection to WebSocket
//! - Spawns a writer task and a `Session` for each client
//! - Runs cleanup on behalf of sessions that panic
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept() + WebSocket handshake
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │    Session      │────▶│  RegistryHandle │
//! │  (per client)   │     │                 │
//! └───────┬─────────┘     └────────┬────────┘
//!         │ inbound                │ recipient snapshot
//!         │                        ▼
//! ┌───────┴─────────┐     ┌─────────────────┐
//! │  SplitStream    │     │ Peer queues ──▶ │
//! │                 │     │ writer tasks    │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Per-connection errors are logged and never stop the accept loop

mod broadcast;
mod session;

pub use broadcast::{announce_roster_change, broadcast_record, cleanup_connection};
pub use session::{Session, SessionError};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use relay_core::{ConnectionId, DisplayName};

use crate::config::ConnectionSettings;
use crate::peer::{spawn_writer, Peer};
use crate::registry::RegistryHandle;

/// WebSocket server for the chat relay.
///
/// Owns the bound listener; sessions share the registry through handles.
pub struct RelayServer {
    /// Bound listener
    listener: TcpListener,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Per-connection queue and timeout settings
    settings: ConnectionSettings,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection ids
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// - `ServerError::Bind` if the address cannot be bound (e.g. already in use)
    pub async fn bind(
        addr: &str,
        registry: RegistryHandle,
        settings: ConnectionSettings,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_string(),
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            registry,
            settings,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// In-flight sessions are left running; they end with the runtime.
    pub async fn run(self) -> Result<(), ServerError> {
        match self.local_addr() {
            Ok(addr) => info!(addr = %addr, "Relay server listening"),
            Err(e) => debug!(error = %e, "Relay server listening on unknown address"),
        }

        loop {
            tokio::select! {
                // Check for cancellation
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Accept new connection
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, remote)) => {
                            let raw = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, remote, ConnectionId::new(raw));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!("Relay server stopped");
        Ok(())
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: TcpStream, remote: SocketAddr, connection_id: ConnectionId) {
        let registry = self.registry.clone();
        let settings = self.settings;

        tokio::spawn(async move {
            let ws = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!(connection = %connection_id, remote = %remote, error = %e, "WebSocket handshake failed");
                    return;
                }
            };

            debug!(connection = %connection_id, remote = %remote, "WebSocket established");

            let (sink, inbound) = ws.split();
            let (peer, queue) = Peer::channel(connection_id, settings.peer_queue, settings.send_timeout);
            spawn_writer(connection_id, sink, queue, settings.write_timeout);

            let session = Session::new(connection_id, inbound, peer, registry.clone());
            supervise_session(&registry, connection_id, session.run()).await;
        });
    }
}

/// Runs a session in its own task so a panic cannot skip cleanup.
///
/// If the task panicked, the connection's entry is removed and the departure
/// announced on its behalf. Cleanup is idempotent, so a session that already
/// cleaned up before panicking announces nothing twice.
pub(crate) async fn supervise_session<F>(
    registry: &RegistryHandle,
    connection_id: ConnectionId,
    session: F,
) -> Option<DisplayName>
where
    F: Future<Output = Option<DisplayName>> + Send + 'static,
{
    match tokio::spawn(session).await {
        Ok(held) => held,
        Err(e) if e.is_panic() => {
            error!(connection = %connection_id, "Session panicked, running cleanup");
            cleanup_connection(registry, connection_id).await
        }
        Err(_) => {
            debug!(connection = %connection_id, "Session task cancelled");
            None
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("Failed to read local address: {0}")]
    LocalAddr(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use relay_protocol::ServerRecord;
    use tokio::sync::mpsc;

    use crate::config::RelayConfig;
    use crate::peer::Outbound;
    use crate::registry::spawn_registry;

    fn dn(s: &str) -> DisplayName {
        DisplayName::parse(s).unwrap()
    }

    async fn recv_record(queue: &mut mpsc::Receiver<Outbound>) -> ServerRecord {
        let item = tokio::time::timeout(Duration::from_secs(1), queue.recv())
            .await
            .expect("timed out waiting for outbound item");
        match item {
            Some(Outbound::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a record, got {other:?}"),
        }
    }

    async fn login_then_panic(registry: RegistryHandle, peer: Peer) -> Option<DisplayName> {
        registry.try_add(peer, dn("alice")).await.unwrap();
        panic!("session failed after login");
    }

    #[tokio::test]
    async fn test_panicking_session_is_cleaned_up() {
        let registry = spawn_registry();
        let send_timeout = Duration::from_millis(100);

        let (bob, mut bob_queue) = Peer::channel(ConnectionId::new(1), 8, send_timeout);
        registry.try_add(bob, dn("bob")).await.unwrap();

        let (alice, _alice_queue) = Peer::channel(ConnectionId::new(2), 8, send_timeout);
        let session = login_then_panic(registry.clone(), alice);

        let held = supervise_session(&registry, ConnectionId::new(2), session).await;

        assert_eq!(held, Some(dn("alice")));
        assert_eq!(registry.snapshot_names().await, vec![dn("bob")]);
        assert_eq!(
            recv_record(&mut bob_queue).await,
            ServerRecord::left(&dn("alice"))
        );
        assert_eq!(
            recv_record(&mut bob_queue).await,
            ServerRecord::user_list(vec![dn("bob")])
        );
    }

    #[tokio::test]
    async fn test_finished_session_is_not_cleaned_up_again() {
        let registry = spawn_registry();
        let (bob, mut bob_queue) =
            Peer::channel(ConnectionId::new(1), 8, Duration::from_millis(100));
        registry.try_add(bob, dn("bob")).await.unwrap();

        let held = supervise_session(&registry, ConnectionId::new(2), async { None }).await;

        assert!(held.is_none());
        assert_eq!(registry.snapshot_names().await, vec![dn("bob")]);
        assert!(bob_queue.try_recv().is_err());
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:8765".to_string(),
            error: "address in use".to_string(),
        };
        assert!(err.to_string().contains("127.0.0.1:8765"));
        assert!(err.to_string().contains("address in use"));
    }

    #[tokio::test]
    async fn test_bind_reports_port_in_use() {
        let settings = RelayConfig::default().connection_settings();
        let first = RelayServer::bind(
            "127.0.0.1:0",
            spawn_registry(),
            settings,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let addr = first.local_addr().unwrap().to_string();

        let second =
            RelayServer::bind(&addr, spawn_registry(), settings, CancellationToken::new()).await;
        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_run_returns_on_cancel() {
        let cancel_token = CancellationToken::new();
        let server = RelayServer::bind(
            "127.0.0.1:0",
            spawn_registry(),
            RelayConfig::default().connection_settings(),
            cancel_token.clone(),
        )
        .await
        .unwrap();

        let task = tokio::spawn(server.run());
        cancel_token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
