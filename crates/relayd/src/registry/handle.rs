//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor, plus the broadcast operation built on top of the
//! recipient snapshot.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use relay_core::{ConnectionId, DisplayName};

use super::commands::{RegistryCommand, RegistryError};
use crate::peer::Peer;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients whose queue accepted the record
    pub delivered: usize,
    /// Recipients that were closed or backlogged
    pub failed: usize,
}

impl BroadcastReport {
    /// Total recipients in the snapshot.
    pub fn recipients(&self) -> usize {
        self.delivered + self.failed
    }
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Claim `name` for the connection behind `peer`.
    ///
    /// The uniqueness check and the insertion happen in a single actor turn.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NameTaken` if another connection holds the name
    /// - `RegistryError::AlreadyRegistered` if this connection already holds a name
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn try_add(&self, peer: Peer, name: DisplayName) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::TryAdd {
                peer,
                name,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove the connection's entry, returning the freed name.
    ///
    /// Returns `None` if there was no entry (or the actor is gone), so
    /// calling this twice is harmless.
    pub async fn remove(&self, connection_id: ConnectionId) -> Option<DisplayName> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Remove {
                connection_id,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Get the name held by a connection.
    pub async fn lookup(&self, connection_id: ConnectionId) -> Option<DisplayName> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Lookup {
                connection_id,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Get all current names in join order.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot_names(&self) -> Vec<DisplayName> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::SnapshotNames { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Get all current peers in join order.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn recipients(&self) -> Vec<Peer> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Recipients { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Deliver an encoded record to every registered connection.
    ///
    /// The recipient list is a snapshot; sends happen concurrently after the
    /// actor has moved on. A failed send affects only that recipient and
    /// never touches the registry; its own session reaps the entry.
    pub async fn broadcast(&self, payload: Arc<str>) -> BroadcastReport {
        let recipients = self.recipients().await;

        let results = join_all(
            recipients
                .iter()
                .map(|peer| peer.send_text(Arc::clone(&payload))),
        )
        .await;

        let mut report = BroadcastReport::default();
        for result in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(error = %e, "Broadcast delivery failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::peer::Outbound;

    fn create_test_handle() -> (RegistryHandle, mpsc::Receiver<RegistryCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        (RegistryHandle::new(cmd_tx), cmd_rx)
    }

    fn peer(id: u64) -> (Peer, mpsc::Receiver<Outbound>) {
        Peer::channel(ConnectionId::new(id), 4, Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_handle_is_clone() {
        let (handle, _rx) = create_test_handle();
        let _cloned = handle.clone();
    }

    #[tokio::test]
    async fn test_try_add_sends_command() {
        let (handle, mut rx) = create_test_handle();
        let (peer, _out) = peer(1);

        let cmd_handler = tokio::spawn(async move {
            if let Some(RegistryCommand::TryAdd {
                peer,
                name,
                respond_to,
            }) = rx.recv().await
            {
                assert_eq!(peer.id(), ConnectionId::new(1));
                assert_eq!(name.as_str(), "alice");
                let _ = respond_to.send(Ok(()));
                return true;
            }
            false
        });

        let result = handle
            .try_add(peer, DisplayName::parse("alice").unwrap())
            .await;
        assert!(result.is_ok());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_try_add_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let (peer, _out) = peer(1);
        let result = handle
            .try_add(peer, DisplayName::parse("alice").unwrap())
            .await;
        assert_eq!(result, Err(RegistryError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_queries_are_empty_on_channel_close() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(handle.remove(ConnectionId::new(1)).await.is_none());
        assert!(handle.lookup(ConnectionId::new(1)).await.is_none());
        assert!(handle.snapshot_names().await.is_empty());
        assert!(handle.recipients().await.is_empty());
        assert_eq!(handle.broadcast(Arc::from("x")).await, BroadcastReport::default());
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_broadcast_skips_dead_peers() {
        let (handle, mut rx) = create_test_handle();
        let (alive, mut alive_out) = peer(1);
        let (dead, dead_out) = peer(2);
        drop(dead_out);

        tokio::spawn(async move {
            if let Some(RegistryCommand::Recipients { respond_to }) = rx.recv().await {
                let _ = respond_to.send(vec![alive, dead]);
            }
        });

        let report = handle.broadcast(Arc::from("hello")).await;
        assert_eq!(report, BroadcastReport { delivered: 1, failed: 1 });
        assert_eq!(report.recipients(), 2);

        match alive_out.recv().await {
            Some(Outbound::Text(text)) => assert_eq!(&*text, "hello"),
            other => panic!("expected text, got {other:?}"),
        }
    }
}
