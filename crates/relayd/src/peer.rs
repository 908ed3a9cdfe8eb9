//! Outbound queues for connected clients.
//!
//! Every connection owns a bounded queue drained by a dedicated writer task
//! that holds the WebSocket sink. A [`Peer`] is the sending side of that
//! queue; the registry stores peers, never sockets, so a slow or dead client
//! can only ever stall its own writer.

use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use relay_core::ConnectionId;

/// Items queued for a connection's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// An encoded record
    Text(Arc<str>),
    /// Send a close frame and stop writing
    Close,
}

/// Sending side of one connection's outbound queue.
///
/// Cheap to clone; clones share the same queue.
#[derive(Debug, Clone)]
pub struct Peer {
    id: ConnectionId,
    sender: mpsc::Sender<Outbound>,
    send_timeout: Duration,
}

impl Peer {
    /// Creates a peer around an existing queue.
    pub fn new(id: ConnectionId, sender: mpsc::Sender<Outbound>, send_timeout: Duration) -> Self {
        Self {
            id,
            sender,
            send_timeout,
        }
    }

    /// Creates a peer together with the receiving end of its queue.
    pub fn channel(
        id: ConnectionId,
        capacity: usize,
        send_timeout: Duration,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, tx, send_timeout), rx)
    }

    /// Returns the connection this peer writes to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues an encoded record.
    ///
    /// Waits at most the send timeout for queue space.
    ///
    /// # Errors
    ///
    /// - `PeerError::Closed` if the writer has stopped
    /// - `PeerError::Backlogged` if the queue stayed full for the whole timeout
    pub async fn send_text(&self, payload: Arc<str>) -> Result<(), PeerError> {
        self.sender
            .send_timeout(Outbound::Text(payload), self.send_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => PeerError::Backlogged(self.id),
                SendTimeoutError::Closed(_) => PeerError::Closed(self.id),
            })
    }

    /// Asks the writer to send a close frame and stop.
    ///
    /// # Errors
    ///
    /// - `PeerError::Closed` if the writer has already stopped
    pub async fn close(&self) -> Result<(), PeerError> {
        self.sender
            .send(Outbound::Close)
            .await
            .map_err(|_| PeerError::Closed(self.id))
    }

    /// Returns true once the writer task has dropped its queue.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Completes once the writer task has stopped and dropped its queue.
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}

/// Errors delivering to a single peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("connection {0} outbound queue is full")]
    Backlogged(ConnectionId),
}

/// Spawns the writer task that drains `queue` into `sink`.
///
/// The task stops when:
/// - every [`Peer`] clone has been dropped
/// - an `Outbound::Close` is received
/// - a write fails or takes longer than `write_timeout`
///
/// Dropping the queue on exit makes every later send to this peer fail.
pub fn spawn_writer<S>(
    id: ConnectionId,
    mut sink: S,
    mut queue: mpsc::Receiver<Outbound>,
    write_timeout: Duration,
) -> JoinHandle<()>
where
    S: Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = queue.recv().await {
            let message = match item {
                Outbound::Text(payload) => Message::text(payload.to_string()),
                Outbound::Close => {
                    let _ = timeout(write_timeout, sink.send(Message::Close(None))).await;
                    debug!(connection = %id, "Writer closed connection");
                    break;
                }
            };

            match timeout(write_timeout, sink.send(message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(connection = %id, error = %e, "Write failed, stopping writer");
                    break;
                }
                Err(_) => {
                    debug!(connection = %id, "Write timed out, stopping writer");
                    break;
                }
            }
        }

        queue.close();
        let _ = timeout(write_timeout, sink.close()).await;
    })
}
