//! Session engine for individual client connections.
//!
//! Each accepted connection gets its own `Session` that:
//! - Waits for the login record and claims the name in the registry
//! - Announces the join and fans chat messages out to every member
//! - Releases the name and announces the departure on every exit path
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use relay_core::{ConnectionId, DisplayName, DomainError, SessionState};
use relay_protocol::{
    decode_client, decode_client_bytes, encode_server, ClientRecord, DecodeError, ServerRecord,
};

use super::broadcast::{announce_roster_change, broadcast_record, cleanup_connection};
use crate::peer::Peer;
use crate::registry::{RegistryError, RegistryHandle};

/// Placeholder used in logs before a name is known.
const ANONYMOUS: &str = "<anonymous>";

/// One connection's login → chat → cleanup state machine.
///
/// `S` is the inbound half of the transport. Outbound traffic goes through
/// `peer`, which is also what the registry hands to broadcasts.
pub struct Session<S> {
    /// Connection this session drives
    connection_id: ConnectionId,

    /// Inbound frames
    inbound: S,

    /// Outbound queue for this connection
    peer: Peer,

    /// Handle to the shared registry
    registry: RegistryHandle,

    /// Lifecycle state
    state: SessionState,
}

impl<S> Session<S>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    /// Creates a session in the `Unauthenticated` state.
    pub fn new(
        connection_id: ConnectionId,
        inbound: S,
        peer: Peer,
        registry: RegistryHandle,
    ) -> Self {
        Self {
            connection_id,
            inbound,
            peer,
            registry,
            state: SessionState::Unauthenticated,
        }
    }

    /// Runs the session to completion.
    ///
    /// Returns the name the session held, if its login succeeded. Cleanup
    /// has already run by the time this returns.
    pub async fn run(mut self) -> Option<DisplayName> {
        debug!(connection = %self.connection_id, "New client connected");

        if let Err(e) = self.drive().await {
            self.log_failure(&e);
        }

        self.finish().await
    }

    /// Login, announce, then relay chat until the transport goes away.
    async fn drive(&mut self) -> Result<(), SessionError> {
        let Some(name) = self.login().await? else {
            debug!(connection = %self.connection_id, "Client left before logging in");
            return Ok(());
        };

        info!(connection = %self.connection_id, name = %name, "Member joined");
        announce_roster_change(&self.registry, &ServerRecord::joined(&name)).await;

        self.relay_chat(&name).await
    }

    /// Waits for the first record and claims its name.
    ///
    /// Returns `Ok(None)` if the transport closed before anything arrived.
    async fn login(&mut self) -> Result<Option<DisplayName>, SessionError> {
        let Some(record) = self.next_record().await? else {
            return Ok(None);
        };

        let username = match record {
            ClientRecord::Login { username } => username,
            other => return Err(SessionError::ExpectedLogin(other.kind())),
        };

        let name = match DisplayName::from_login(username) {
            Ok(name) => name,
            Err(e) => return Err(self.reject(SessionError::InvalidName(e)).await),
        };

        match self.registry.try_add(self.peer.clone(), name.clone()).await {
            Ok(()) => {}
            Err(RegistryError::NameTaken(name)) => {
                return Err(self.reject(SessionError::NameTaken(name)).await);
            }
            Err(e) => return Err(e.into()),
        }

        self.state.authenticate(name.clone());
        Ok(Some(name))
    }

    /// Tells this client its login was refused and closes the connection.
    async fn reject(&mut self, reason: SessionError) -> SessionError {
        match encode_server(&ServerRecord::login_rejected()) {
            Ok(payload) => {
                if let Err(e) = self.peer.send_text(Arc::from(payload)).await {
                    debug!(connection = %self.connection_id, error = %e, "Could not deliver login rejection");
                }
            }
            Err(e) => error!(connection = %self.connection_id, error = %e, "Failed to encode login rejection"),
        }

        let _ = self.peer.close().await;
        reason
    }

    /// Fans chat messages out until the transport closes.
    async fn relay_chat(&mut self, name: &DisplayName) -> Result<(), SessionError> {
        while let Some(record) = self.next_record().await? {
            match record {
                ClientRecord::ChatMessage { message } => {
                    let record = ServerRecord::chat(name.clone(), message);
                    let report = broadcast_record(&self.registry, &record).await;
                    debug!(
                        name = %name,
                        delivered = report.delivered,
                        failed = report.failed,
                        "Chat message relayed"
                    );
                }
                other => {
                    debug!(name = %name, kind = other.kind(), "Ignoring record");
                }
            }
        }

        Ok(())
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` on a close frame, end of stream, or once the
    /// writer task has stopped (the client can no longer be reached).
    /// Control frames are skipped.
    async fn next_record(&mut self) -> Result<Option<ClientRecord>, SessionError> {
        loop {
            let frame = tokio::select! {
                frame = self.inbound.next() => frame,
                () = self.peer.closed() => {
                    debug!(connection = %self.connection_id, "Writer stopped, ending session");
                    return Ok(None);
                }
            };

            let message = match frame {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(SessionError::Transport(e.to_string())),
                None => return Ok(None),
            };

            let record = match message {
                Message::Text(text) => decode_client(&text)?,
                Message::Binary(bytes) => decode_client_bytes(&bytes)?,
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            debug!(
                connection = %self.connection_id,
                kind = record.kind(),
                "Received record"
            );
            return Ok(Some(record));
        }
    }

    /// Moves to `Closed`, releasing the registry entry if one was created.
    async fn finish(&mut self) -> Option<DisplayName> {
        let held = match self.state.close() {
            SessionState::Authenticated(_) => {
                cleanup_connection(&self.registry, self.connection_id).await
            }
            _ => None,
        };

        let _ = self.peer.close().await;
        debug!(connection = %self.connection_id, "Client disconnected");
        held
    }

    fn log_failure(&self, err: &SessionError) {
        let name = self.state.name().map_or(ANONYMOUS, DisplayName::as_str);

        match err {
            SessionError::Transport(_) => {
                info!(connection = %self.connection_id, name = %name, error = %err, "Connection closed abruptly");
            }
            SessionError::InvalidName(_) | SessionError::NameTaken(_) => {
                warn!(connection = %self.connection_id, name = %name, error = %err, "Login rejected");
            }
            SessionError::ExpectedLogin(_) | SessionError::Decode(_) => {
                warn!(
                    connection = %self.connection_id,
                    name = %name,
                    error = %err,
                    "Protocol violation, closing connection"
                );
            }
            SessionError::Registry(_) => {
                error!(connection = %self.connection_id, name = %name, error = %err, "Session failed");
            }
        }
    }
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Expected login record, got {0}")]
    ExpectedLogin(&'static str),

    #[error("Invalid name: {0}")]
    InvalidName(#[from] DomainError),

    #[error("Name already taken: {0}")]
    NameTaken(DisplayName),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
