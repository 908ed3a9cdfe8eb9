//! Registry actor commands and errors.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations

use relay_core::{ConnectionId, DisplayName};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::peer::Peer;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Claim a display name for a connection.
    ///
    /// # Errors
    /// - `RegistryError::NameTaken` if any connection holds the name
    /// - `RegistryError::AlreadyRegistered` if this connection holds a name
    TryAdd {
        /// Outbound handle of the connection claiming the name
        peer: Peer,
        /// The requested name
        name: DisplayName,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Release the connection's entry, returning the freed name.
    ///
    /// Removing a connection without an entry is a no-op that returns `None`.
    Remove {
        /// Connection to remove
        connection_id: ConnectionId,
        /// Channel to send the freed name
        respond_to: oneshot::Sender<Option<DisplayName>>,
    },

    /// Look up the name held by a connection.
    Lookup {
        /// Connection to look up
        connection_id: ConnectionId,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<DisplayName>>,
    },

    /// Copy all current names in join order.
    SnapshotNames {
        /// Channel to send the names
        respond_to: oneshot::Sender<Vec<DisplayName>>,
    },

    /// Copy all current peers in join order (broadcast recipients).
    Recipients {
        /// Channel to send the peers
        respond_to: oneshot::Sender<Vec<Peer>>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another connection already holds this name.
    #[error("name already taken: {0}")]
    NameTaken(DisplayName),

    /// This connection already holds a name.
    #[error("connection {connection_id} already registered as '{name}'")]
    AlreadyRegistered {
        /// The connection that tried to register twice
        connection_id: ConnectionId,
        /// The name it already holds
        name: DisplayName,
    },

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}
