//! Connection registry using Actor pattern.
//!
//! The registry is the single owner of the mapping from live connection to
//! claimed display name. It receives commands via a tokio mpsc channel and
//! processes them one at a time, so every operation is atomic with respect
//! to every other: a name check and its insertion can never be split by a
//! concurrent login.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │  Session (N)    │────▶│  RegistryActor  │
//! └─────────────────┘     └─────────────────┘
//!         │                       │
//!         │   RegistryCommand     │   HashMap<ConnectionId, Member>
//!         │   (mpsc channel)      │   HashMap<DisplayName, ConnectionId>
//!         ▼                       ▼
//!    try_add / remove        recipient snapshot ──▶ sends happen
//!    lookup / snapshot                              outside the actor
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError};
pub use handle::{BroadcastReport, RegistryHandle};

/// Channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// The registry lives as long as at least one handle exists; there is no
/// explicit teardown.
///
/// # Example
///
/// ```no_run
/// use relayd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///     let names = handle.snapshot_names().await;
///     assert!(names.is_empty());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
