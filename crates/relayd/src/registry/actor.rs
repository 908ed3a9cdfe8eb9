//! Registry actor - owns all membership state and processes commands.
//!
//! The RegistryActor is the single owner of the connection → name mapping.
//! It receives commands via an mpsc channel and answers on oneshot channels.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Reply send failures are ignored (the caller went away)

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use relay_core::{ConnectionId, DisplayName};

use super::commands::{RegistryCommand, RegistryError};
use crate::peer::Peer;

/// A registered connection.
#[derive(Debug)]
struct Member {
    peer: Peer,
    name: DisplayName,
    /// Join sequence number; orders snapshots
    joined: u64,
}

/// The registry actor - owns all membership state.
///
/// # Ownership
///
/// The actor owns:
/// - `members`: connection → member (primary storage)
/// - `names`: name → connection index, kept in lockstep with `members`
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially.
/// All state mutations happen within this single task.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Primary storage
    members: HashMap<ConnectionId, Member>,

    /// Index for uniqueness checks
    names: HashMap<DisplayName, ConnectionId>,

    /// Next join sequence number
    next_seq: u64,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            members: HashMap::new(),
            names: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(members = self.members.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::TryAdd {
                peer,
                name,
                respond_to,
            } => {
                let result = self.handle_try_add(peer, name);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                connection_id,
                respond_to,
            } => {
                let result = self.handle_remove(connection_id);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Lookup {
                connection_id,
                respond_to,
            } => {
                let result = self.members.get(&connection_id).map(|m| m.name.clone());
                let _ = respond_to.send(result);
            }
            RegistryCommand::SnapshotNames { respond_to } => {
                let names = self.ordered().map(|m| m.name.clone()).collect();
                let _ = respond_to.send(names);
            }
            RegistryCommand::Recipients { respond_to } => {
                let peers = self.ordered().map(|m| m.peer.clone()).collect();
                let _ = respond_to.send(peers);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Checks and inserts in one step.
    fn handle_try_add(&mut self, peer: Peer, name: DisplayName) -> Result<(), RegistryError> {
        let connection_id = peer.id();

        if let Some(existing) = self.members.get(&connection_id) {
            return Err(RegistryError::AlreadyRegistered {
                connection_id,
                name: existing.name.clone(),
            });
        }

        if let Some(holder) = self.names.get(&name) {
            debug!(
                connection = %connection_id,
                holder = %holder,
                name = %name,
                "Name already taken, rejecting"
            );
            return Err(RegistryError::NameTaken(name));
        }

        let joined = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        self.names.insert(name.clone(), connection_id);
        self.members.insert(
            connection_id,
            Member {
                peer,
                name: name.clone(),
                joined,
            },
        );

        info!(
            connection = %connection_id,
            name = %name,
            total = self.members.len(),
            "Member registered"
        );

        Ok(())
    }

    /// Removes a member; a missing entry is not an error.
    fn handle_remove(&mut self, connection_id: ConnectionId) -> Option<DisplayName> {
        let member = self.members.remove(&connection_id)?;
        self.names.remove(&member.name);

        info!(
            connection = %connection_id,
            name = %member.name,
            total = self.members.len(),
            "Member removed"
        );

        Some(member.name)
    }

    /// Members in join order.
    fn ordered(&self) -> impl Iterator<Item = &Member> {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|m| m.joined);
        members.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn create_test_actor() -> RegistryActor {
        let (_tx, rx) = mpsc::channel(16);
        RegistryActor::new(rx)
    }

    fn peer(id: u64) -> Peer {
        let (peer, _rx) = Peer::channel(ConnectionId::new(id), 4, Duration::from_millis(10));
        peer
    }

    fn name(s: &str) -> DisplayName {
        DisplayName::parse(s).unwrap()
    }

    fn snapshot(actor: &RegistryActor) -> Vec<String> {
        actor.ordered().map(|m| m.name.to_string()).collect()
    }

    #[test]
    fn test_try_add_and_remove() {
        let mut actor = create_test_actor();

        assert!(actor.handle_try_add(peer(1), name("alice")).is_ok());
        assert_eq!(snapshot(&actor), vec!["alice"]);

        assert_eq!(actor.handle_remove(ConnectionId::new(1)), Some(name("alice")));
        assert!(snapshot(&actor).is_empty());
        assert!(actor.names.is_empty());
    }

    #[test]
    fn test_duplicate_name_rejected_without_mutation() {
        let mut actor = create_test_actor();
        actor.handle_try_add(peer(1), name("alice")).unwrap();

        let result = actor.handle_try_add(peer(2), name("alice"));
        assert_eq!(result, Err(RegistryError::NameTaken(name("alice"))));
        assert_eq!(actor.members.len(), 1);
        assert!(!actor.members.contains_key(&ConnectionId::new(2)));
    }

    #[test]
    fn test_connection_holds_at_most_one_name() {
        let mut actor = create_test_actor();
        actor.handle_try_add(peer(1), name("alice")).unwrap();

        let result = actor.handle_try_add(peer(1), name("alias"));
        assert_eq!(
            result,
            Err(RegistryError::AlreadyRegistered {
                connection_id: ConnectionId::new(1),
                name: name("alice"),
            })
        );
        assert_eq!(snapshot(&actor), vec!["alice"]);
    }

    #[test]
    fn test_double_remove_is_noop() {
        let mut actor = create_test_actor();
        actor.handle_try_add(peer(1), name("alice")).unwrap();

        assert!(actor.handle_remove(ConnectionId::new(1)).is_some());
        assert!(actor.handle_remove(ConnectionId::new(1)).is_none());
        assert!(actor.handle_remove(ConnectionId::new(99)).is_none());
    }

    #[test]
    fn test_name_reusable_after_remove() {
        let mut actor = create_test_actor();
        actor.handle_try_add(peer(1), name("alice")).unwrap();
        actor.handle_remove(ConnectionId::new(1));

        assert!(actor.handle_try_add(peer(2), name("alice")).is_ok());
    }

    #[test]
    fn test_snapshot_in_join_order() {
        let mut actor = create_test_actor();
        // Connection ids deliberately out of join order
        actor.handle_try_add(peer(9), name("carol")).unwrap();
        actor.handle_try_add(peer(2), name("alice")).unwrap();
        actor.handle_try_add(peer(5), name("bob")).unwrap();
        actor.handle_remove(ConnectionId::new(2));
        actor.handle_try_add(peer(3), name("dave")).unwrap();

        assert_eq!(snapshot(&actor), vec!["carol", "bob", "dave"]);

        let ids: Vec<u64> = actor.ordered().map(|m| m.peer.id().get()).collect();
        assert_eq!(ids, vec![9, 5, 3]);
    }
}
