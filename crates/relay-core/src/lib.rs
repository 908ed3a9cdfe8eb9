//! Relay Core - Shared domain types for the chat relay
//!
//! This crate provides the identity and lifecycle types shared between
//! the wire protocol (`relay-protocol`) and the daemon (`relayd`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod connection;
pub mod error;
pub mod name;
pub mod state;

// Re-exports for convenience
pub use connection::ConnectionId;
pub use error::{DomainError, DomainResult};
pub use name::DisplayName;
pub use state::SessionState;
