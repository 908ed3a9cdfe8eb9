//! Chat relay daemon - connection registry and broadcast server
//!
//! This crate provides the core infrastructure for the relay:
//! - `registry` - actor owning the connection → display name mapping
//! - `peer` - per-connection outbound queues and writer tasks
//! - `server` - WebSocket listener and the per-connection session engine
//! - `config` - layered configuration (defaults, TOML, environment, flags)
//! - `cli` - the `relayd` binary entry point
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       relayd daemon                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  RelayServer    │────▶│     RegistryActor           │   │
//! │  │  (WebSocket)    │     │  (membership owner)         │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ recipient         │
//! │           ▼                             ▼ snapshots         │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │    Session      │────▶│   Peer queues               │   │
//! │  │  (per client)   │     │   (one writer per client)   │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod cli;
pub mod config;
pub mod peer;
pub mod registry;
pub mod server;
