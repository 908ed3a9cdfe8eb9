//! Chat relay daemon - connection registry and broadcast server
//!
//! Accepts WebSocket connections, authenticates each one by display name and
//! fans chat messages out to every authenticated connection.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default 127.0.0.1:8765
//! relayd
//!
//! # Listen on all interfaces, port taken from the environment
//! PORT=9000 relayd --host 0.0.0.0
//!
//! # Enable debug logging
//! RUST_LOG=relayd=debug relayd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting and exit

fn main() -> anyhow::Result<()> {
    relayd::cli::main()
}
