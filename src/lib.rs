//! # rtrelay
//!
//! A real-time WebSocket fan-out relay.
//!
//! Clients connect, register an identity, send periodic heartbeats and
//! broadcast messages that are delivered to every registered client.
//! Clients that stop sending heartbeats are evicted after a TTL.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rtrelay::config::RelayConfig;
//! use rtrelay::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(RelayConfig::default()).await?;
//!     println!("Listening on ws://{}", server.local_addr());
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Wire protocol
//!
//! ```text
//! → {"type":"register","data":{"id":"alice"}}
//! → {"type":"heartBeat","data":{"id":"alice"}}
//! → {"type":"message","data":{"sender":"alice","text":"hi"}}
//! ← {"type":"message","data":{"sender":"alice","text":"hi"}}
//! ← {"type":"error","data":{"reason":"unable to parse message"}}
//! ```

// ── Core: protocol, state and the engines that act on it ─────────────────────
pub mod background;
pub mod broadcast;
pub mod dispatcher;
pub mod protocol;
pub mod registry;

// ── Outer surfaces: configuration and transport ──────────────────────────────
pub mod config;
pub mod realtime;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use background::Sweeper;
pub use broadcast::{BroadcastReport, Broadcaster};
pub use config::{ConfigError, RelayConfig};
pub use dispatcher::{Dispatched, Dispatcher};
pub use protocol::{Action, Outbound, decode};
pub use registry::{Channel, ChannelError, ChannelId, Connection, Registry};
pub use server::{Server, ServerError};
