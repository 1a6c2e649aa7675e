//! Connection registry — who is connected, and when they were last heard from.
//!
//! The registry maps a client-chosen id to the [`Connection`] that registered
//! it. It is the only shared mutable state in the relay: every connection
//! task, the broadcast engine and the eviction sweeper operate on the same
//! `Arc<Registry>`.
//!
//! # Architecture
//!
//! ```text
//!                     Arc<Registry>
//!            ┌──────────────────────────────┐
//!            │ DashMap<String, Connection { │
//!            │   channel: Arc<dyn Channel>, │
//!            │   last_heartbeat_at,         │
//!            │ }>                           │
//!            └──────────────┬───────────────┘
//!                           │
//!        ┌──────────────────┼──────────────────┐
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!   [Dispatcher]      [Broadcaster]        [Sweeper]
//!   upsert/touch      snapshot/remove      snapshot/remove
//! ```
//!
//! `DashMap` shards the key space, so operations on different ids rarely
//! contend and a broadcast walking the map never blocks the whole registry.

pub mod channel;
pub mod entry;
pub mod store;

pub use channel::{Channel, ChannelError, ChannelId};
pub use entry::Connection;
pub use store::Registry;
