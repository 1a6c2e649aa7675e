//! Real-time transport — WebSocket connections feeding the dispatcher.
//!
//! Each accepted socket is split in two tasks:
//!
//! ```text
//!   socket ──read──► serve() ──decode/dispatch──► Registry / Broadcaster
//!      ▲                                              │
//!      └──write── writer task ◄── mpsc ◄── WsChannel ◄┘
//! ```
//!
//! The [`WsChannel`] stored in the registry only enqueues frames, so a slow
//! client never stalls a broadcast. When the writer task ends the queue
//! closes and every later send fails, which is how dead sockets are
//! detected and reclaimed.

pub mod channel;
pub mod connection;

pub use channel::WsChannel;
pub use connection::serve;
