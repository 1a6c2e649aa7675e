//! Per-client state stored in the registry.

use std::sync::Arc;

use tokio::time::Instant;

use super::channel::{Channel, ChannelId};

/// One registered client session.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Identity chosen by the client at registration.
    pub id: String,
    /// Handle used to push frames to the client.
    pub channel: Arc<dyn Channel>,
    /// Set on registration, refreshed on every heartbeat.
    pub last_heartbeat_at: Instant,
}

impl Connection {
    /// Creates an entry whose liveness clock starts at `now`.
    pub fn new(id: impl Into<String>, channel: Arc<dyn Channel>, now: Instant) -> Self {
        Self {
            id: id.into(),
            channel,
            last_heartbeat_at: now,
        }
    }

    /// Identifier of the transport connection behind this entry.
    pub fn channel_id(&self) -> ChannelId {
        self.channel.id()
    }

    /// Returns `true` if the last heartbeat is strictly older than `deadline`.
    pub fn is_stale(&self, deadline: Instant) -> bool {
        self.last_heartbeat_at < deadline
    }
}
