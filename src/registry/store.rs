//! Registry implementation.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::channel::{Channel, ChannelId};
use super::entry::Connection;

/// Concurrent id → [`Connection`] map.
///
/// Every operation is scoped to a single key and linearizable per key.
/// [`snapshot`](Self::snapshot) tolerates concurrent mutation: it returns the
/// entries it saw while walking the shards, each one fully formed.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rtrelay::registry::{Channel, ChannelError, ChannelId, Registry};
/// use tokio::time::Instant;
///
/// #[derive(Debug)]
/// struct Null;
///
/// impl Channel for Null {
///     fn id(&self) -> ChannelId { ChannelId::new(1) }
///     fn send(&self, _frame: &str) -> Result<(), ChannelError> { Ok(()) }
///     fn close(&self) {}
/// }
///
/// let registry = Registry::new();
/// registry.upsert("alice", Arc::new(Null), Instant::now());
/// assert!(registry.contains("alice"));
///
/// registry.remove("alice");
/// registry.remove("alice");
/// assert!(registry.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    connections: DashMap<String, Connection>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `id`, starting its liveness clock at `now`.
    ///
    /// The last registration wins. The replaced entry, if any, is returned
    /// but its channel is left open: it just stops being reachable through
    /// the registry.
    pub fn upsert(
        &self,
        id: impl Into<String>,
        channel: Arc<dyn Channel>,
        now: Instant,
    ) -> Option<Connection> {
        let connection = Connection::new(id, channel, now);
        let id = connection.id.clone();
        let replaced = self.connections.insert(id, connection);
        if let Some(ref previous) = replaced {
            debug!(
                id = %previous.id,
                previous_channel = %previous.channel_id(),
                "registration replaced"
            );
        }
        replaced
    }

    /// Refreshes the liveness timestamp of `id`.
    ///
    /// Returns `false` (and changes nothing) when `id` is not registered.
    pub fn touch(&self, id: &str, now: Instant) -> bool {
        match self.connections.get_mut(id) {
            Some(mut entry) => {
                entry.last_heartbeat_at = now;
                true
            }
            None => false,
        }
    }

    /// Returns a copy of every entry currently registered.
    ///
    /// The result is not an atomic snapshot: entries inserted or removed
    /// while the shards are being walked may or may not appear.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Removes the entry for `id`. Removing an absent id is a no-op.
    pub fn remove(&self, id: &str) -> Option<Connection> {
        self.connections.remove(id).map(|(_, connection)| connection)
    }

    /// Removes the entry for `id` only while it still holds `channel`.
    ///
    /// A failed send or a socket close must not evict a newer registration
    /// of the same id made over a different connection.
    pub fn remove_if_channel(&self, id: &str, channel: ChannelId) -> Option<Connection> {
        self.connections
            .remove_if(id, |_, connection| connection.channel_id() == channel)
            .map(|(_, connection)| connection)
    }

    /// Removes the entry for `id` only while its last heartbeat is older
    /// than `deadline`.
    pub fn remove_if_stale(&self, id: &str, deadline: Instant) -> Option<Connection> {
        self.connections
            .remove_if(id, |_, connection| connection.is_stale(deadline))
            .map(|(_, connection)| connection)
    }

    /// Returns a copy of the entry for `id`.
    pub fn get(&self, id: &str) -> Option<Connection> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Returns `true` if `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
