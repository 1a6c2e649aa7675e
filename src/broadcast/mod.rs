//! Broadcast engine — fans one payload out to every registered connection.
//!
//! Delivery is best-effort and at-most-once. Each recipient is attempted
//! independently: a send that fails marks that channel as dead and its
//! registry entry is dropped, but the loop carries on with the rest.

use std::sync::Arc;

use serde_json::value::RawValue;
use tracing::{debug, error, info};

use crate::protocol::Outbound;
use crate::registry::Registry;

/// Outcome of one [`Broadcaster::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Channels that accepted the frame.
    pub delivered: usize,
    /// Entries removed because their channel refused the frame.
    pub evicted: usize,
}

/// Relays broadcast payloads to every connection in the registry.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    /// Creates a broadcaster over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Sends `payload`, wrapped in a `message` envelope, to every registered
    /// connection.
    ///
    /// Never fails: per-recipient errors are absorbed by evicting the
    /// recipient, but only while the id still maps to the channel that
    /// failed. The frame is serialized once and shared by all sends.
    pub fn broadcast(&self, payload: &RawValue) -> BroadcastReport {
        let frame = match Outbound::Message(payload).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "failed to encode broadcast frame");
                return BroadcastReport::default();
            }
        };

        let recipients = self.registry.snapshot();
        let mut report = BroadcastReport::default();

        for connection in recipients {
            match connection.channel.send(&frame) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(id = %connection.id, error = %e, "send failed, dropping connection");
                    if self
                        .registry
                        .remove_if_channel(&connection.id, connection.channel_id())
                        .is_some()
                    {
                        report.evicted += 1;
                    }
                }
            }
        }

        info!(
            delivered = report.delivered,
            evicted = report.evicted,
            "broadcast relayed"
        );
        report
    }
}
