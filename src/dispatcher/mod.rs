//! Dispatcher — routes each decoded [`Action`] to the component that owns it.
//!
//! | action        | effect                                         |
//! |---------------|------------------------------------------------|
//! | `Register`    | `Registry::upsert` with the sender's channel   |
//! | `HeartBeat`   | `Registry::touch`                              |
//! | `Broadcast`   | [`Broadcaster::broadcast`]                     |
//! | `Unknown`     | logged, nothing else                           |
//! | `DecodeError` | `error` frame written back to the sender       |
//!
//! Nothing here awaits: registry operations are short critical sections and
//! channel sends only enqueue.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastReport, Broadcaster};
use crate::protocol::{self, Action, Outbound};
use crate::registry::{Channel, Registry};

/// What the dispatcher did with one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// The sender's channel is now registered under `id`.
    Registered { id: String, replaced: bool },
    /// A heartbeat was processed; `known` is `false` if `id` was not registered.
    HeartBeat { id: String, known: bool },
    /// A payload was fanned out.
    Broadcast(BroadcastReport),
    /// The envelope type was not recognized; nothing happened.
    Ignored { kind: String },
    /// The payload was rejected and the sender was told why.
    Rejected { reason: String },
}

/// Stateless router from [`Action`] to registry and broadcast operations.
///
/// Cheap to clone; every connection task holds its own copy.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
}

impl Dispatcher {
    /// Creates a dispatcher operating on `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        Self {
            registry,
            broadcaster,
        }
    }

    /// Returns the registry this dispatcher mutates.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Decodes one raw inbound payload and handles the resulting action.
    pub fn handle_payload(&self, bytes: &[u8], source: &Arc<dyn Channel>) -> Dispatched {
        let action = protocol::decode(bytes);
        debug!(
            channel = %source.id(),
            kind = action.kind().unwrap_or("<undecodable>"),
            len = bytes.len(),
            "inbound payload"
        );
        self.handle(action, source)
    }

    /// Handles one decoded action received on `source`.
    pub fn handle(&self, action: Action, source: &Arc<dyn Channel>) -> Dispatched {
        match action {
            Action::Register { id } => {
                let replaced = self
                    .registry
                    .upsert(id.clone(), Arc::clone(source), Instant::now())
                    .is_some();
                info!(id = %id, channel = %source.id(), replaced, "connection registered");
                Dispatched::Registered { id, replaced }
            }
            Action::HeartBeat { id } => {
                let known = self.registry.touch(&id, Instant::now());
                if !known {
                    info!(id = %id, channel = %source.id(), "heartbeat for unregistered id");
                }
                Dispatched::HeartBeat { id, known }
            }
            Action::Broadcast { payload } => {
                Dispatched::Broadcast(self.broadcaster.broadcast(&payload))
            }
            Action::Unknown { kind } => {
                info!(kind = %kind, channel = %source.id(), "unknown message type");
                Dispatched::Ignored { kind }
            }
            Action::DecodeError { reason } => {
                warn!(channel = %source.id(), reason = %reason, "rejected message");
                reply_error(source.as_ref(), &reason);
                Dispatched::Rejected { reason }
            }
        }
    }
}

/// Writes an `error` frame to `channel`, best-effort.
fn reply_error(channel: &dyn Channel, reason: &str) {
    let frame = match (Outbound::Error { reason }).to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "failed to encode error reply");
            return;
        }
    };
    if let Err(e) = channel.send(&frame) {
        warn!(error = %e, "failed to deliver error reply");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;
    use serde_json::value::RawValue;

    use super::*;
    use crate::background::Sweeper;
    use crate::registry::channel::mock::MockChannel;

    fn setup() -> (Dispatcher, Arc<MockChannel>, Arc<dyn Channel>) {
        let dispatcher = Dispatcher::new(Arc::new(Registry::new()));
        let mock = MockChannel::new(1);
        let source: Arc<dyn Channel> = mock.clone();
        (dispatcher, mock, source)
    }

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_owned()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn register_heartbeat_unknown_malformed_then_evicted() {
        let (dispatcher, mock, source) = setup();
        let registry = Arc::clone(dispatcher.registry());

        let outcome = dispatcher.handle_payload(br#"{"type":"register","data":{"id":"alice"}}"#, &source);
        assert_eq!(
            outcome,
            Dispatched::Registered { id: "alice".into(), replaced: false }
        );
        let registered_at = registry.get("alice").unwrap().last_heartbeat_at;

        tokio::time::advance(Duration::from_secs(1)).await;
        let outcome = dispatcher.handle_payload(br#"{"type":"heartBeat","data":{"id":"alice"}}"#, &source);
        assert_eq!(outcome, Dispatched::HeartBeat { id: "alice".into(), known: true });
        let beat_at = registry.get("alice").unwrap().last_heartbeat_at;
        assert_eq!(beat_at - registered_at, Duration::from_secs(1));

        let outcome = dispatcher.handle_payload(br#"{"type":"bogus","data":{}}"#, &source);
        assert_eq!(outcome, Dispatched::Ignored { kind: "bogus".into() });
        assert!(mock.frames().is_empty());
        assert_eq!(registry.get("alice").unwrap().last_heartbeat_at, beat_at);

        let outcome = dispatcher.handle_payload(b"not json", &source);
        assert!(matches!(outcome, Dispatched::Rejected { .. }));
        let frames = mock.frames();
        assert_eq!(frames.len(), 1);
        let reply: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(reply["type"], "error");
        assert!(reply["data"]["reason"].as_str().unwrap().contains("unable to parse"));
        assert_eq!(registry.len(), 1);
        assert!(!mock.is_closed());

        let ttl = Duration::from_millis(120_000);
        tokio::time::advance(ttl + Duration::from_millis(1)).await;
        let evicted = Sweeper::new(Arc::clone(&registry), ttl, Duration::from_secs(10))
            .sweep(Instant::now());
        assert_eq!(evicted, vec!["alice".to_owned()]);
        assert!(!registry.contains("alice"));
        assert!(mock.is_closed());
    }

    #[test]
    fn reregister_reports_replacement_and_keeps_newest_channel() {
        let (dispatcher, _, first) = setup();
        let second: Arc<dyn Channel> = MockChannel::new(2);

        dispatcher.handle(Action::Register { id: "alice".into() }, &first);
        let outcome = dispatcher.handle(Action::Register { id: "alice".into() }, &second);

        assert_eq!(
            outcome,
            Dispatched::Registered { id: "alice".into(), replaced: true }
        );
        let registry = dispatcher.registry();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("alice").unwrap().channel_id(), second.id());
    }

    #[test]
    fn heartbeat_for_unknown_id_changes_nothing() {
        let (dispatcher, mock, source) = setup();
        let outcome = dispatcher.handle(Action::HeartBeat { id: "ghost".into() }, &source);

        assert_eq!(outcome, Dispatched::HeartBeat { id: "ghost".into(), known: false });
        assert!(dispatcher.registry().is_empty());
        assert!(mock.frames().is_empty());
    }

    #[test]
    fn broadcast_reaches_registered_connections_including_sender() {
        let (dispatcher, sender, source) = setup();
        let other = MockChannel::new(2);
        let other_source: Arc<dyn Channel> = other.clone();

        dispatcher.handle(Action::Register { id: "alice".into() }, &source);
        dispatcher.handle(Action::Register { id: "bob".into() }, &other_source);

        let payload = raw(r#"{"sender":"alice","text":"hi"}"#);
        let outcome = dispatcher.handle(Action::Broadcast { payload }, &source);

        assert_eq!(
            outcome,
            Dispatched::Broadcast(BroadcastReport { delivered: 2, evicted: 0 })
        );
        let expected = r#"{"type":"message","data":{"sender":"alice","text":"hi"}}"#;
        for channel in [&sender, &other] {
            assert_eq!(channel.frames(), vec![expected.to_owned()]);
        }
    }

    #[test]
    fn broadcast_keeps_key_order_and_number_precision() {
        let (dispatcher, sender, source) = setup();
        dispatcher.handle(Action::Register { id: "alice".into() }, &source);

        dispatcher.handle_payload(
            br#"{"type":"message","data":{"z":1,"a":12345678901234567890123,"p":0.10000000000000000555}}"#,
            &source,
        );

        assert_eq!(
            sender.frames(),
            vec![
                r#"{"type":"message","data":{"z":1,"a":12345678901234567890123,"p":0.10000000000000000555}}"#
                    .to_owned()
            ]
        );
    }

    #[test]
    fn unregistered_sender_can_still_broadcast() {
        let (dispatcher, sender, source) = setup();
        let listener = MockChannel::new(2);
        dispatcher.registry().upsert("bob", listener.clone(), Instant::now());

        dispatcher.handle(Action::Broadcast { payload: raw(r#""hey""#) }, &source);

        assert!(sender.frames().is_empty());
        assert_eq!(listener.frames().len(), 1);
    }

    #[test]
    fn schema_error_reply_names_the_type() {
        let (dispatcher, mock, source) = setup();
        dispatcher.handle_payload(br#"{"type":"register","data":{"name":"alice"}}"#, &source);

        let reply: Value = serde_json::from_str(&mock.frames()[0]).unwrap();
        assert!(reply["data"]["reason"].as_str().unwrap().contains("`register`"));
        assert!(dispatcher.registry().is_empty());
    }

    #[test]
    fn error_reply_to_dead_sender_is_absorbed() {
        let dispatcher = Dispatcher::new(Arc::new(Registry::new()));
        let source: Arc<dyn Channel> = MockChannel::failing(9);

        let outcome = dispatcher.handle_payload(b"{", &source);
        assert!(matches!(outcome, Dispatched::Rejected { .. }));
    }
}
