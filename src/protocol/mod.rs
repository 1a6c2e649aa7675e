//! Wire protocol — inbound envelope decoding and outbound frame encoding.
//!
//! Every inbound WebSocket message carries exactly one envelope:
//!
//! ```text
//! { "type": "register" | "heartBeat" | "message", "data": { ... } }
//! ```
//!
//! [`decode`] turns the raw bytes into an [`Action`]. It never fails: a
//! payload that cannot be understood becomes [`Action::DecodeError`] so the
//! dispatcher can answer the sender instead of dropping the connection.

use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::debug;

pub mod outbound;

pub use outbound::Outbound;

/// Reason reported when the envelope itself (or its `type`) cannot be read.
const GENERIC_DECODE_REASON: &str = "unable to parse message";

/// A decoded inbound message.
///
/// The set of variants is closed: the dispatcher matches on it exhaustively.
///
/// # Examples
///
/// ```
/// use rtrelay::protocol::{decode, Action};
///
/// let action = decode(br#"{"type":"register","data":{"id":"alice"}}"#);
/// assert_eq!(action, Action::Register { id: "alice".to_owned() });
///
/// let action = decode(b"not json");
/// assert!(matches!(action, Action::DecodeError { .. }));
/// ```
#[derive(Debug, Clone)]
pub enum Action {
    /// The client declares its identity.
    Register { id: String },
    /// Liveness signal for an identity registered earlier.
    HeartBeat { id: String },
    /// Application payload to relay verbatim to every registered connection.
    ///
    /// Kept as the exact JSON text the client sent, so key order and number
    /// precision survive the relay.
    Broadcast { payload: Box<RawValue> },
    /// The envelope parsed but its `type` matches no known action.
    Unknown { kind: String },
    /// The payload could not be decoded or failed schema validation.
    DecodeError { reason: String },
}

impl Action {
    /// Returns the wire `type` this action was decoded from, if it has one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Register { .. } => Some("register"),
            Self::HeartBeat { .. } => Some("heartBeat"),
            Self::Broadcast { .. } => Some("message"),
            Self::Unknown { kind } => Some(kind.as_str()),
            Self::DecodeError { .. } => None,
        }
    }
}

/// Broadcast payloads compare by their raw JSON text.
impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Register { id: a }, Self::Register { id: b })
            | (Self::HeartBeat { id: a }, Self::HeartBeat { id: b }) => a == b,
            (Self::Broadcast { payload: a }, Self::Broadcast { payload: b }) => a.get() == b.get(),
            (Self::Unknown { kind: a }, Self::Unknown { kind: b }) => a == b,
            (Self::DecodeError { reason: a }, Self::DecodeError { reason: b }) => a == b,
            _ => false,
        }
    }
}

/// Outer `{type, data}` shape. `data` stays raw text until `type` is known;
/// a JSON `null` reads as absent.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

/// `data` for `register` and `heartBeat`.
#[derive(Debug, Deserialize)]
struct IdentityData {
    id: String,
}

/// Decodes one raw inbound payload into an [`Action`].
///
/// Decoding runs in two stages: the envelope is parsed and its `type`
/// extracted, then `data` is deserialized into the payload for that type.
/// A failure in the first stage yields a generic [`Action::DecodeError`]; a
/// schema mismatch in the second names the offending `type` in the reason.
pub fn decode(bytes: &[u8]) -> Action {
    let envelope: Envelope = match serde_json::from_slice(bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(error = %e, "failed to parse envelope");
            return Action::DecodeError {
                reason: GENERIC_DECODE_REASON.to_owned(),
            };
        }
    };

    let Envelope { kind, data } = envelope;
    let decoded = match kind.as_str() {
        "register" => identity(data).map(|id| Action::Register { id }),
        "heartBeat" => identity(data).map(|id| Action::HeartBeat { id }),
        "message" => data
            .map(|payload| Action::Broadcast { payload })
            .ok_or_else(|| "missing `data`".to_owned()),
        _ => Ok(Action::Unknown { kind: kind.clone() }),
    };

    decoded.unwrap_or_else(|detail| {
        debug!(kind = %kind, detail = %detail, "payload failed schema validation");
        Action::DecodeError {
            reason: format!("unable to parse message with type `{kind}`: {detail}"),
        }
    })
}

/// Extracts a non-empty `id` from a `register` / `heartBeat` payload.
fn identity(data: Option<Box<RawValue>>) -> Result<String, String> {
    let data = data.ok_or_else(|| "missing `data`".to_owned())?;
    let IdentityData { id } = serde_json::from_str(data.get()).map_err(|e| e.to_string())?;
    if id.is_empty() {
        return Err("`id` must not be empty".to_owned());
    }
    Ok(id)
}
