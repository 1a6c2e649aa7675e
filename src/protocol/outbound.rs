//! Frames the relay writes back to clients.

use serde::Serialize;
use serde_json::value::RawValue;

/// An outbound frame, serialized with the same `{type, data}` envelope the
/// clients send.
///
/// # Examples
///
/// ```
/// use rtrelay::protocol::Outbound;
/// use serde_json::value::RawValue;
///
/// let payload = RawValue::from_string(r#"{"text":"hi","sender":"alice"}"#.to_owned()).unwrap();
/// let frame = Outbound::Message(&payload).to_frame().unwrap();
/// assert_eq!(frame, r#"{"type":"message","data":{"text":"hi","sender":"alice"}}"#);
///
/// let frame = Outbound::Error { reason: "bad input" }.to_frame().unwrap();
/// assert_eq!(frame, r#"{"type":"error","data":{"reason":"bad input"}}"#);
/// ```
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Outbound<'a> {
    /// A relayed application payload, embedded exactly as received.
    Message(&'a RawValue),
    /// Reply to a sender whose message could not be decoded.
    Error { reason: &'a str },
}

impl Outbound<'_> {
    /// Serializes the frame to its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if serialization fails.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
