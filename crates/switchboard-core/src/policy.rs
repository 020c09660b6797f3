//! Relay policies: where an inbound frame goes.

use serde_json::Value;

use crate::ids::PeerId;
use crate::payload::Payload;

/// How a session forwards the frames it receives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RelayPolicy {
    /// Forward to every connection of the sending peer, the sender included.
    #[default]
    EchoToPeer,
    /// Forward to the peer named in the frame's `"to"` field. Frames without
    /// a usable target go to every connection except the sender's.
    Addressed,
    /// Forward to every registered connection.
    Broadcast,
}

/// Per-session behaviour chosen by the endpoint that accepted the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Where inbound frames are delivered.
    pub relay: RelayPolicy,
    /// Broadcast a presence message when the peer's last connection closes.
    pub announce_departures: bool,
}

impl SessionPolicy {
    /// Chat relay: echo to the sender's own connections, announce departures.
    pub fn chat() -> Self {
        Self {
            relay: RelayPolicy::EchoToPeer,
            announce_departures: true,
        }
    }

    /// Signaling relay: addressed delivery, silent departures unless asked.
    pub fn signaling(announce_departures: bool) -> Self {
        Self {
            relay: RelayPolicy::Addressed,
            announce_departures,
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::chat()
    }
}

/// The exact presence text broadcast when a peer's last connection closes.
pub fn presence_left_message(peer: &PeerId) -> String {
    format!("User {peer} left the chat")
}

/// Target of an addressed frame, if it names one.
///
/// Only `"to"` is read; everything else in the frame stays opaque. Strings
/// and integers are accepted, anything else counts as no target.
pub(crate) fn addressed_target(payload: &Payload) -> Option<PeerId> {
    let text = payload.as_text()?;
    let Value::Object(fields) = serde_json::from_str::<Value>(text).ok()? else {
        return None;
    };
    match fields.get("to")? {
        Value::String(s) if !s.is_empty() => Some(PeerId::from(s.as_str())),
        Value::Number(n) => n
            .as_i64()
            .map(PeerId::from)
            .or_else(|| n.as_u64().map(PeerId::from)),
        _ => None,
    }
}
