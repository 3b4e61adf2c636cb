use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::kinds::{EventKind, PING, SUBSCRIBE};

/// Client → Server control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Wire: `{ "type": "subscribe", "kinds": ["chat_message", ...] }`
    ///
    /// Unknown kind names are dropped so newer clients can talk to an
    /// older server.
    Subscribe { kinds: Vec<EventKind> },
    /// Wire: `{ "type": "ping", "seq": 7 }`
    Ping { seq: u64 },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed control frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown control type: {0}")]
    UnknownType(String),
}

/// Raw inbound frame: parse the `type` discriminator first, then the body.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct SubscribeBody {
    kinds: Vec<String>,
}

#[derive(Deserialize)]
struct PingBody {
    seq: u64,
}

impl ControlMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        let body = Value::Object(frame.rest);

        match frame.frame_type.as_str() {
            SUBSCRIBE => {
                let body: SubscribeBody = serde_json::from_value(body)?;
                let kinds = body
                    .kinds
                    .iter()
                    .filter_map(|k| k.parse::<EventKind>().ok())
                    .collect();
                Ok(ControlMessage::Subscribe { kinds })
            }
            PING => {
                let body: PingBody = serde_json::from_value(body)?;
                Ok(ControlMessage::Ping { seq: body.seq })
            }
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}
