use chrono::{DateTime, Utc};
use livecart_core::time::serde_millis;
use livecart_core::types::ActivationStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kinds::{EventKind, PONG};

/// Server → Client broadcast envelope.
/// Wire: `{ "type": "chat_message", "seq": 42, "ts": "2024-09-15T18:03:22.412Z", ...fields }`
///
/// The kind tag sits flat next to `seq`/`ts`, not nested under a payload key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    #[serde(with = "serde_millis")]
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Kind-specific body of an [`Event`]. Owned values only: everything a
/// publisher hands over is copied in before sequencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    ChatMessage(ChatPayload),
    NewOrder(OrderPayload),
    TickerUpdate(TickerPayload),
    CalendarUpdate(CalendarPayload),
    StreamState(StreamPayload),
    CustomerUpdate(CustomerPayload),
    ViewerCount(ViewerCountPayload),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::ChatMessage(_) => EventKind::ChatMessage,
            EventPayload::NewOrder(_) => EventKind::NewOrder,
            EventPayload::TickerUpdate(_) => EventKind::TickerUpdate,
            EventPayload::CalendarUpdate(_) => EventKind::CalendarUpdate,
            EventPayload::StreamState(_) => EventKind::StreamState,
            EventPayload::CustomerUpdate(_) => EventKind::CustomerUpdate,
            EventPayload::ViewerCount(_) => EventKind::ViewerCount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub id: String,
    pub username: String,
    pub message: String,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub id: String,
    pub customer_id: String,
    pub product_name: String,
    pub size: String,
    pub quantity: u32,
    pub price: f64,
    /// The composed order line, also published as a separate chat event.
    pub chat_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerPayload {
    pub text: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarOp {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarPayload {
    pub op: CalendarOp,
    pub event: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStateKind {
    Started,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPayload {
    pub state: StreamStateKind,
    pub room: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerPayload {
    pub customer_id: String,
    pub customer_number: String,
    pub activation_status: ActivationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerCountPayload {
    pub count: u64,
}

/// Server → Client heartbeat answer. Not sequenced: `seq` echoes the ping.
/// Wire: `{ "type": "pong", "seq": 7, "ts": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub seq: u64,
    #[serde(with = "serde_millis")]
    pub ts: DateTime<Utc>,
}

impl PongFrame {
    pub fn new(seq: u64, ts: DateTime<Utc>) -> Self {
        Self {
            frame_type: PONG.to_string(),
            seq,
            ts,
        }
    }
}
