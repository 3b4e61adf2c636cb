use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Wire names: must match the frontend's dispatch table exactly.
pub const CHAT_MESSAGE: &str = "chat_message";
pub const NEW_ORDER: &str = "new_order";
pub const TICKER_UPDATE: &str = "ticker_update";
pub const CALENDAR_UPDATE: &str = "calendar_update";
pub const STREAM_STATE: &str = "stream_state";
pub const CUSTOMER_UPDATE: &str = "customer_update";
pub const VIEWER_COUNT: &str = "viewer_count";
pub const PONG: &str = "pong";

// inbound control types
pub const SUBSCRIBE: &str = "subscribe";
pub const PING: &str = "ping";

/// Closed set of event kinds that travel through the hub.
///
/// `pong` is deliberately absent: it is answered per connection and never
/// sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ChatMessage,
    NewOrder,
    TickerUpdate,
    CalendarUpdate,
    StreamState,
    CustomerUpdate,
    ViewerCount,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::ChatMessage,
        EventKind::NewOrder,
        EventKind::TickerUpdate,
        EventKind::CalendarUpdate,
        EventKind::StreamState,
        EventKind::CustomerUpdate,
        EventKind::ViewerCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ChatMessage => CHAT_MESSAGE,
            EventKind::NewOrder => NEW_ORDER,
            EventKind::TickerUpdate => TICKER_UPDATE,
            EventKind::CalendarUpdate => CALENDAR_UPDATE,
            EventKind::StreamState => STREAM_STATE,
            EventKind::CustomerUpdate => CUSTOMER_UPDATE,
            EventKind::ViewerCount => VIEWER_COUNT,
        }
    }

    /// Kinds only delivered to admin connections.
    pub fn is_admin_only(&self) -> bool {
        matches!(self, EventKind::CustomerUpdate)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown event kind: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_matches_serde_names() {
        for kind in EventKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert!(PONG.parse::<EventKind>().is_err());
    }
}
