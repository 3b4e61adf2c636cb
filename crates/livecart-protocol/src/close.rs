/// Why a connection is being closed. The first reason recorded wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer went away or a transport read failed.
    Normal,
    /// Hub shutdown; queued frames are flushed before the close frame.
    Shutdown,
    /// Too many unanswered heartbeat pings.
    HeartbeatTimeout,
    /// Binary frame, oversize frame, malformed JSON or unknown control type.
    ProtocolViolation,
    /// Send queue overflowed or a write missed its deadline.
    SlowConsumer,
}

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_UNSUPPORTED: u16 = 1003;
pub const CLOSE_INTERNAL: u16 = 1011;

impl CloseReason {
    /// RFC 6455 status code put on the close frame.
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::Normal => CLOSE_NORMAL,
            CloseReason::Shutdown | CloseReason::HeartbeatTimeout => CLOSE_GOING_AWAY,
            CloseReason::ProtocolViolation => CLOSE_UNSUPPORTED,
            CloseReason::SlowConsumer => CLOSE_INTERNAL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Normal => "normal",
            CloseReason::Shutdown => "server shutdown",
            CloseReason::HeartbeatTimeout => "heartbeat timeout",
            CloseReason::ProtocolViolation => "protocol violation",
            CloseReason::SlowConsumer => "slow consumer",
        }
    }
}
