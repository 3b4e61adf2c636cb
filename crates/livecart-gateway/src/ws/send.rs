use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use livecart_protocol::CloseReason;
use tracing::{debug, warn};

use crate::hub::Client;

pub type WsSink = SplitSink<WebSocket, Message>;

/// Close frame carrying the reason's status code.
pub fn close_message(reason: CloseReason) -> Message {
    Message::Close(Some(CloseFrame {
        code: reason.code(),
        reason: Utf8Bytes::from_static(reason.as_str()),
    }))
}

/// Write one message within `deadline`. A missed deadline evicts the client
/// as a slow consumer; a transport error closes it normally. A write still
/// pending when the client is closed elsewhere is abandoned. Returns `false`
/// once the client should stop writing.
pub async fn with_deadline(
    client: &Client,
    sink: &mut WsSink,
    msg: Message,
    deadline: Duration,
) -> bool {
    let cancel = client.cancel_token();
    let written = tokio::select! {
        biased;
        _ = cancel.cancelled() => return false,
        written = tokio::time::timeout(deadline, sink.send(msg)) => written,
    };
    match written {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(client_id = %client.id(), error = %e, "socket write failed");
            client.close(CloseReason::Normal);
            false
        }
        Err(_) => {
            warn!(client_id = %client.id(), deadline_ms = deadline.as_millis() as u64, "write deadline missed, evicting slow consumer");
            client.close(CloseReason::SlowConsumer);
            false
        }
    }
}
