//! The two tasks that own a websocket: the write pump drains the client's
//! queue and sends heartbeats, the read pump handles control messages.
//! Either one exits as soon as the client's cancel token fires.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use livecart_core::config::RealtimeConfig;
use livecart_core::time::now_millis;
use livecart_protocol::{CloseReason, ControlMessage, PongFrame};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::hub::{Client, ClientQueue};
use crate::ws::send::{close_message, with_deadline, WsSink};

#[derive(Debug, Clone)]
pub struct PumpSettings {
    pub write_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub max_missed_pongs: u32,
    pub shutdown_grace: Duration,
    pub max_frame_bytes: usize,
}

impl From<&RealtimeConfig> for PumpSettings {
    fn from(cfg: &RealtimeConfig) -> Self {
        Self {
            write_timeout: Duration::from_millis(cfg.write_timeout_ms),
            heartbeat_interval: Duration::from_millis(cfg.heartbeat_interval_ms),
            max_missed_pongs: cfg.max_missed_pongs,
            shutdown_grace: Duration::from_millis(cfg.shutdown_grace_ms),
            max_frame_bytes: cfg.max_frame_bytes,
        }
    }
}

/// Pings sent without a pong since. Shared by both pumps.
pub type MissedPongs = Arc<AtomicU32>;

pub async fn write_pump(
    client: Arc<Client>,
    mut sink: WsSink,
    mut queue: ClientQueue,
    mut control: mpsc::Receiver<Message>,
    missed: MissedPongs,
    settings: PumpSettings,
) {
    let cancel = client.cancel_token();
    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + settings.heartbeat_interval,
        settings.heartbeat_interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            Some(msg) = control.recv() => {
                if !with_deadline(&client, &mut sink, msg, settings.write_timeout).await {
                    break;
                }
            }

            frame = queue.recv() => {
                let Some(frame) = frame else { break };
                let msg = Message::Text(frame.text.clone().into());
                if !with_deadline(&client, &mut sink, msg, settings.write_timeout).await {
                    break;
                }
            }

            _ = heartbeat.tick() => {
                let unanswered = missed.load(Ordering::Acquire);
                if unanswered >= settings.max_missed_pongs {
                    warn!(client_id = %client.id(), unanswered, "heartbeat timeout");
                    client.close(CloseReason::HeartbeatTimeout);
                    break;
                }
                missed.fetch_add(1, Ordering::AcqRel);
                if !with_deadline(&client, &mut sink, Message::Ping(Bytes::new()), settings.write_timeout).await {
                    break;
                }
            }
        }
    }

    let reason = client.close_reason().unwrap_or(CloseReason::Normal);
    let teardown = async {
        // only a shutdown flushes what was queued before saying goodbye
        let flushed = if reason == CloseReason::Shutdown {
            flush(&mut sink, &mut queue).await
        } else {
            0
        };
        let _ = sink.send(close_message(reason)).await;
        let _ = sink.close().await;
        flushed
    };
    match tokio::time::timeout_at(teardown_deadline(&client, &settings), teardown).await {
        Ok(flushed) => debug!(client_id = %client.id(), reason = reason.as_str(), flushed, "write pump stopped"),
        Err(_) => warn!(client_id = %client.id(), reason = reason.as_str(), "teardown deadline passed, dropping socket"),
    }
}

/// Everything a draining client still does on its socket ends here: the
/// shutdown flush gets the grace period, any other close gets one write
/// timeout for its close frame. Both count from the moment it began draining.
pub fn teardown_deadline(client: &Client, settings: &PumpSettings) -> Instant {
    let since = client.draining_since().unwrap_or_else(Instant::now);
    match client.close_reason() {
        Some(CloseReason::Shutdown) => since + settings.shutdown_grace,
        _ => since + settings.write_timeout,
    }
}

async fn flush(sink: &mut WsSink, queue: &mut ClientQueue) -> usize {
    queue.close();
    let mut flushed = 0;
    while let Some(frame) = queue.recv().await {
        if sink.send(Message::Text(frame.text.clone().into())).await.is_err() {
            break;
        }
        flushed += 1;
    }
    flushed
}

pub async fn read_pump(
    client: Arc<Client>,
    mut stream: SplitStream<WebSocket>,
    control: mpsc::Sender<Message>,
    missed: MissedPongs,
    settings: PumpSettings,
) {
    let cancel = client.cancel_token();
    let mut peer_gone = false;

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = stream.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                if text.len() > settings.max_frame_bytes {
                    warn!(client_id = %client.id(), size = text.len(), "frame too large");
                    client.close(CloseReason::ProtocolViolation);
                    break;
                }
                match ControlMessage::parse(text.as_str()) {
                    Ok(ControlMessage::Subscribe { kinds }) => {
                        debug!(client_id = %client.id(), kinds = kinds.len(), "subscription changed");
                        client.set_filter(Some(kinds.into_iter().collect()));
                    }
                    Ok(ControlMessage::Ping { seq }) => {
                        missed.store(0, Ordering::Release);
                        match serde_json::to_string(&PongFrame::new(seq, now_millis())) {
                            Ok(json) => {
                                if control.try_send(Message::Text(json.into())).is_err() {
                                    debug!(client_id = %client.id(), seq, "control queue full, pong dropped");
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to encode pong"),
                        }
                    }
                    Err(e) => {
                        warn!(client_id = %client.id(), error = %e, "protocol violation");
                        client.close(CloseReason::ProtocolViolation);
                        break;
                    }
                }
            }
            Some(Ok(Message::Binary(_))) => {
                warn!(client_id = %client.id(), "binary frame rejected");
                client.close(CloseReason::ProtocolViolation);
                break;
            }
            Some(Ok(Message::Pong(_))) => missed.store(0, Ordering::Release),
            // answered by the websocket layer
            Some(Ok(Message::Ping(_))) => {}
            Some(Ok(Message::Close(_))) | None => {
                client.close(CloseReason::Normal);
                peer_gone = true;
                break;
            }
            Some(Err(e)) => {
                debug!(client_id = %client.id(), error = %e, "socket read failed");
                client.close(CloseReason::Normal);
                peer_gone = true;
                break;
            }
        }
    }

    if !peer_gone {
        // keep reading until the peer acknowledges our close frame, so the
        // socket is not torn down under data it is still sending
        let _ = tokio::time::timeout_at(teardown_deadline(&client, &settings), async {
            while let Some(Ok(msg)) = stream.next().await {
                if matches!(msg, Message::Close(_)) {
                    break;
                }
            }
        })
        .await;
    }
    debug!(client_id = %client.id(), "read pump stopped");
}
