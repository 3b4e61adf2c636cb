use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use livecart_protocol::{CloseReason, Event, EventKind};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type ClientId = String;

/// Receiving end of a client's send queue, owned by its write pump.
pub type ClientQueue = mpsc::Receiver<Arc<Frame>>;

/// A sequenced event serialized once and shared by every queue it lands in.
#[derive(Debug)]
pub struct Frame {
    pub event: Event,
    pub text: String,
}

impl Frame {
    pub fn seal(event: Event) -> serde_json::Result<Self> {
        let text = event.to_json()?;
        Ok(Self { event, text })
    }

    pub fn seq(&self) -> u64 {
        self.event.seq
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Viewer,
    Admin,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::Viewer => "viewer",
            ClientKind::Admin => "admin",
        }
    }
}

/// Connection lifecycle: linear progression, no backwards transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ClientState {
    Handshake = 0,
    Active = 1,
    Draining = 2,
    Closed = 3,
}

impl ClientState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ClientState::Handshake,
            1 => ClientState::Active,
            2 => ClientState::Draining,
            _ => ClientState::Closed,
        }
    }
}

/// Result of offering one frame to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Excluded by the client's subscription or kind.
    Filtered,
    /// Client is not active; nothing was enqueued.
    Dropped,
    /// Queue was full; the client is now draining with `1011`.
    Overflow,
}

/// One connected peer as seen by the hub.
///
/// `send` never blocks: it either enqueues or evicts. The socket itself is
/// owned by the connection's pumps, which watch `cancel` to learn that the
/// client must go.
pub struct Client {
    id: ClientId,
    connected_at: DateTime<Utc>,
    kind: RwLock<ClientKind>,
    /// `None` = every kind.
    filter: RwLock<Option<HashSet<EventKind>>>,
    queue: mpsc::Sender<Arc<Frame>>,
    state: AtomicU8,
    close_reason: OnceLock<CloseReason>,
    draining_since: OnceLock<Instant>,
    cancel: CancellationToken,
}

impl Client {
    /// Create a client in `handshake` with a send queue of `capacity` frames.
    pub fn new(kind: ClientKind, capacity: usize) -> (Arc<Self>, ClientQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Self {
            id: uuid::Uuid::new_v4().to_string(),
            connected_at: Utc::now(),
            kind: RwLock::new(kind),
            filter: RwLock::new(None),
            queue: tx,
            state: AtomicU8::new(ClientState::Handshake as u8),
            close_reason: OnceLock::new(),
            draining_since: OnceLock::new(),
            cancel: CancellationToken::new(),
        };
        (Arc::new(client), rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn kind(&self) -> ClientKind {
        *self.kind.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// When the first `close` landed. Teardown deadlines count from here.
    pub fn draining_since(&self) -> Option<Instant> {
        self.draining_since.get().copied()
    }

    /// Token cancelled on the first `close`; both pumps select on it.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Offer a frame. Filters are evaluated per frame, so a subscription
    /// change takes effect between events, never within one.
    pub fn send(&self, frame: &Arc<Frame>) -> SendOutcome {
        if self.state() != ClientState::Active {
            return SendOutcome::Dropped;
        }
        if !self.wants(frame.kind()) {
            return SendOutcome::Filtered;
        }

        match self.queue.try_send(Arc::clone(frame)) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(client_id = %self.id, seq = frame.seq(), "send queue full, evicting slow consumer");
                self.close(CloseReason::SlowConsumer);
                SendOutcome::Overflow
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // write pump already gone
                self.close(CloseReason::Normal);
                SendOutcome::Dropped
            }
        }
    }

    /// Signal both pumps to exit. Idempotent: only the first reason counts.
    /// Returns `true` for the call that initiated the close.
    pub fn close(&self, reason: CloseReason) -> bool {
        if self.close_reason.set(reason).is_err() {
            return false;
        }
        let _ = self.draining_since.set(Instant::now());
        self.advance(ClientState::Draining);
        debug!(client_id = %self.id, reason = reason.as_str(), "client draining");
        self.cancel.cancel();
        true
    }

    pub fn set_filter(&self, kinds: Option<HashSet<EventKind>>) {
        *self.filter.write().unwrap_or_else(PoisonError::into_inner) = kinds;
    }

    pub fn set_kind(&self, kind: ClientKind) {
        *self.kind.write().unwrap_or_else(PoisonError::into_inner) = kind;
    }

    pub(crate) fn mark_active(&self) {
        let _ = self.state.compare_exchange(
            ClientState::Handshake as u8,
            ClientState::Active as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn mark_closed(&self) {
        self.advance(ClientState::Closed);
    }

    fn wants(&self, kind: EventKind) -> bool {
        if kind.is_admin_only() && self.kind() != ClientKind::Admin {
            return false;
        }
        match &*self.filter.read().unwrap_or_else(PoisonError::into_inner) {
            Some(kinds) => kinds.contains(&kind),
            None => true,
        }
    }

    /// Move forward to `target` unless already at or past it.
    fn advance(&self, target: ClientState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < target as u8).then_some(target as u8)
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use livecart_core::types::ActivationStatus;
    use livecart_protocol::frames::{ChatPayload, CustomerPayload, ViewerCountPayload};
    use livecart_protocol::EventPayload;

    fn frame(seq: u64, payload: EventPayload) -> Arc<Frame> {
        let ts = Utc.with_ymd_and_hms(2024, 9, 15, 18, 0, 0).unwrap();
        Arc::new(Frame::seal(Event { seq, ts, payload }).unwrap())
    }

    fn chat(seq: u64) -> Arc<Frame> {
        frame(
            seq,
            EventPayload::ChatMessage(ChatPayload {
                id: format!("m{seq}"),
                username: "u".into(),
                message: "hi".into(),
                emoji: "".into(),
            }),
        )
    }

    fn active(kind: ClientKind, capacity: usize) -> (Arc<Client>, ClientQueue) {
        let (client, rx) = Client::new(kind, capacity);
        client.mark_active();
        (client, rx)
    }

    #[test]
    fn handshake_client_receives_nothing() {
        let (client, mut rx) = Client::new(ClientKind::Viewer, 4);
        assert_eq!(client.state(), ClientState::Handshake);
        assert_eq!(client.send(&chat(1)), SendOutcome::Dropped);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn last_free_slot_succeeds_then_overflow_evicts() {
        let (client, _rx) = active(ClientKind::Viewer, 3);
        assert_eq!(client.send(&chat(1)), SendOutcome::Queued);
        assert_eq!(client.send(&chat(2)), SendOutcome::Queued);
        // exactly one free slot left
        assert_eq!(client.send(&chat(3)), SendOutcome::Queued);
        assert_eq!(client.send(&chat(4)), SendOutcome::Overflow);

        assert_eq!(client.state(), ClientState::Draining);
        assert_eq!(client.close_reason(), Some(CloseReason::SlowConsumer));
        assert!(client.cancel_token().is_cancelled());
        // further sends are dropped, not queued
        assert_eq!(client.send(&chat(5)), SendOutcome::Dropped);
    }

    #[test]
    fn close_is_idempotent_and_first_reason_wins() {
        let (client, _rx) = active(ClientKind::Viewer, 4);
        assert!(client.close(CloseReason::ProtocolViolation));
        assert!(!client.close(CloseReason::SlowConsumer));
        assert!(!client.close(CloseReason::Normal));
        assert_eq!(client.close_reason(), Some(CloseReason::ProtocolViolation));
        assert_eq!(client.close_reason().map(|r| r.code()), Some(1003));
    }

    #[test]
    fn draining_clock_starts_at_first_close() {
        let (client, _rx) = active(ClientKind::Viewer, 4);
        assert_eq!(client.draining_since(), None);
        client.close(CloseReason::SlowConsumer);
        let first = client.draining_since().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        client.close(CloseReason::Normal);
        assert_eq!(client.draining_since(), Some(first));
    }

    #[test]
    fn closed_state_never_moves_back() {
        let (client, _rx) = active(ClientKind::Viewer, 4);
        client.mark_closed();
        client.close(CloseReason::Normal);
        client.mark_active();
        assert_eq!(client.state(), ClientState::Closed);
    }

    #[test]
    fn filter_selects_kinds() {
        let (client, mut rx) = active(ClientKind::Viewer, 8);
        client.set_filter(Some(HashSet::from([EventKind::ViewerCount])));

        assert_eq!(client.send(&chat(1)), SendOutcome::Filtered);
        let count = frame(2, EventPayload::ViewerCount(ViewerCountPayload { count: 3 }));
        assert_eq!(client.send(&count), SendOutcome::Queued);
        assert_eq!(rx.try_recv().unwrap().seq(), 2);

        client.set_filter(None);
        assert_eq!(client.send(&chat(3)), SendOutcome::Queued);
    }

    #[test]
    fn empty_filter_blocks_everything() {
        let (client, _rx) = active(ClientKind::Admin, 8);
        client.set_filter(Some(HashSet::new()));
        assert_eq!(client.send(&chat(1)), SendOutcome::Filtered);
        let count = frame(2, EventPayload::ViewerCount(ViewerCountPayload { count: 1 }));
        assert_eq!(client.send(&count), SendOutcome::Filtered);
    }

    #[test]
    fn admin_only_events_skip_viewers() {
        let customer = frame(
            1,
            EventPayload::CustomerUpdate(CustomerPayload {
                customer_id: "c1".into(),
                customer_number: "10299".into(),
                activation_status: ActivationStatus::Active,
            }),
        );
        let (viewer, _vrx) = active(ClientKind::Viewer, 4);
        let (admin, mut arx) = active(ClientKind::Admin, 4);

        assert_eq!(viewer.send(&customer), SendOutcome::Filtered);
        assert_eq!(admin.send(&customer), SendOutcome::Queued);
        assert_eq!(arx.try_recv().unwrap().kind(), EventKind::CustomerUpdate);

        viewer.set_kind(ClientKind::Admin);
        assert_eq!(viewer.send(&customer), SendOutcome::Queued);
    }

    #[test]
    fn dropped_queue_closes_client() {
        let (client, rx) = active(ClientKind::Viewer, 4);
        drop(rx);
        assert_eq!(client.send(&chat(1)), SendOutcome::Dropped);
        assert_eq!(client.close_reason(), Some(CloseReason::Normal));
    }
}
