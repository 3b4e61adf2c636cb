//! Typed publish entry points for the HTTP edge and the side-effect worker.
//!
//! Nothing else in the gateway calls `Hub::publish`. Every method runs after
//! the record is durable, so a hub failure (only possible after shutdown) is
//! logged and swallowed: the caller's response is unaffected.

use std::sync::Arc;

use livecart_core::types::{CalendarEvent, ChatMessage, Customer, Order, StreamRoom, TickerState};
use livecart_protocol::frames::{
    CalendarOp, CalendarPayload, ChatPayload, CustomerPayload, OrderPayload, StreamPayload,
    StreamStateKind, TickerPayload,
};
use livecart_protocol::EventPayload;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::hub::Hub;

/// Username of chat lines the server writes on its own behalf.
pub const SYSTEM_USERNAME: &str = "System";

#[derive(Clone)]
pub struct Publisher {
    hub: Arc<Hub>,
}

impl Publisher {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    pub fn publish_chat(&self, msg: &ChatMessage) {
        self.emit(vec![EventPayload::ChatMessage(ChatPayload {
            id: msg.id.clone(),
            username: msg.username.clone(),
            message: msg.message.clone(),
            emoji: msg.emoji.clone(),
        })]);
    }

    /// Publish `new_order` followed immediately by the composed chat line,
    /// so the chat event always carries the order's `seq + 1`.
    pub fn publish_order(&self, order: &Order) {
        let chat_line = order_chat_line(&order.customer_id, order.quantity, order.price, &order.size);
        let chat = ChatPayload {
            id: uuid::Uuid::now_v7().to_string(),
            username: SYSTEM_USERNAME.to_string(),
            message: chat_line.clone(),
            emoji: String::new(),
        };
        self.emit(vec![
            EventPayload::NewOrder(OrderPayload {
                id: order.id.clone(),
                customer_id: order.customer_id.clone(),
                product_name: order.product_name.clone(),
                size: order.size.clone(),
                quantity: order.quantity,
                price: order.price,
                chat_line,
            }),
            EventPayload::ChatMessage(chat),
        ]);
    }

    pub fn publish_ticker(&self, ticker: &TickerState) {
        self.emit(vec![EventPayload::TickerUpdate(TickerPayload {
            text: ticker.text.clone(),
            enabled: ticker.enabled,
        })]);
    }

    pub fn publish_calendar(&self, event: &CalendarEvent, op: CalendarOp) {
        let Some(event) = record(event) else { return };
        self.emit(vec![EventPayload::CalendarUpdate(CalendarPayload { op, event })]);
    }

    pub fn publish_stream(&self, state: StreamStateKind, room: &StreamRoom) {
        let Some(room) = record(room) else { return };
        self.emit(vec![EventPayload::StreamState(StreamPayload { state, room })]);
    }

    pub fn publish_customer_status(&self, customer: &Customer) {
        self.emit(vec![EventPayload::CustomerUpdate(CustomerPayload {
            customer_id: customer.id.clone(),
            customer_number: customer.customer_number.clone(),
            activation_status: customer.activation_status,
        })]);
    }

    fn emit(&self, payloads: Vec<EventPayload>) {
        let kind = payloads.first().map(|p| p.kind());
        if let Err(e) = self.hub.publish_all(payloads) {
            warn!(kind = ?kind, error = %e, "event not published");
        }
    }
}

fn record<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            error!(error = %e, "failed to encode record for publish");
            None
        }
    }
}

/// The chat line announcing an order, parsed by the shop frontend:
/// `**Bestellung** <last 4 of customer id> I <qty>x I <price, comma decimals> I <size>`.
pub fn order_chat_line(customer_id: &str, quantity: u32, price: f64, size: &str) -> String {
    let chars: Vec<char> = customer_id.chars().collect();
    let id4: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    let price = format!("{price:.2}").replace('.', ",");
    format!("**Bestellung** {id4} I {quantity}x I {price} I {size}")
}
