//! Realtime gateway for the live-shopping show: HTTP writes are persisted,
//! sequenced and fanned out to every websocket viewer in one global order.

pub mod app;
pub mod http;
pub mod hub;
pub mod publish;
pub mod side_effects;
pub mod streaming;
pub mod ws;
