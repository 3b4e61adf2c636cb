use axum::{
    routing::{delete, get, post},
    Router,
};
use livecart_core::config::LivecartConfig;
use livecart_store::Repository;
use std::path::PathBuf;
use std::sync::Arc;

use crate::http::{calendar, chat, customers, health, orders, products, streams, ticker};
use crate::hub::{Hub, HubSettings};
use crate::publish::Publisher;
use crate::side_effects::{LabelPrinter, SideEffects, SpoolPrinter};
use crate::streaming::{LocalStreamProvider, StreamProvider};

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: LivecartConfig,
    pub hub: Arc<Hub>,
    pub publisher: Publisher,
    pub repo: Arc<dyn Repository>,
    pub side_effects: SideEffects,
    pub streams: Arc<dyn StreamProvider>,
}

impl AppState {
    /// Start the hub and the side-effect worker with the bundled label
    /// printer and stream provider. Must run inside a Tokio runtime.
    pub fn new(config: LivecartConfig, repo: Arc<dyn Repository>) -> Self {
        let printer = Arc::new(SpoolPrinter::new(
            config.labels.spool_dir.as_ref().map(PathBuf::from),
        ));
        let streams = Arc::new(LocalStreamProvider::new(&config.streaming));
        Self::with_collaborators(config, repo, printer, streams)
    }

    pub fn with_collaborators(
        config: LivecartConfig,
        repo: Arc<dyn Repository>,
        printer: Arc<dyn LabelPrinter>,
        streams: Arc<dyn StreamProvider>,
    ) -> Self {
        let hub = Hub::start(HubSettings::from(&config.realtime));
        let publisher = Publisher::new(Arc::clone(&hub));
        // worker exits once the last SideEffects handle is dropped
        let (side_effects, _worker) = SideEffects::spawn(
            printer,
            Arc::clone(&streams),
            publisher.clone(),
            Arc::clone(&repo),
        );
        Self {
            config,
            hub,
            publisher,
            repo,
            side_effects,
            streams,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .route("/api/chat", get(chat::list_chat).post(chat::post_chat))
        .route("/api/orders", get(orders::list_orders).post(orders::post_order))
        .route(
            "/api/customers/{number}/latest-order",
            get(orders::latest_order),
        )
        .route("/api/products", get(products::list_products))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/ticker", get(ticker::get_ticker))
        .route("/api/events", get(calendar::list_events))
        .route("/api/streams/{id}/token", post(streams::mint_token))
        .route("/api/streams/verify", post(streams::verify_token))
        .route("/api/admin/products", post(products::create_product))
        .route("/api/admin/ticker", post(ticker::set_ticker))
        .route("/api/admin/events", post(calendar::create_event))
        .route(
            "/api/admin/events/{id}",
            axum::routing::put(calendar::update_event).delete(calendar::delete_event),
        )
        .route(
            "/api/admin/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route(
            "/api/admin/customers/{id}/activate",
            post(customers::activate_customer),
        )
        .route(
            "/api/admin/customers/{id}/block",
            post(customers::block_customer),
        )
        .route("/api/admin/streams", post(streams::create_room))
        .route("/api/admin/streams/{id}", delete(streams::delete_room))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
