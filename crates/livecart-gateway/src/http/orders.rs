//! Orders: `POST /api/orders`, `GET /api/orders`,
//! `GET /api/customers/{number}/latest-order`.
//!
//! A successful order emits `new_order` followed by its chat line and queues
//! a label for printing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use livecart_core::types::{ActivationStatus, Customer, Order, Product};
use livecart_store::{Collection, Filter, Repository, RepositoryExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::clamp_limit;
use crate::http::error::{ApiError, ApiResult};
use crate::side_effects::SideEffect;

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    /// Customer number as typed by the buyer.
    pub customer_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    pub size: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub customer_id: Option<String>,
    pub limit: Option<usize>,
}

/// POST /api/orders
pub async fn post_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let customer_id = req.customer_id.trim();
    if customer_id.is_empty() {
        return Err(ApiError::validation("customer_id cannot be empty"));
    }
    // stored and echoed in the chat line exactly as typed
    if req.size.trim().is_empty() {
        return Err(ApiError::validation("size cannot be empty"));
    }
    if req.quantity == 0 {
        return Err(ApiError::validation("quantity must be at least 1"));
    }
    if !req.price.is_finite() || req.price < 0.0 {
        return Err(ApiError::validation("price must be a non-negative number"));
    }

    if is_blocked(state.repo.as_ref(), customer_id)? {
        info!(customer_id, "order refused for blocked customer");
        return Err(ApiError::Forbidden("customer is blocked".to_string()));
    }

    let given_name = req
        .product_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from);
    let product_name = match &req.product_id {
        Some(product_id) => {
            let product: Product = state
                .repo
                .get_as(Collection::Products, product_id)?
                .ok_or_else(|| ApiError::NotFound(format!("product {product_id} not found")))?;
            given_name.unwrap_or(product.name)
        }
        None => given_name.unwrap_or_default(),
    };

    let order: Order = state.repo.append_as(
        Collection::Orders,
        &json!({
            "customer_id": customer_id,
            "product_id": req.product_id,
            "product_name": product_name,
            "size": req.size,
            "quantity": req.quantity,
            "price": req.price,
        }),
    )?;
    info!(order_id = %order.id, customer_id, "order placed");

    state.publisher.publish_order(&order);
    state.side_effects.submit(SideEffect::PrintLabel(order.clone()));

    Ok((StatusCode::CREATED, Json(order)))
}

fn is_blocked(repo: &dyn Repository, customer_number: &str) -> ApiResult<bool> {
    let filter = Filter::new().eq("customer_number", customer_number);
    let customers: Vec<Customer> = repo.list_as(Collection::Customers, &filter, 1)?;
    Ok(customers
        .first()
        .is_some_and(|c| c.activation_status == ActivationStatus::Blocked))
}

/// GET /api/orders?customer_id=&limit=: newest first.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    let mut filter = Filter::new();
    if let Some(customer_id) = query.customer_id.as_deref() {
        filter = filter.eq("customer_id", customer_id);
    }
    let orders = state
        .repo
        .list_as(Collection::Orders, &filter, clamp_limit(query.limit))?;
    Ok(Json(orders))
}

/// GET /api/customers/{number}/latest-order
pub async fn latest_order(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> ApiResult<Json<Order>> {
    state
        .repo
        .latest_order_for(&number)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no order for customer {number}")))
}
