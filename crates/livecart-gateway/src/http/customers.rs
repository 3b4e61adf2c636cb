//! Customer administration. Status changes are broadcast to admin clients
//! as `customer_update`; viewers never see them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use livecart_core::types::{ActivationStatus, Customer};
use livecart_store::{Collection, Filter, RepositoryExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::clamp_limit;
use crate::http::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    pub customer_number: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub status: Option<ActivationStatus>,
    pub limit: Option<usize>,
}

/// GET /api/admin/customers?status=&limit=
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Json<Vec<Customer>>> {
    let mut filter = Filter::new();
    if let Some(status) = query.status {
        filter = filter.eq("activation_status", status.as_str());
    }
    let customers = state
        .repo
        .list_as(Collection::Customers, &filter, clamp_limit(query.limit))?;
    Ok(Json(customers))
}

/// POST /api/admin/customers: new customers start `pending`.
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CustomerRequest>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let number = req.customer_number.trim();
    if number.is_empty() {
        return Err(ApiError::validation("customer_number cannot be empty"));
    }
    let existing: Vec<Customer> = state.repo.list_as(
        Collection::Customers,
        &Filter::new().eq("customer_number", number),
        1,
    )?;
    if !existing.is_empty() {
        return Err(ApiError::validation(format!(
            "customer number {number} already exists"
        )));
    }

    let customer: Customer = state.repo.append_as(
        Collection::Customers,
        &json!({
            "customer_number": number,
            "name": req.name,
            "activation_status": ActivationStatus::Pending,
        }),
    )?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// POST /api/admin/customers/{id}/activate
pub async fn activate_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Customer>> {
    set_status(&state, &id, ActivationStatus::Active).map(Json)
}

/// POST /api/admin/customers/{id}/block
pub async fn block_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Customer>> {
    set_status(&state, &id, ActivationStatus::Blocked).map(Json)
}

fn set_status(state: &AppState, id: &str, status: ActivationStatus) -> ApiResult<Customer> {
    let customer: Customer = state.repo.update_as(
        Collection::Customers,
        id,
        json!({ "activation_status": status }),
    )?;
    info!(customer_id = %id, status = %status, "customer status changed");
    state.publisher.publish_customer_status(&customer);
    Ok(customer)
}
