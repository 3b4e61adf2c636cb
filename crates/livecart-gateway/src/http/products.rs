use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use livecart_core::types::Product;
use livecart_store::{Collection, Filter, RepositoryExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};
use crate::http::{clamp_limit, LimitParams};

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// GET /api/products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Vec<Product>>> {
    let products = state
        .repo
        .list_as(Collection::Products, &Filter::new(), clamp_limit(params.limit))?;
    Ok(Json(products))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .repo
        .get_as(Collection::Products, &id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("product {id} not found")))
}

/// POST /api/admin/products: catalogue changes are not broadcast.
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name cannot be empty"));
    }
    if !req.price.is_finite() || req.price < 0.0 {
        return Err(ApiError::validation("price must be a non-negative number"));
    }
    let sizes: Vec<&str> = req
        .sizes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let product: Product = state.repo.append_as(
        Collection::Products,
        &json!({
            "name": name,
            "price": req.price,
            "sizes": sizes,
            "description": req.description,
        }),
    )?;
    Ok((StatusCode::CREATED, Json(product)))
}
