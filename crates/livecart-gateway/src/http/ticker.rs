use axum::{extract::State, Json};
use livecart_core::types::TickerState;
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};

pub const MAX_TICKER_CHARS: usize = 280;

#[derive(Deserialize)]
pub struct TickerRequest {
    pub text: String,
    pub enabled: bool,
}

/// GET /api/ticker
pub async fn get_ticker(State(state): State<Arc<AppState>>) -> ApiResult<Json<TickerState>> {
    Ok(Json(state.repo.ticker_state()?))
}

/// POST /api/admin/ticker: replace the banner and broadcast it.
pub async fn set_ticker(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TickerRequest>,
) -> ApiResult<Json<TickerState>> {
    if req.text.chars().count() > MAX_TICKER_CHARS {
        return Err(ApiError::validation(format!(
            "ticker text exceeds {MAX_TICKER_CHARS} characters"
        )));
    }
    let ticker = state.repo.set_ticker_state(req.text.trim(), req.enabled)?;
    state.publisher.publish_ticker(&ticker);
    Ok(Json(ticker))
}
