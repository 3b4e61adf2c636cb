//! Live chat: `GET /api/chat`, `POST /api/chat`.
//!
//! Request:  `{"username": "u", "message": "hello", "emoji": ""}`
//! Response: the stored message, `{"id": "...", ..., "created_at": "..."}`

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use livecart_core::types::ChatMessage;
use livecart_store::{Collection, Filter, RepositoryExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};
use crate::http::{clamp_limit, LimitParams};

pub const MAX_MESSAGE_CHARS: usize = 500;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub username: String,
    pub message: String,
    #[serde(default)]
    pub emoji: String,
}

/// POST /api/chat: persist a message and broadcast it.
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    let username = req.username.trim();
    let message = req.message.trim();
    if username.is_empty() {
        return Err(ApiError::validation("username cannot be empty"));
    }
    if message.is_empty() {
        return Err(ApiError::validation("message cannot be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::validation(format!(
            "message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let stored: ChatMessage = state.repo.append_as(
        Collection::Chat,
        &json!({ "username": username, "message": message, "emoji": req.emoji }),
    )?;
    state.publisher.publish_chat(&stored);

    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/chat?limit=N: the latest N messages, oldest first.
pub async fn list_chat(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let mut messages: Vec<ChatMessage> =
        state
            .repo
            .list_as(Collection::Chat, &Filter::new(), clamp_limit(params.limit))?;
    messages.reverse();
    Ok(Json(messages))
}
