//! Stream rooms. Creation and deletion persist immediately and hand the
//! provider call to the side-effect worker, which broadcasts `stream_state`
//! once the provider has confirmed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use livecart_core::types::StreamRoom;
use livecart_store::{Collection, Repository, RepositoryExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};
use crate::side_effects::SideEffect;
use crate::streaming::{StreamError, StreamToken};

#[derive(Debug, Deserialize)]
pub struct RoomRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub identity: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenClaims {
    pub room_id: String,
    pub identity: String,
}

/// POST /api/admin/streams: answers 202, the room opens asynchronously.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RoomRequest>,
) -> ApiResult<(StatusCode, Json<StreamRoom>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name cannot be empty"));
    }
    let room: StreamRoom = state
        .repo
        .append_as(Collection::StreamRooms, &json!({ "name": name }))?;
    info!(room_id = %room.id, "stream room requested");
    state.side_effects.submit(SideEffect::OpenRoom(room.clone()));
    Ok((StatusCode::ACCEPTED, Json(room)))
}

/// DELETE /api/admin/streams/{id}
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let room: StreamRoom = find_room(&state, &id)?;
    state.repo.delete(Collection::StreamRooms, &id)?;
    state.side_effects.submit(SideEffect::CloseRoom(room));
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/streams/{id}/token: viewer credential for a room.
pub async fn mint_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<StreamToken>> {
    let identity = req.identity.trim();
    if identity.is_empty() {
        return Err(ApiError::validation("identity cannot be empty"));
    }
    let room = find_room(&state, &id)?;
    Ok(Json(state.streams.mint_token(&room.id, identity)?))
}

/// POST /api/streams/verify: lets the media edge check a viewer credential.
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<TokenClaims>> {
    match state.streams.verify_token(req.token.trim()) {
        Ok((room_id, identity)) => Ok(Json(TokenClaims { room_id, identity })),
        Err(e @ (StreamError::MalformedToken | StreamError::BadSignature | StreamError::Expired)) => {
            Err(ApiError::Unauthorized(e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn find_room(state: &AppState, id: &str) -> ApiResult<StreamRoom> {
    state
        .repo
        .get_as(Collection::StreamRooms, id)?
        .ok_or_else(|| ApiError::NotFound(format!("stream room {id} not found")))
}
