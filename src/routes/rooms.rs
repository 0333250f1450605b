// routes/rooms.rs
// Room CRUD and the list of available rooms.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::error::KosError;
use crate::gateway::RoomDraft;
use crate::models::{Id, Room};
use crate::state::{AppState, Snapshot};

use super::helpers::{ApiResult, Data, created, data, stale_ok};

pub async fn rooms_index(State(state): State<Arc<AppState>>) -> ApiResult<Snapshot<Room>> {
    stale_ok(state.rooms.refresh().await)?;
    Ok(data(state.rooms.snapshot().await))
}

pub async fn rooms_available(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Room>> {
    stale_ok(state.rooms.refresh().await)?;
    Ok(data(state.rooms.available().await))
}

pub async fn rooms_show(State(state): State<Arc<AppState>>, Path(id): Path<Id>) -> ApiResult<Room> {
    Ok(data(state.rooms.require(id).await?))
}

pub async fn rooms_create(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<RoomDraft>,
) -> Result<(StatusCode, Json<Data<Room>>), KosError> {
    Ok(created(state.rooms.create(draft).await?))
}

pub async fn rooms_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    Json(draft): Json<RoomDraft>,
) -> ApiResult<Room> {
    Ok(data(state.rooms.update(id, draft).await?))
}

pub async fn rooms_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<StatusCode, KosError> {
    state.rooms.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
