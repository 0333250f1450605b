// routes/reminders.rs
// Reminder CRUD and the test send.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::error::KosError;
use crate::gateway::ReminderDraft;
use crate::models::{Id, Reminder};
use crate::state::{AppState, Snapshot};

use super::helpers::{ApiResult, Data, created, data, stale_ok};

pub async fn reminders_index(State(state): State<Arc<AppState>>) -> ApiResult<Snapshot<Reminder>> {
    stale_ok(state.reminders.refresh().await)?;
    Ok(data(state.reminders.snapshot().await))
}

pub async fn reminders_show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> ApiResult<Reminder> {
    Ok(data(state.reminders.require(id).await?))
}

pub async fn reminders_create(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<ReminderDraft>,
) -> Result<(StatusCode, Json<Data<Reminder>>), KosError> {
    Ok(created(state.reminders.create(draft).await?))
}

pub async fn reminders_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    Json(draft): Json<ReminderDraft>,
) -> ApiResult<Reminder> {
    Ok(data(state.reminders.update(id, draft).await?))
}

pub async fn reminders_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<StatusCode, KosError> {
    state.reminders.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct TestSend {
    message: String,
}

pub async fn reminders_test(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> ApiResult<TestSend> {
    let message = state.reminders.test_send(id).await?;
    Ok(data(TestSend { message }))
}
