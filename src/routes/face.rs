// routes/face.rs
// Door camera: access logs, notifications, stats and the detection monitor.

use std::{sync::Arc, time::Duration};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::error::KosError;
use crate::gateway::LogFilter;
use crate::models::{AccessLog, FaceNotification, FaceStats, Id, Recognition};
use crate::monitor::{MonitorStatus, frame_data_url};
use crate::state::{AppState, Snapshot};

use super::helpers::{ApiResult, data, stale_ok};

pub async fn face_logs(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<LogFilter>,
) -> ApiResult<Snapshot<AccessLog>> {
    stale_ok(state.face.fetch_logs(filter).await)?;
    Ok(data(state.face.logs().await))
}

#[derive(Serialize)]
pub struct NotificationList {
    #[serde(flatten)]
    snapshot: Snapshot<FaceNotification>,
    unread: u64,
}

pub async fn face_notifications(
    State(state): State<Arc<AppState>>,
) -> ApiResult<NotificationList> {
    stale_ok(state.face.fetch_notifications().await)?;
    stale_ok(state.face.refresh_unread_count().await.map(|_| ()))?;
    Ok(data(NotificationList {
        snapshot: state.face.notifications().await,
        unread: state.face.unread_count().await,
    }))
}

/// Intake for notifications relayed from the backend's push channel.
pub async fn face_notification_push(
    State(state): State<Arc<AppState>>,
    Json(notification): Json<FaceNotification>,
) -> ApiResult<UnreadCount> {
    state.face.push_notification(notification).await;
    Ok(data(UnreadCount {
        count: state.face.unread_count().await,
    }))
}

#[derive(Serialize)]
pub struct UnreadCount {
    count: u64,
}

pub async fn face_unread_count(State(state): State<Arc<AppState>>) -> ApiResult<UnreadCount> {
    let count = state.face.refresh_unread_count().await?;
    Ok(data(UnreadCount { count }))
}

pub async fn face_notification_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<StatusCode, KosError> {
    state.face.mark_read(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn face_notifications_read_all(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, KosError> {
    state.face.mark_all_read().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn face_stats(State(state): State<Arc<AppState>>) -> ApiResult<FaceStats> {
    Ok(data(state.face.fetch_stats().await?))
}

/// One-off recognition of a JPEG posted as the raw body.
pub async fn face_recognize(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Vec<Recognition>> {
    if body.is_empty() {
        return Err(KosError::validation("Gambar wajib dikirim"));
    }
    Ok(data(state.face.recognize(&frame_data_url(&body)).await?))
}

#[derive(Deserialize, Default)]
pub struct StartMonitor {
    #[serde(default)]
    interval_secs: Option<u64>,
}

pub async fn monitor_start(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartMonitor>>,
) -> ApiResult<MonitorStatus> {
    let Some(source) = state.frames.clone() else {
        return Err(KosError::validation("Sumber kamera belum dikonfigurasi"));
    };
    let Json(form) = body.unwrap_or_default();
    let interval = match form.interval_secs {
        Some(0) => return Err(KosError::validation("Interval deteksi harus lebih dari 0")),
        other => other.map(Duration::from_secs),
    };
    state.monitor.start(source, interval).await?;
    Ok(data(state.monitor.status().await))
}

pub async fn monitor_stop(State(state): State<Arc<AppState>>) -> ApiResult<MonitorStatus> {
    state.monitor.stop().await;
    Ok(data(state.monitor.status().await))
}

pub async fn monitor_status(State(state): State<Arc<AppState>>) -> ApiResult<MonitorStatus> {
    Ok(data(state.monitor.status().await))
}
