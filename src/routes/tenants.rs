// routes/tenants.rs
// Tenant CRUD, per-tenant billings and reminders, and face photo upload.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};

use crate::error::KosError;
use crate::gateway::TenantDraft;
use crate::models::{Billing, Id, Reminder, Tenant};
use crate::state::{AppState, Snapshot};

use super::helpers::{ApiResult, Data, created, data, stale_ok};

pub async fn tenants_index(State(state): State<Arc<AppState>>) -> ApiResult<Snapshot<Tenant>> {
    stale_ok(state.tenants.refresh().await)?;
    Ok(data(state.tenants.snapshot().await))
}

pub async fn tenants_show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> ApiResult<Tenant> {
    Ok(data(state.tenants.require(id).await?))
}

pub async fn tenants_create(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<TenantDraft>,
) -> Result<(StatusCode, Json<Data<Tenant>>), KosError> {
    Ok(created(state.tenants.create(draft).await?))
}

pub async fn tenants_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    Json(draft): Json<TenantDraft>,
) -> ApiResult<Tenant> {
    Ok(data(state.tenants.update(id, draft).await?))
}

pub async fn tenants_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<StatusCode, KosError> {
    state.tenants.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn tenant_billings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> ApiResult<Vec<Billing>> {
    stale_ok(state.billing.refresh().await)?;
    Ok(data(state.billing.for_tenant(id).await))
}

pub async fn tenant_reminders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> ApiResult<Vec<Reminder>> {
    Ok(data(state.reminders.by_tenant(id).await?))
}

/// Multipart form with the photo in the `foto` field.
pub async fn tenant_face_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
    mut multipart: Multipart,
) -> Result<StatusCode, KosError> {
    state.tenants.require(id).await?;
    let invalid = |_| KosError::validation("Form unggah foto tidak valid");
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("foto") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("penghuni-{id}.jpg"));
        let photo = field.bytes().await.map_err(invalid)?;
        state.face.upload_face(id, photo.to_vec(), &filename).await?;
        return Ok(StatusCode::NO_CONTENT);
    }
    Err(KosError::validation("Foto wajah wajib diunggah"))
}

pub async fn tenant_face_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Id>,
) -> Result<StatusCode, KosError> {
    state.face.remove_face(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
