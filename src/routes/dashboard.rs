// routes/dashboard.rs
// GET /api/dashboard -> landing page figures.

use std::sync::Arc;

use axum::extract::State;

use crate::state::{AppState, dashboard};

use super::helpers::{ApiResult, data};

pub async fn dashboard(State(state): State<Arc<AppState>>) -> ApiResult<dashboard::DashboardSummary> {
    Ok(data(dashboard::load(&state).await))
}
