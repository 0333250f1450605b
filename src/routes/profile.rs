// routes/profile.rs
// GET /api/me -> the signed-in operator.

use std::sync::Arc;

use axum::extract::State;

use crate::models::AuthUser;
use crate::{session::SessionUser, state::AppState};

use super::helpers::{ApiResult, data};

/// Current operator, re-read from the backend when it is reachable.
pub async fn me(session: SessionUser, State(state): State<Arc<AppState>>) -> ApiResult<AuthUser> {
    match state.auth.refresh_profile().await {
        Ok(user) => Ok(data(user)),
        Err(err) if err.is_auth() => Err(err),
        Err(err) => {
            tracing::debug!(error = %err, "profile refresh failed; serving cached profile");
            Ok(data(session.user().clone()))
        }
    }
}
