// routes/logout.rs
// POST /logout -> drops the persisted backend session and clears the cookie.

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::session::SessionUser;
use crate::state::AppState;

use super::login::session_cookie;

pub async fn logout(State(st): State<Arc<AppState>>, session: SessionUser) -> Response {
    st.auth.logout().await;
    tracing::info!(user = %session.user().username, "operator signed out");

    let mut response = Json(serde_json::json!({ "ok": true, "redirect": "/login" })).into_response();
    if let Ok(header_value) = HeaderValue::from_str(&session_cookie("", 0)) {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
    response
}
