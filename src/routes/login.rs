// routes/login.rs
// POST /login { "email": "...", "password": "..." } -> signs in against the backend and sets the session cookie.

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::KosError;
use crate::gateway::Credentials;
use crate::session::SESSION_COOKIE_NAME;
use crate::state::AppState;

use super::helpers::data;

/// Cookie lifetime; the backend decides when the token itself expires.
const COOKIE_MAX_AGE_SECONDS: u64 = 60 * 60 * 24 * 7;

pub async fn login(
    State(st): State<Arc<AppState>>,
    Json(body): Json<Credentials>,
) -> Result<Response, KosError> {
    let session = st.auth.login(&body).await?;

    let mut response = data(&session.user).into_response();
    if let Ok(header_value) = HeaderValue::from_str(&session_cookie(&session.token, COOKIE_MAX_AGE_SECONDS)) {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
    Ok(response)
}

pub(super) fn session_cookie(token: &str, max_age: u64) -> String {
    format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}
