// session.rs
// Session middleware to protect routes and extractor to access the signed-in operator.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, header::COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;

use crate::models::AuthUser;
use crate::state::{AppState, AuthSession};

pub const SESSION_COOKIE_NAME: &str = "kosflow_session";

#[derive(Clone)]
pub struct SessionData {
    pub user: AuthUser,
    pub token: String,
}

/// Lets a request through when it carries the token of the current backend session,
/// either as the session cookie or as a bearer header.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(AuthSession { token, user }) = state.session.current().await else {
        return Err(unauthorized_response());
    };

    let matches = extract_cookies(request.headers(), SESSION_COOKIE_NAME)
        .into_iter()
        .chain(bearer_token(request.headers()))
        .any(|candidate| candidate == token);
    if !matches {
        return Err(unauthorized_response());
    }

    request.extensions_mut().insert(SessionData { user, token });
    Ok(next.run(request).await)
}

pub struct SessionUser(pub SessionData);

impl SessionUser {
    pub fn user(&self) -> &AuthUser {
        &self.0.user
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[allow(refining_impl_trait)]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> BoxFuture<'static, Result<Self, Self::Rejection>> {
        let data = parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .ok_or_else(unauthorized_response);

        Box::pin(async move { data.map(SessionUser) })
    }
}

pub fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "message": "Sesi berakhir, silakan login kembali",
            "redirect": "/login"
        })),
    )
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_owned())
}

fn extract_cookies(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_owned())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn picks_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; kosflow_session=abc123 ; lang=id"),
        );
        assert_eq!(extract_cookies(&headers, SESSION_COOKIE_NAME), vec!["abc123"]);
    }

    #[test]
    fn reads_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok-1"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("tok-1"));
    }
}
