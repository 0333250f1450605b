// routes/helpers.rs
// Response envelope and the mapping from store errors to HTTP statuses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{KosError, Result};

/// Same `{"data": ...}` envelope the backend uses.
#[derive(Serialize)]
pub struct Data<T> {
    pub data: T,
}

pub fn data<T: Serialize>(data: T) -> Json<Data<T>> {
    Json(Data { data })
}

pub fn created<T: Serialize>(value: T) -> (StatusCode, Json<Data<T>>) {
    (StatusCode::CREATED, data(value))
}

pub type ApiResult<T> = std::result::Result<Json<Data<T>>, KosError>;

impl KosError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            KosError::Validation(_) => StatusCode::BAD_REQUEST,
            KosError::InvalidState(_) => StatusCode::CONFLICT,
            KosError::NotFound { .. } => StatusCode::NOT_FOUND,
            KosError::Auth(_) => StatusCode::UNAUTHORIZED,
            // Backend rejections of the request itself keep their status.
            KosError::Fetch {
                status: Some(code @ (400 | 404 | 409 | 422)),
                ..
            } => StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY),
            KosError::Fetch { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for KosError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if self.is_auth() {
            serde_json::json!({ "message": self.to_string(), "redirect": "/login" })
        } else {
            serde_json::json!({ "message": self.to_string() })
        };
        (status, Json(body)).into_response()
    }
}

/// A failed list refresh still serves the cached copy, except when the session is gone.
pub fn stale_ok(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_auth() => Err(err),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(KosError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(KosError::invalid_state("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            KosError::NotFound { entity: "Tagihan", id: 1 }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(KosError::Auth("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(KosError::fetch(None, "x").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(KosError::fetch(Some(500), "x").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(KosError::fetch(Some(409), "x").status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn stale_ok_only_surfaces_auth() {
        assert!(stale_ok(Err(KosError::fetch(None, "offline"))).is_ok());
        assert!(stale_ok(Err(KosError::Auth("expired".into()))).is_err());
    }
}
