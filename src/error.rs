// error.rs
// Error taxonomy shared by the stores, gateways and routes.

use thiserror::Error;

use crate::models::Id;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KosError {
    /// Missing or malformed input, raised before any gateway call.
    #[error("{0}")]
    Validation(String),

    /// Backend unreachable, timed out, or answered with a non-success status.
    #[error("{message}")]
    Fetch { status: Option<u16>, message: String },

    /// Operation not permitted from the entity's current status.
    #[error("{0}")]
    InvalidState(String),

    /// Session expired or rejected by the backend.
    #[error("{0}")]
    Auth(String),

    #[error("{entity} #{id} tidak ditemukan")]
    NotFound { entity: &'static str, id: Id },
}

impl KosError {
    pub fn validation(message: impl Into<String>) -> Self {
        KosError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        KosError::InvalidState(message.into())
    }

    pub fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        KosError::Fetch {
            status,
            message: message.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, KosError::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, KosError>;
