//! Typed errors for configuration, record controllers and the service boundary.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
    #[error("unsupported store backend: {0} (expected postgres or memory)")]
    UnknownBackend(String),
}

/// Failure reported by a record controller.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    Failed(String),
}

/// Errors raised inside a service operation. Every variant is turned into a
/// failure envelope by the response normalizer; none reach the HTTP layer as-is.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Client input malformed or missing a required field.
    #[error("{0}")]
    Validation(String),
    /// The record controller reported a failure.
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("{0}")]
    NotFound(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::PRECONDITION_FAILED,
            ServiceError::Controller(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// Startup failures: configuration or store bootstrap.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] ControllerError),
}

impl From<sqlx::Error> for BootstrapError {
    fn from(e: sqlx::Error) -> Self {
        BootstrapError::Store(ControllerError::Db(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_taxonomy() {
        assert_eq!(ServiceError::validation("x").status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(
            ServiceError::from(ControllerError::Failed("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ServiceError::NotFound("gone".into()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn controller_message_passes_through() {
        let err = ServiceError::from(ControllerError::Failed("store offline".into()));
        assert_eq!(err.to_string(), "store offline");
    }
}
