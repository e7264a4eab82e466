use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use smdb_types::api::ErrorBody;

/// Failures of catalog reads and mutations.
///
/// `Unauthorized`, `NotFound`, `Validation` and `Conflict` are terminal for
/// the request. `TransientStore` means the store was busy and nothing was
/// written; the caller may try again.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Store temporarily unavailable: {0}")]
    TransientStore(#[source] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    pub fn unauthenticated() -> Self {
        Self::Unauthorized("You are unauthorized to view this page, please login first!".into())
    }

    /// Classify a store failure.
    pub fn from_store(err: anyhow::Error) -> Self {
        if smdb_db::is_transient(&err) {
            Self::TransientStore(err)
        } else {
            error!("Store error: {:#}", err);
            Self::Internal("Unexpected store failure".into())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for CatalogError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for CatalogError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            status: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(CatalogError::unauthenticated().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(CatalogError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(CatalogError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(CatalogError::Conflict("x".into()).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn busy_store_is_transient() {
        let err = CatalogError::from_store(anyhow::Error::from(smdb_db::StoreUnavailable("busy".into())));
        assert!(matches!(err, CatalogError::TransientStore(_)));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = CatalogError::from_store(anyhow::anyhow!("disk full"));
        assert!(matches!(err, CatalogError::Internal(_)));
    }
}
