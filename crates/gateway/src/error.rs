//! Mapping resolution failures onto the public response contract.

use {
    axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    snare_resolver::ResolveError,
    tracing::{error, warn},
};

pub const INVALID_REQUEST: &str = "Invalid request";
pub const STORE_FAILURE: &str = "Server Error, Check your Id.";
pub const PIPELINE_FAILURE: &str = "Server Error, check the params.";

/// A failed resolve request. Details are logged, never returned.
#[derive(Debug)]
pub enum ApiError {
    InvalidRequest,
    Resolve(ResolveError),
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidInput(_) => Self::InvalidRequest,
            other => Self::Resolve(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidRequest => (StatusCode::BAD_REQUEST, INVALID_REQUEST).into_response(),
            Self::Resolve(err @ ResolveError::StoreUnavailable(_)) => {
                error!(error = %err, "cache read failed");
                (StatusCode::INTERNAL_SERVER_ERROR, STORE_FAILURE).into_response()
            },
            Self::Resolve(err) => {
                warn!(error = %err, "stream resolution failed");
                (StatusCode::INTERNAL_SERVER_ERROR, PIPELINE_FAILURE).into_response()
            },
        }
    }
}
