use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Every failure a route can produce. The client only ever sees the status
/// code and the `Display` text in `{"error": ...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Caller is not the owner of the targeted campaign
    #[error("Unauthorized")]
    Forbidden,

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("Database error")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(cause) = &self {
            error!("Store failure: {}", cause);
        }
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
