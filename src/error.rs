// Error types: the catalog fetch taxonomy used by the library, and the
// HTTP-facing AppError the axum handlers return.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// Failures talking to the catalog. Clone so one failed shared fetch can be
// handed to every caller that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("catalog returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("expected JSON from catalog, got content-type '{0}'")]
    ContentType(String),
    #[error("failed to decode catalog response: {0}")]
    Decode(String),
}

impl FetchError {
    // Worth another attempt: transport failures, rate limiting and server errors
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::ContentType(_) | FetchError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout(error.to_string())
        } else if let Some(status) = error.status() {
            FetchError::Status {
                status: status.as_u16(),
                url: error.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else if error.is_decode() {
            FetchError::Decode(error.to_string())
        } else {
            FetchError::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        FetchError::Decode(error.to_string())
    }
}

// Failures reading or writing the preference file
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("preference file I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
}

// Application error type for the HTTP service
#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    BadGateway(FetchError),
    BadRequest(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<FetchError> for AppError {
    fn from(error: FetchError) -> Self {
        AppError::BadGateway(error)
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        AppError::InternalServerError(error.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::BadGateway(e) => {
                tracing::warn!("Catalog request failed: {}", e);
                (StatusCode::BAD_GATEWAY, format!("Catalog unavailable: {}", e))
            }
            AppError::BadRequest(message) => {
                tracing::warn!("Rejected request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
        };

        (status, Json(json!({ "success": false, "error": error_message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
