use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

use crate::models::ErrorResponse;

// Request rejected before any cache or upstream access
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("prompt is required")]
    EmptyPrompt,

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("prompt is too long for {model}: ~{estimated_tokens} tokens, limit {max_tokens}")]
    PromptTooLong {
        model: &'static str,
        estimated_tokens: usize,
        max_tokens: u32,
    },

    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

// Cache backend failures. Absorbed by ResultCache, never shown to callers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

pub type CacheResult<T> = Result<T, CacheError>;

// Upstream call failures, classified by whether a retry makes sense
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream connection failed: {0}")]
    Connection(String),

    #[error("upstream server error ({status})")]
    ServerError { status: u16 },

    #[error("upstream rejected the request ({status})")]
    Rejected { status: u16 },

    #[error("malformed upstream response: {0}")]
    Protocol(String),
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Timeout(_)
            | UpstreamError::Connection(_)
            | UpstreamError::ServerError { .. } => true,
            UpstreamError::Rejected { .. } | UpstreamError::Protocol(_) => false,
        }
    }
}

// Terminal failure of a generate request
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Validation(_) => false,
            GatewayError::Upstream(err) => err.is_retryable(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let retryable = match &self {
            GatewayError::Validation(_) => None,
            GatewayError::Upstream(err) => Some(err.is_retryable()),
        };
        let body = ErrorResponse {
            status: false,
            error: self.to_string(),
            retryable,
        };
        (self.status_code(), Json(body)).into_response()
    }
}
