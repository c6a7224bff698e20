use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Terminal failures of a single request. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("missing or invalid authorization header")]
    AuthMissing,

    #[error("invalid session token")]
    SessionNotFound,

    #[error("unknown provider")]
    NoUpstreamResolvable,

    #[error("internal error")]
    RequestBuildFailure(String),

    #[error("upstream request failed")]
    UpstreamUnreachable(#[from] reqwest::Error),

    #[error("{0}")]
    InvalidRegistration(String),

    #[error("unauthorized")]
    AdminUnauthorized,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::AuthMissing | ProxyError::SessionNotFound | ProxyError::AdminUnauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ProxyError::NoUpstreamResolvable | ProxyError::InvalidRegistration(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::RequestBuildFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            ProxyError::RequestBuildFailure(detail) => {
                tracing::error!("Failed to build upstream request: {detail}");
            }
            ProxyError::UpstreamUnreachable(e) => {
                tracing::warn!("Upstream request failed: {e}");
            }
            _ => {}
        }

        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
