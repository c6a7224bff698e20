use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{ErrorResponse, StatusResponse};
use crate::AppState;
use crate::error::ProxyError;
use crate::registry::{Session, SessionInfo, Usage, token_fingerprint};

// --- Types ---

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    pub token: String,
    pub provider: String,
    pub api_key: String,
    pub upstream_url: Option<String>,
    pub sandbox_id: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Only absolute http(s) URLs make sense as an upstream base
fn validate_upstream_url(raw: &str) -> Result<(), ProxyError> {
    let parsed = url::Url::parse(raw).map_err(|e| {
        ProxyError::InvalidRegistration(format!("invalid upstream_url: {e}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ProxyError::InvalidRegistration(
            "upstream_url must be an absolute http or https URL".into(),
        ));
    }
    Ok(())
}

impl RegisterRequest {
    /// Validate and turn into a registry record.
    pub fn into_session(self) -> Result<Session, ProxyError> {
        let missing: Vec<&str> = [
            ("token", &self.token),
            ("provider", &self.provider),
            ("api_key", &self.api_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(ProxyError::InvalidRegistration(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let upstream_url = non_empty(self.upstream_url);
        if let Some(url) = &upstream_url {
            validate_upstream_url(url)?;
        }

        Ok(Session {
            token: self.token,
            provider: self.provider,
            api_key: self.api_key,
            upstream_url,
            sandbox_id: non_empty(self.sandbox_id),
        })
    }
}

// --- Handlers ---

/// Register (or replace) a sandbox session
#[utoipa::path(
    post,
    path = "/v1/sessions",
    tag = "sessions",
    request_body = RegisterRequest,
    responses(
        (status = 201, body = StatusResponse),
        (status = 400, body = ErrorResponse),
    )
)]
pub async fn register_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<StatusResponse>), ProxyError> {
    let request: RegisterRequest = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::InvalidRegistration(format!("invalid request: {e}")))?;
    let session = request.into_session()?;

    let fingerprint = token_fingerprint(&session.token);
    let sandbox_id = session.sandbox_id.clone().unwrap_or_default();
    let provider = session.provider.clone();

    state
        .sessions
        .register(session)
        .await
        .map_err(|e| ProxyError::InvalidRegistration(e.to_string()))?;

    tracing::info!(
        sandbox_id = %sandbox_id,
        provider = %provider,
        token = %fingerprint,
        "Registered session"
    );

    Ok((
        StatusCode::CREATED,
        Json(StatusResponse {
            status: "registered",
        }),
    ))
}

/// Revoke a session and clear its usage. Unknown tokens succeed too.
#[utoipa::path(
    delete,
    path = "/v1/sessions/{token}",
    tag = "sessions",
    params(("token" = String, Path, description = "Session token")),
    responses(
        (status = 200, body = StatusResponse),
    )
)]
pub async fn revoke_session(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Json<StatusResponse> {
    state.revoke_session(&token).await;

    tracing::info!(token = %token_fingerprint(&token), "Revoked session");

    Json(StatusResponse { status: "revoked" })
}

/// List registered sessions (real keys omitted)
#[utoipa::path(
    get,
    path = "/v1/sessions",
    tag = "sessions",
    responses(
        (status = 200, body = Vec<SessionInfo>),
    )
)]
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions.list_info().await)
}

/// Accumulated token usage for a session
#[utoipa::path(
    get,
    path = "/v1/sessions/{token}/usage",
    tag = "sessions",
    params(("token" = String, Path, description = "Session token")),
    responses(
        (status = 200, body = Usage),
    )
)]
pub async fn get_session_usage(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Json<Usage> {
    Json(state.usage.get(&token).await)
}
