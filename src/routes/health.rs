use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::StatusResponse;
use crate::{BUILD_TIME, GIT_HASH, VERSION};

#[derive(Serialize, ToSchema)]
pub struct BuildInfo {
    pub version: &'static str,
    /// Short commit hash, `-dirty` when built from a modified tree
    pub git_hash: &'static str,
    pub build_time: &'static str,
}

/// Liveness probe. Needs no credentials.
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "health",
    responses((status = 200, body = StatusResponse))
)]
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

#[utoipa::path(
    get,
    path = "/v1/version",
    tag = "health",
    responses((status = 200, body = BuildInfo))
)]
pub async fn version() -> Json<BuildInfo> {
    Json(BuildInfo {
        version: VERSION,
        git_hash: GIT_HASH,
        build_time: BUILD_TIME,
    })
}
