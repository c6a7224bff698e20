pub mod auth;
pub mod health;
pub mod proxy;
pub mod sessions;

use axum::{Router, middleware};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::AppState;

// --- Shared response types ---

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Full application router.
///
/// Management and health routes are documented in OpenAPI and matched by
/// method and path. Everything else, including a known path with an unhandled
/// method, is an LLM call and goes through the proxy pipeline.
pub fn router(state: Arc<AppState>) -> Router {
    let (management, openapi) = OpenApiRouter::with_openapi(Default::default())
        .routes(routes!(sessions::register_session, sessions::list_sessions))
        .routes(routes!(sessions::revoke_session))
        .routes(routes!(sessions::get_session_usage))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_auth_middleware,
        ))
        // Registered after the admin layer, so always open
        .routes(routes!(health::health))
        .routes(routes!(health::version))
        .split_for_parts();

    let swagger =
        utoipa_swagger_ui::SwaggerUi::new("/swagger").url("/api-docs/openapi.json", openapi);

    Router::new()
        .merge(management)
        .merge(swagger)
        .fallback(proxy::proxy_request)
        .method_not_allowed_fallback(proxy::proxy_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, Response};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt as _;

    use crate::AppState;
    use crate::registry::Session;

    pub fn state() -> Arc<AppState> {
        state_with_admin(None)
    }

    pub fn state_with_admin(admin_token: Option<&str>) -> Arc<AppState> {
        let client = crate::build_http_client(Duration::from_secs(10), 2).unwrap();
        Arc::new(AppState::new(client, admin_token.map(str::to_string)))
    }

    pub fn session(token: &str, provider: &str, key: &str, upstream: Option<String>) -> Session {
        Session {
            token: token.to_string(),
            provider: provider.to_string(),
            api_key: key.to_string(),
            upstream_url: upstream,
            sandbox_id: Some("sandbox-1".to_string()),
        }
    }

    pub async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response<Body> {
        super::router(state.clone()).oneshot(request).await.unwrap()
    }

    pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }
}
