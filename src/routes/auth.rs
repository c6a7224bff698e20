use axum::{
    extract::State,
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::AppState;
use crate::constants::{API_KEY_HEADER, BEARER_PREFIX, HOP_BY_HOP_HEADERS};
use crate::error::ProxyError;

/// Credential carried by an `Authorization` value.
///
/// `Bearer <token>` (scheme matched case-insensitively) and a bare token are
/// both accepted. Any other scheme, or a bearer with nothing after it, yields
/// `None` so the caller can fall through to the next header.
fn bearer_credential(value: &str) -> Option<&str> {
    let value = value.trim();
    let scheme = BEARER_PREFIX.trim_end();
    let credential = match value.split_once(char::is_whitespace) {
        Some((prefix, rest)) if prefix.eq_ignore_ascii_case(scheme) => rest.trim_start(),
        // Basic, Digest, ...
        Some(_) => return None,
        None if value.eq_ignore_ascii_case(scheme) => return None,
        None => value,
    };
    Some(credential).filter(|c| !c.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Session token from `Authorization` (checked first) or `x-api-key`.
pub fn extract_session_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = header_str(headers, header::AUTHORIZATION).and_then(bearer_credential) {
        return Some(token);
    }

    header_str(headers, API_KEY_HEADER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Copy headers across the proxy boundary, minus connection-scoped ones.
///
/// `content-length` is dropped as well: bodies are re-framed on each side.
pub fn forward_headers(src: &HeaderMap) -> HeaderMap {
    let mut dst = HeaderMap::with_capacity(src.len());
    for (name, value) in src {
        let name_str = name.as_str();
        if HOP_BY_HOP_HEADERS.contains(&name_str) || *name == header::CONTENT_LENGTH {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
    dst
}

/// Middleware for session management routes (bearer admin token, when configured)
pub async fn admin_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return next.run(request).await;
    };

    let provided = header_str(request.headers(), header::AUTHORIZATION).and_then(bearer_credential);

    // Constant-time comparison to prevent timing attacks
    if let Some(provided) = provided
        && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
    {
        next.run(request).await
    } else {
        ProxyError::AdminUnauthorized.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_bearer_token_extracted() {
        let h = headers(&[("authorization", "Bearer session-abc")]);
        assert_eq!(extract_session_token(&h), Some("session-abc"));
    }

    #[test]
    fn test_bearer_prefix_optional_and_case_insensitive() {
        let h = headers(&[("authorization", "session-abc")]);
        assert_eq!(extract_session_token(&h), Some("session-abc"));
        let h = headers(&[("authorization", "bearer  session-abc")]);
        assert_eq!(extract_session_token(&h), Some("session-abc"));
    }

    #[test]
    fn test_api_key_header_used_when_no_authorization() {
        let h = headers(&[("x-api-key", "t1")]);
        assert_eq!(extract_session_token(&h), Some("t1"));
    }

    #[test]
    fn test_authorization_checked_first() {
        let h = headers(&[
            ("x-api-key", "from-key-header"),
            ("authorization", "Bearer from-bearer"),
        ]);
        assert_eq!(extract_session_token(&h), Some("from-bearer"));
    }

    #[test]
    fn test_empty_values_are_absent() {
        let h = headers(&[("authorization", "Bearer "), ("x-api-key", "t2")]);
        assert_eq!(extract_session_token(&h), Some("t2"));
        let h = headers(&[("authorization", ""), ("x-api-key", "")]);
        assert_eq!(extract_session_token(&h), None);
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bare_bearer_scheme_falls_through_to_api_key() {
        for value in ["Bearer", "Bearer ", "bearer   ", "  BEARER\t"] {
            let h = headers(&[("authorization", value), ("x-api-key", "t2")]);
            assert_eq!(extract_session_token(&h), Some("t2"), "{value:?}");
        }
        let h = headers(&[("authorization", "Bearer ")]);
        assert_eq!(extract_session_token(&h), None);
    }

    #[test]
    fn test_other_auth_schemes_fall_through_to_api_key() {
        let h = headers(&[("authorization", "Basic dXNlcjpwYXNz"), ("x-api-key", "t3")]);
        assert_eq!(extract_session_token(&h), Some("t3"));
        let h = headers(&[("authorization", "Token abc")]);
        assert_eq!(extract_session_token(&h), None);
    }

    #[test]
    fn test_forward_headers_drops_hop_by_hop() {
        let src = headers(&[
            ("connection", "keep-alive"),
            ("keep-alive", "timeout=5"),
            ("transfer-encoding", "chunked"),
            ("te", "trailers"),
            ("trailer", "x-checksum"),
            ("upgrade", "h2c"),
            ("host", "proxy.local:8090"),
            ("content-length", "12"),
            ("content-type", "application/json"),
            ("anthropic-version", "2023-06-01"),
            ("accept", "text/event-stream"),
            ("accept", "application/json"),
        ]);

        let dst = forward_headers(&src);

        assert_eq!(dst.len(), 4);
        assert_eq!(dst["content-type"], "application/json");
        assert_eq!(dst["anthropic-version"], "2023-06-01");
        assert_eq!(dst.get_all("accept").iter().count(), 2);
        for name in HOP_BY_HOP_HEADERS {
            assert!(dst.get(*name).is_none(), "{name} must not be forwarded");
        }
    }
}
