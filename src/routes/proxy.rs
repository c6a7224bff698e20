use async_stream::stream;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    response::Response,
};
use futures_util::TryStreamExt;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::{io::StreamReader, sync::PollSender};
use uuid::Uuid;

use super::auth::{extract_session_token, forward_headers};
use crate::AppState;
use crate::error::ProxyError;
use crate::providers::{default_upstream, inject_auth};
use crate::registry::{Session, token_fingerprint};
use crate::relay::usage::UsageDelta;
use crate::relay::{
    RelayOutcome, TeeReader, extract_usage, extract_usage_from_events, is_streaming_response,
    relay,
};

/// Base URL plus the inbound path and query.
///
/// Bytes are kept as sent, except that `.` and `..` path segments are
/// resolved by URL parsing (`/v1/../x` goes out as `/x`).
fn upstream_url(base: &str, path_and_query: &str) -> Result<reqwest::Url, ProxyError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path_and_query);
    reqwest::Url::parse(&raw)
        .map_err(|e| ProxyError::RequestBuildFailure(format!("invalid upstream url {raw}: {e}")))
}

/// Record one response worth of usage against the session.
async fn meter(state: &AppState, session: &Session, (input, output): UsageDelta) {
    state.usage.record(&session.token, input, output).await;

    // A revoke that landed while the response was in flight has already
    // cleared the counters; don't resurrect them.
    if state.sessions.lookup(&session.token).await.is_err() {
        state.usage.clear(&session.token).await;
    }

    tracing::info!(
        sandbox_id = session.sandbox_id.as_deref().unwrap_or(""),
        input_tokens = input,
        output_tokens = output,
        "Metered response"
    );
}

/// Catch-all handler: swap the session token for the real key and forward upstream.
pub async fn proxy_request(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let token = extract_session_token(&parts.headers).ok_or(ProxyError::AuthMissing)?;
    let session = state.sessions.lookup(token).await.map_err(|_| {
        tracing::debug!(token = %token_fingerprint(token), "Rejected unknown session token");
        ProxyError::SessionNotFound
    })?;

    let base = session
        .upstream_url
        .as_deref()
        .or_else(|| default_upstream(&session.provider))
        .ok_or(ProxyError::NoUpstreamResolvable)?;
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = upstream_url(base, path_and_query)?;

    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::RequestBuildFailure(format!("failed to read request body: {e}")))?;

    let mut headers = forward_headers(&parts.headers);
    inject_auth(&mut headers, &session.provider, &session.api_key);

    let request_id = Uuid::new_v4();
    let upstream_request = state
        .http_client
        .request(parts.method.clone(), url)
        .headers(headers)
        .body(body)
        .build()
        .map_err(|e| ProxyError::RequestBuildFailure(e.to_string()))?;

    let upstream = state.http_client.execute(upstream_request).await?;

    let status = upstream.status();
    let streaming = is_streaming_response(upstream.headers());
    let response_headers = forward_headers(upstream.headers());

    tracing::debug!(
        %request_id,
        method = %parts.method,
        path = parts.uri.path(),
        upstream = base,
        provider = %session.provider,
        sandbox_id = session.sandbox_id.as_deref().unwrap_or(""),
        status = status.as_u16(),
        streaming,
        "Proxied request"
    );

    let body = if streaming {
        stream_response(state, session, upstream, request_id)
    } else {
        let bytes = upstream.bytes().await?;
        let delta = extract_usage(&bytes, &session.provider);
        meter(&state, &session, delta).await;
        Body::from(bytes)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

/// Relay an incremental upstream body through a depth-1 channel.
///
/// The relay task owns the upstream body. When the client goes away the
/// receiver is dropped and the task releases upstream, even if upstream is
/// idle at that moment. Usage is recorded before the senders drop, so
/// end-of-body on the client side happens after metering.
fn stream_response(
    state: Arc<AppState>,
    session: Arc<Session>,
    upstream: reqwest::Response,
    request_id: Uuid,
) -> Body {
    let (tx, mut rx) = mpsc::channel::<Bytes>(1);
    let watch = tx.clone();

    tokio::spawn(async move {
        let source = StreamReader::new(Box::pin(upstream.bytes_stream().map_err(io::Error::other)));
        let mut tee = TeeReader::new(source);
        let mut sink = PollSender::new(tx);

        let outcome = tokio::select! {
            outcome = relay(&mut sink, &mut tee) => outcome,
            // Upstream may be silent for minutes while the model thinks
            _ = watch.closed() => RelayOutcome::ClientGone,
        };
        if outcome == RelayOutcome::ClientGone {
            tracing::warn!(%request_id, "Client disconnected mid-stream");
        }

        let (source, captured) = tee.into_parts();
        drop(source);

        let delta = extract_usage_from_events(&captured, &session.provider);
        meter(&state, &session, delta).await;
        drop(watch);
        drop(sink);
    });

    Body::from_stream(stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<Bytes, io::Error>(chunk);
        }
    })
}
