//! Response relay and metering.
//!
//! This module provides:
//! - `streaming`: chunked relay with per-chunk flush, and the tee that captures
//!   the relayed bytes
//! - `usage`: best-effort token usage extraction from captured bodies

pub mod streaming;
pub mod usage;

pub use streaming::{RelayOutcome, TeeReader, relay};
pub use usage::{extract_usage, extract_usage_from_events};

use axum::http::{HeaderMap, header};

use crate::constants::{EVENT_STREAM_CONTENT_TYPE, NDJSON_CONTENT_TYPE};

/// Whether an upstream response is incremental and must be relayed chunk by chunk.
pub fn is_streaming_response(headers: &HeaderMap) -> bool {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type.starts_with(EVENT_STREAM_CONTENT_TYPE)
        || content_type.contains(NDJSON_CONTENT_TYPE)
    {
        return true;
    }

    headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| {
            v.split(',')
                .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        })
}
