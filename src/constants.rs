/// Header carrying Anthropic-style API keys (and session tokens from sandboxes)
pub const API_KEY_HEADER: &str = "x-api-key";

/// Scheme prefix accepted (and stripped) on inbound `Authorization` values
pub const BEARER_PREFIX: &str = "Bearer ";

/// Read size for the streaming relay. Small enough to keep token streams snappy.
pub const RELAY_CHUNK_SIZE: usize = 32 * 1024;

/// Default whole-request timeout for upstream calls (extended thinking can take minutes)
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 300;

/// Default idle connections kept per upstream host
pub const DEFAULT_POOL_MAX_IDLE: usize = 10;

/// Connection-scoped headers that never cross the proxy boundary
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "host",
];

/// Content types that mark an upstream response as incremental
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
