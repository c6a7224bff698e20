//! Per-session token accounting.

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use utoipa::ToSchema;

/// Accumulated counters for one session token. All fields only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub requests: u64,
}

#[derive(Default)]
pub struct UsageTracker {
    usage: RwLock<HashMap<String, Usage>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one processed response to `token`'s counters.
    /// A zero delta still counts as a request.
    pub async fn record(&self, token: &str, input: u64, output: u64) {
        let mut guard = self.usage.write().await;
        let usage = guard.entry(token.to_string()).or_default();
        usage.input_tokens = usage.input_tokens.saturating_add(input);
        usage.output_tokens = usage.output_tokens.saturating_add(output);
        usage.requests = usage.requests.saturating_add(1);
    }

    /// Current counters, or a zero record when nothing was recorded.
    pub async fn get(&self, token: &str) -> Usage {
        self.usage
            .read()
            .await
            .get(token)
            .copied()
            .unwrap_or_default()
    }

    pub async fn clear(&self, token: &str) {
        self.usage.write().await.remove(token);
    }
}
