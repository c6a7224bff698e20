use std::env;
use std::time::Duration;

use dotenvy::dotenv;

use crate::constants::{DEFAULT_POOL_MAX_IDLE, DEFAULT_UPSTREAM_TIMEOUT_SECS};

pub struct Config {
    pub host: String,
    pub port: u16,
    /// Whole-request timeout for upstream provider calls
    pub upstream_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// Bearer token required on the session management routes (None = open)
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let host = env::var("LLM_PROXY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("LLM_PROXY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8090);

        let upstream_timeout = env::var("LLM_PROXY_UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS));

        let pool_max_idle_per_host = env::var("LLM_PROXY_POOL_MAX_IDLE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POOL_MAX_IDLE);

        let admin_token = env::var("LLM_PROXY_ADMIN_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Self {
            host,
            port,
            upstream_timeout,
            pool_max_idle_per_host,
            admin_token,
        }
    }
}
