mod config;
mod constants;
mod error;
mod providers;
mod registry;
mod relay;
mod routes;

use clap::Parser;
use config::Config;
use registry::{SessionRegistry, UsageTracker};
use reqwest::{Client, redirect};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");
pub const BUILD_TIME: &str = env!("BUILD_TIME");

pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub usage: Arc<UsageTracker>,
    pub http_client: Client,
    /// Bearer token guarding the session management routes
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(http_client: Client, admin_token: Option<String>) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new()),
            usage: Arc::new(UsageTracker::new()),
            http_client,
            admin_token,
        }
    }

    /// Drop the session and its usage counters together.
    pub async fn revoke_session(&self, token: &str) {
        self.sessions.revoke(token).await;
        self.usage.clear(token).await;
    }
}

/// Shared upstream client. Redirects are handed back to the caller untouched.
pub fn build_http_client(timeout: Duration, pool_max_idle: usize) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(pool_max_idle)
        .redirect(redirect::Policy::none())
        .build()
}

#[derive(Parser)]
#[command(name = "llm-session-proxy")]
#[command(about = "Credential-injecting reverse proxy for sandboxed LLM clients")]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, env = "LLM_PROXY_HOST")]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long, env = "LLM_PROXY_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let host = args.host.unwrap_or(config.host);
    let port = args.port.unwrap_or(config.port);

    let http_client = build_http_client(config.upstream_timeout, config.pool_max_idle_per_host)
        .expect("Failed to create HTTP client");

    if config.admin_token.is_none() {
        tracing::warn!("LLM_PROXY_ADMIN_TOKEN is not set; session management routes are open");
    }

    let state = Arc::new(AppState::new(http_client, config.admin_token));
    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid address");
    info!(
        "Starting llm-session-proxy v{}-{} (built {})",
        VERSION, GIT_HASH, BUILD_TIME
    );
    info!(
        "Upstream timeout {}s, {} idle connections per host",
        config.upstream_timeout.as_secs(),
        config.pool_max_idle_per_host
    );
    info!("Listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
