//! Provider conventions: which header carries the real key, where the API lives,
//! and which usage field names to prefer.
//!
//! Unknown provider names are accepted everywhere and resolve to
//! [`UNKNOWN_PROVIDER`]: no injected auth, no default upstream.

use axum::http::{HeaderMap, HeaderValue, header};

use crate::constants::{API_KEY_HEADER, BEARER_PREFIX};

pub const ANTHROPIC: &str = "anthropic";
pub const OPENAI: &str = "openai";
pub const OLLAMA: &str = "ollama";

/// How the real credential is attached to an outgoing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `x-api-key: <key>`
    ApiKeyHeader,
    /// `Authorization: Bearer <key>`
    Bearer,
    /// Nothing is attached
    None,
}

/// Which pair of usage field names a provider reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageScheme {
    /// `input_tokens` / `output_tokens`
    InputOutput,
    /// `prompt_tokens` / `completion_tokens`
    PromptCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub auth: AuthScheme,
    pub default_upstream: Option<&'static str>,
    pub usage_scheme: UsageScheme,
}

pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: ANTHROPIC,
        auth: AuthScheme::ApiKeyHeader,
        default_upstream: Some("https://api.anthropic.com"),
        usage_scheme: UsageScheme::InputOutput,
    },
    ProviderSpec {
        name: OPENAI,
        auth: AuthScheme::Bearer,
        default_upstream: Some("https://api.openai.com"),
        usage_scheme: UsageScheme::PromptCompletion,
    },
    ProviderSpec {
        name: OLLAMA,
        auth: AuthScheme::None,
        default_upstream: Some("http://localhost:11434"),
        usage_scheme: UsageScheme::InputOutput,
    },
];

pub static UNKNOWN_PROVIDER: ProviderSpec = ProviderSpec {
    name: "",
    auth: AuthScheme::None,
    default_upstream: None,
    usage_scheme: UsageScheme::InputOutput,
};

/// Exact, case-sensitive lookup with the permissive fallback.
pub fn provider_spec(name: &str) -> &'static ProviderSpec {
    PROVIDERS
        .iter()
        .find(|p| p.name == name)
        .unwrap_or(&UNKNOWN_PROVIDER)
}

pub fn default_upstream(provider: &str) -> Option<&'static str> {
    provider_spec(provider).default_upstream
}

/// Strip whatever credential the sandbox sent and attach the real one.
pub fn inject_auth(headers: &mut HeaderMap, provider: &str, api_key: &str) {
    headers.remove(header::AUTHORIZATION);
    headers.remove(API_KEY_HEADER);

    let (name, raw) = match provider_spec(provider).auth {
        AuthScheme::ApiKeyHeader => (
            header::HeaderName::from_static(API_KEY_HEADER),
            api_key.to_string(),
        ),
        AuthScheme::Bearer => (header::AUTHORIZATION, format!("{BEARER_PREFIX}{api_key}")),
        AuthScheme::None => return,
    };

    match HeaderValue::from_str(&raw) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(name, value);
        }
        Err(_) => {
            tracing::warn!(provider, "Registered API key is not a valid header value; sending no auth");
        }
    }
}
