use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("session token cannot be empty")]
    InvalidInput,

    #[error("session not found")]
    NotFound,
}

/// A registered sandbox session and the real credential it maps to.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque token the sandbox presents instead of a provider key
    pub token: String,
    /// Provider name; free-form, unknown names are legal
    pub provider: String,
    /// Real provider key. Never leaves the proxy except towards the upstream.
    pub api_key: String,
    /// Upstream base URL override; the provider default is used when absent
    pub upstream_url: Option<String>,
    /// Diagnostic only
    pub sandbox_id: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &super::token_fingerprint(&self.token))
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("upstream_url", &self.upstream_url)
            .field("sandbox_id", &self.sandbox_id)
            .finish()
    }
}

/// Outward view of a session, without the real key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionInfo {
    pub token: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            provider: session.provider.clone(),
            sandbox_id: session.sandbox_id.clone(),
            upstream_url: session.upstream_url.clone(),
        }
    }
}

/// Concurrent token → session map.
///
/// Records are stored behind `Arc` and swapped whole, so a reader holds either
/// the previous or the new record, never a mix of both.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the record at `session.token`.
    pub async fn register(&self, session: Session) -> Result<(), RegistryError> {
        if session.token.is_empty() {
            return Err(RegistryError::InvalidInput);
        }

        let mut guard = self.sessions.write().await;
        guard.insert(session.token.clone(), Arc::new(session));
        Ok(())
    }

    pub async fn lookup(&self, token: &str) -> Result<Arc<Session>, RegistryError> {
        self.sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }

    /// Remove the record if present. Unknown tokens are not an error.
    pub async fn revoke(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// Snapshot of all sessions, ordered by token.
    pub async fn list(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<Arc<Session>> =
            self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| a.token.cmp(&b.token));
        sessions
    }

    /// Snapshot with secrets stripped, for external callers.
    pub async fn list_info(&self) -> Vec<SessionInfo> {
        self.list()
            .await
            .iter()
            .map(|s| SessionInfo::from(s.as_ref()))
            .collect()
    }
}
