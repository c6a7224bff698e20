//! In-memory, process-lifetime registries shared by all requests.
//!
//! - `sessions`: session token → credential record
//! - `usage`: session token → accumulated token counters
//!
//! Nothing here is persisted; a restart starts from empty registries.

pub mod sessions;
pub mod usage;

pub use sessions::{Session, SessionInfo, SessionRegistry};
pub use usage::{Usage, UsageTracker};

use sha2::{Digest, Sha256};

/// Short, stable identifier for a session token that is safe to log.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_opaque() {
        let a = token_fingerprint("session-abc");
        assert_eq!(a, token_fingerprint("session-abc"));
        assert_eq!(a.len(), 12);
        assert!(!a.contains("abc"));
        assert_ne!(a, token_fingerprint("session-abd"));
    }
}
