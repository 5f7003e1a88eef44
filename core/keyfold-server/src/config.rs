//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the keyfold service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Session lifetime in seconds.
    pub session_ttl_secs: i64,

    /// How long a started handshake may wait for the client proof.
    pub handshake_ttl_secs: i64,

    /// Invite lifetime in seconds.
    pub invite_ttl_secs: i64,

    /// Email verification token lifetime in seconds.
    pub email_token_ttl_secs: i64,

    /// Sliding window for failed-proof rate limiting (seconds).
    pub rate_limit_window_secs: i64,

    /// Failed proofs tolerated per account within the window.
    pub rate_limit_max_failures: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 30 * 24 * 3600,
            handshake_ttl_secs: 60,
            invite_ttl_secs: 72 * 3600,
            email_token_ttl_secs: 3600,
            rate_limit_window_secs: 60,
            rate_limit_max_failures: 5,
        }
    }
}

impl ServerConfig {
    /// Short-lived config for tests.
    pub fn test() -> Self {
        Self {
            session_ttl_secs: 3600,
            handshake_ttl_secs: 5,
            invite_ttl_secs: 60,
            email_token_ttl_secs: 60,
            rate_limit_window_secs: 10,
            rate_limit_max_failures: 3,
        }
    }
}
