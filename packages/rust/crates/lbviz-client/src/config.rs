//! Decision service connection config.

use serde::{Deserialize, Serialize};

/// Where the decision service listens by default (Flask dev server port).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
/// Per-request timeout; `0` disables it.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Connection settings for [`crate::HttpDecisionClient`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionClientConfig {
    /// Service root (e.g. `http://127.0.0.1:5000`); paths are appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in milliseconds. `0` means no timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for DecisionClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
