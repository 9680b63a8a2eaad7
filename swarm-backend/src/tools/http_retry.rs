//! HTTP backoff bookkeeping for tools that talk to remote providers.
//!
//! Tools never retry on their own; a failed `handle` is reported back to the
//! caller. What this module does is keep per-endpoint exponential backoff so
//! a `RateLimit` error can tell the caller how long to wait, and map HTTP
//! failures onto the tool error taxonomy.

use crate::tools::error::ToolError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Minimum backoff delay in seconds
const MIN_BACKOFF_SECS: u64 = 5;
/// Maximum backoff delay in seconds
const MAX_BACKOFF_SECS: u64 = 60;
/// Quiet period after which backoff starts over
const RESET_AFTER_SECS: u64 = 120;

#[derive(Debug, Clone)]
struct BackoffState {
    current_delay: u64,
    last_error_at: Instant,
    error_count: u32,
}

/// Per-endpoint backoff tracking
pub struct HttpRetryManager {
    states: RwLock<HashMap<String, BackoffState>>,
}

impl HttpRetryManager {
    pub fn new() -> Self {
        HttpRetryManager {
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide instance shared by all HTTP-backed tools
    pub fn global() -> &'static HttpRetryManager {
        static INSTANCE: OnceLock<HttpRetryManager> = OnceLock::new();
        INSTANCE.get_or_init(HttpRetryManager::new)
    }

    pub fn record_success(&self, key: &str) {
        if self.states.write().remove(key).is_some() {
            log::debug!("[HTTP_RETRY] Success for '{}', backoff reset", key);
        }
    }

    /// Record a failure and return the delay (seconds) the caller should wait
    pub fn record_error(&self, key: &str) -> u64 {
        let mut states = self.states.write();
        let now = Instant::now();

        let state = states
            .entry(key.to_string())
            .or_insert_with(|| BackoffState {
                current_delay: MIN_BACKOFF_SECS,
                last_error_at: now,
                error_count: 0,
            });

        if now.duration_since(state.last_error_at) > Duration::from_secs(RESET_AFTER_SECS) {
            state.current_delay = MIN_BACKOFF_SECS;
            state.error_count = 1;
        } else {
            state.error_count += 1;
            if state.error_count > 1 {
                state.current_delay = (state.current_delay * 2).min(MAX_BACKOFF_SECS);
            }
        }
        state.last_error_at = now;

        log::warn!(
            "[HTTP_RETRY] Error #{} for '{}', backoff: {}s",
            state.error_count,
            key,
            state.current_delay
        );
        state.current_delay
    }

    pub fn current_delay(&self, key: &str) -> Option<u64> {
        self.states.read().get(key).map(|s| s.current_delay)
    }

    /// Map a non-success HTTP status from `endpoint` onto a tool error.
    /// Throttling and transient gateway failures feed the backoff state.
    pub fn status_error(&self, tool: &str, endpoint: &str, status: u16, body: &str) -> ToolError {
        let snippet: String = body.chars().take(200).collect();
        match status {
            401 | 403 => ToolError::Authentication {
                tool: tool.to_string(),
                reason: format!("HTTP {}: {}", status, snippet),
            },
            429 => ToolError::RateLimit {
                tool: tool.to_string(),
                retry_after_secs: Some(self.record_error(endpoint)),
            },
            s if is_retryable_status(s) => {
                let wait = self.record_error(endpoint);
                ToolError::execution(
                    tool,
                    format!("HTTP {} (transient, retry after {}s): {}", s, wait, snippet),
                )
            }
            s => ToolError::execution(tool, format!("HTTP {}: {}", s, snippet)),
        }
    }

    /// Map a transport-level failure (connect, timeout, decode) onto a tool error
    pub fn transport_error(&self, tool: &str, endpoint: &str, err: &reqwest::Error) -> ToolError {
        if err.is_timeout() || err.is_connect() {
            let wait = self.record_error(endpoint);
            return ToolError::execution(
                tool,
                format!("{} (transient, retry after {}s)", err, wait),
            );
        }
        ToolError::execution(tool, err.to_string())
    }
}

impl Default for HttpRetryManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an HTTP status is typically transient
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 520..=524)
}

/// Backoff key for a URL: its host, or the raw string when it does not parse
pub fn endpoint_key(raw_url: &str) -> String {
    url::Url::parse(raw_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| raw_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let manager = HttpRetryManager::new();
        assert_eq!(manager.record_error("api"), 5);
        assert_eq!(manager.record_error("api"), 10);
        assert_eq!(manager.record_error("api"), 20);
        assert_eq!(manager.record_error("api"), 40);
        assert_eq!(manager.record_error("api"), 60);
        assert_eq!(manager.record_error("api"), 60);
    }

    #[test]
    fn test_success_resets_backoff() {
        let manager = HttpRetryManager::new();
        manager.record_error("api");
        manager.record_error("api");
        assert_eq!(manager.current_delay("api"), Some(10));

        manager.record_success("api");
        assert_eq!(manager.current_delay("api"), None);
        assert_eq!(manager.record_error("api"), 5);
    }

    #[test]
    fn test_status_mapping() {
        let manager = HttpRetryManager::new();
        assert!(matches!(
            manager.status_error("price_lookup", "host", 401, "bad key"),
            ToolError::Authentication { .. }
        ));
        assert_eq!(
            manager.status_error("price_lookup", "host", 429, ""),
            ToolError::RateLimit {
                tool: "price_lookup".to_string(),
                retry_after_secs: Some(5),
            }
        );
        assert!(matches!(
            manager.status_error("price_lookup", "host", 404, "missing"),
            ToolError::Execution { .. }
        ));
    }

    #[test]
    fn test_retryable_status_and_endpoint_key() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(522));
        assert!(!is_retryable_status(404));
        assert_eq!(
            endpoint_key("https://api.coingecko.com/api/v3/simple/price"),
            "api.coingecko.com"
        );
        assert_eq!(endpoint_key("not a url"), "not a url");
    }
}
