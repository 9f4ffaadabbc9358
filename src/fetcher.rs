//! HTTP fetcher for the explorer REST API
//!
//! Relative paths are resolved against the runtime API base URL; absolute
//! URLs pass through. Every request carries a timeout. Failures are mapped
//! onto [`ApiError`] and never retried here: a transient failure should reach
//! the view, not be papered over with stale partial list data.

use crate::error::ApiError;
use crate::runtime_config::RuntimeConfigCell;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

pub(crate) fn http_client() -> &'static reqwest::Client {
    HTTP.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .user_agent(concat!("scanx/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client")
    })
}

/// Source of JSON for a relative API path. The cache only talks to this.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_json(&self, path: &str) -> Result<Value, ApiError>;
}

#[inline]
pub fn is_absolute_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Join `path` onto `base` with exactly one `/` between them, unless `path`
/// is already absolute.
pub fn join_url(base: &str, path: &str) -> String {
    if is_absolute_url(path) {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

pub struct HttpFetcher {
    runtime: Arc<RuntimeConfigCell>,
    timeout_ms: u64,
    auth_token: Option<String>,
}

impl HttpFetcher {
    pub fn new(runtime: Arc<RuntimeConfigCell>) -> Self {
        Self {
            runtime,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auth_token: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Absolute URL for `path`. Loads the runtime config on first use.
    pub async fn resolve_url(&self, path: &str) -> String {
        if is_absolute_url(path) {
            return path.to_string();
        }
        let config = self.runtime.get().await;
        join_url(&config.api_base_url, path)
    }

    fn classify_send_error(&self, url: &str, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout_ms,
            }
        } else if e.is_decode() || e.is_body() {
            ApiError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            }
        } else {
            ApiError::Network {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.resolve_url(path).await;
        log::debug!("[fetcher] GET {url}");

        let mut request = http_client()
            .get(&url)
            .header("Accept", "application/json")
            .timeout(Duration::from_millis(self.timeout_ms));

        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify_send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            log::info!("[fetcher] {url} -> {status}");
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify_send_error(&url, e))?;

        serde_json::from_slice::<Value>(&body).map_err(|e| ApiError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_config::RuntimeConfig;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.b/api/v1", "blocks"), "https://a.b/api/v1/blocks");
        assert_eq!(join_url("https://a.b/api/v1/", "/blocks"), "https://a.b/api/v1/blocks");
        assert_eq!(join_url("https://a.b/api/v1", ""), "https://a.b/api/v1");
        assert_eq!(
            join_url("https://a.b/api/v1", "http://other/x?y=1"),
            "http://other/x?y=1"
        );
    }

    #[tokio::test]
    async fn test_resolve_url_uses_runtime_base() {
        let runtime = Arc::new(RuntimeConfigCell::preloaded(RuntimeConfig::with_base_url(
            "https://api.example/v1/",
        )));
        let fetcher = HttpFetcher::new(runtime);
        assert_eq!(
            fetcher.resolve_url("tokens?limit=10").await,
            "https://api.example/v1/tokens?limit=10"
        );
        assert_eq!(
            fetcher.resolve_url("https://elsewhere/x").await,
            "https://elsewhere/x"
        );
    }

    #[test]
    fn test_builder_options() {
        let runtime = Arc::new(RuntimeConfigCell::new(None, "http://x"));
        let f = HttpFetcher::new(runtime)
            .with_timeout_ms(2_000)
            .with_auth_token(Some(String::new()));
        assert_eq!(f.timeout_ms(), 2_000);
        assert!(f.auth_token.is_none());
    }
}
