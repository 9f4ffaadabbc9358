//! Runtime configuration (`config.json`)
//!
//! Loaded once per process and shared. The first caller of
//! [`RuntimeConfigCell::get`] starts the load, concurrent callers await the
//! same shared future, and everyone after that reads the memoized result.
//! A failed load is memoized too, as a config carrying the fallback base URL.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api-explorer.phantasma.info/api/v1";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub api_base_url: String,
    /// Feature flags and any other environment settings.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuntimeConfig {
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            extra: Map::new(),
        }
    }

    /// Boolean flag from the extra settings; missing or non-boolean is `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.extra.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<RuntimeConfig>;

    /// Where the config comes from, for logs.
    fn describe(&self) -> String;
}

pub struct HttpConfigSource {
    url: String,
    timeout: Duration,
}

impl HttpConfigSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn fetch(&self) -> Result<RuntimeConfig> {
        let response = crate::fetcher::http_client()
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch {}: {}", self.url, e))?;

        if !response.status().is_success() {
            return Err(anyhow!("config fetch {} returned {}", self.url, response.status()));
        }

        response
            .json::<RuntimeConfig>()
            .await
            .map_err(|e| anyhow!("Failed to parse {}: {}", self.url, e))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn fetch(&self) -> Result<RuntimeConfig> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pick a source by scheme: `http(s)://` is fetched, anything else is a path.
pub fn config_source_for(location: &str, timeout: Duration) -> Arc<dyn ConfigSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(HttpConfigSource::new(location, timeout))
    } else {
        Arc::new(FileConfigSource::new(location))
    }
}

#[derive(Clone)]
struct LoadOutcome {
    config: Arc<RuntimeConfig>,
    error: Option<String>,
}

type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

enum LoadState {
    NotLoaded,
    Loading(SharedLoad),
    Loaded(Arc<RuntimeConfig>),
    Failed {
        fallback: Arc<RuntimeConfig>,
        reason: String,
    },
}

/// Coarse view of the load state, for status displays and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    NotLoaded,
    Loading,
    Loaded,
    Failed(String),
}

pub struct RuntimeConfigCell {
    source: Option<Arc<dyn ConfigSource>>,
    fallback_base_url: String,
    state: Mutex<LoadState>,
}

impl RuntimeConfigCell {
    /// `source == None` means there is no config.json to fetch; the first
    /// `get` settles on the fallback without any I/O.
    pub fn new(source: Option<Arc<dyn ConfigSource>>, fallback_base_url: impl Into<String>) -> Self {
        Self {
            source,
            fallback_base_url: fallback_base_url.into(),
            state: Mutex::new(LoadState::NotLoaded),
        }
    }

    /// A cell that is already `Loaded`; nothing is ever fetched.
    pub fn preloaded(config: RuntimeConfig) -> Self {
        let fallback = config.api_base_url.clone();
        Self {
            source: None,
            fallback_base_url: fallback,
            state: Mutex::new(LoadState::Loaded(Arc::new(config))),
        }
    }

    pub fn status(&self) -> LoadStatus {
        match self.state.lock() {
            Ok(state) => match &*state {
                LoadState::NotLoaded => LoadStatus::NotLoaded,
                LoadState::Loading(_) => LoadStatus::Loading,
                LoadState::Loaded(_) => LoadStatus::Loaded,
                LoadState::Failed { reason, .. } => LoadStatus::Failed(reason.clone()),
            },
            Err(_) => LoadStatus::NotLoaded,
        }
    }

    /// Forget whatever was loaded; the next `get` loads again.
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = LoadState::NotLoaded;
        }
    }

    pub async fn get(&self) -> Arc<RuntimeConfig> {
        let load = {
            let mut state = match self.state.lock() {
                Ok(s) => s,
                Err(poisoned) => poisoned.into_inner(),
            };
            match &*state {
                LoadState::Loaded(config) => return config.clone(),
                LoadState::Failed { fallback, .. } => return fallback.clone(),
                LoadState::Loading(load) => load.clone(),
                LoadState::NotLoaded => {
                    let load = self.start_load();
                    *state = LoadState::Loading(load.clone());
                    load
                }
            }
        };

        let outcome = load.clone().await;

        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Only settle the load we awaited; a reset in between wins.
        if let LoadState::Loading(current) = &*state {
            if current.ptr_eq(&load) {
                *state = match &outcome.error {
                    None => LoadState::Loaded(outcome.config.clone()),
                    Some(reason) => LoadState::Failed {
                        fallback: outcome.config.clone(),
                        reason: reason.clone(),
                    },
                };
            }
        }
        outcome.config
    }

    fn start_load(&self) -> SharedLoad {
        let source = self.source.clone();
        let fallback = self.fallback_base_url.clone();
        async move {
            let Some(source) = source else {
                log::info!("[runtime_config] no config source, using {fallback}");
                return LoadOutcome {
                    config: Arc::new(RuntimeConfig::with_base_url(fallback)),
                    error: None,
                };
            };
            log::info!("[runtime_config] loading {}", source.describe());
            match source.fetch().await {
                Ok(config) => {
                    log::info!("[runtime_config] api base url {}", config.api_base_url);
                    LoadOutcome {
                        config: Arc::new(config),
                        error: None,
                    }
                }
                Err(e) => {
                    log::warn!(
                        "[runtime_config] load failed, falling back to {fallback}: {e:#}"
                    );
                    LoadOutcome {
                        config: Arc::new(RuntimeConfig::with_base_url(fallback)),
                        error: Some(format!("{e:#}")),
                    }
                }
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_with_flags() {
        let c: RuntimeConfig = serde_json::from_str(
            r#"{"apiBaseUrl": "https://api.example/v1", "showNfts": true, "network": "mainnet"}"#,
        )
        .unwrap();
        assert_eq!(c.api_base_url, "https://api.example/v1");
        assert!(c.flag("showNfts"));
        assert!(!c.flag("network"));
        assert!(!c.flag("missing"));
    }

    #[tokio::test]
    async fn test_no_source_uses_fallback_without_failing() {
        let cell = RuntimeConfigCell::new(None, "https://fallback.example");
        assert_eq!(cell.status(), LoadStatus::NotLoaded);
        assert_eq!(cell.get().await.api_base_url, "https://fallback.example");
        assert_eq!(cell.status(), LoadStatus::Loaded);
    }

    #[tokio::test]
    async fn test_preloaded() {
        let cell = RuntimeConfigCell::preloaded(RuntimeConfig::with_base_url("http://x"));
        assert_eq!(cell.status(), LoadStatus::Loaded);
        assert_eq!(cell.get().await.api_base_url, "http://x");
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_and_is_memoized() {
        let cell = RuntimeConfigCell::new(
            Some(config_source_for(
                "/definitely/not/here/config.json",
                Duration::from_secs(1),
            )),
            DEFAULT_API_BASE_URL,
        );
        assert_eq!(cell.get().await.api_base_url, DEFAULT_API_BASE_URL);
        assert!(matches!(cell.status(), LoadStatus::Failed(_)));

        cell.reset();
        assert_eq!(cell.status(), LoadStatus::NotLoaded);
    }
}
