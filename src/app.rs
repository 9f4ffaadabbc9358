//! Process-wide explorer state: runtime config, request cache and settings.
//!
//! One `App` per process. List views borrow its cache and settings store, so
//! every list shares deduplication and the persisted page size.

use crate::cache::RequestCache;
use crate::config::Config;
use crate::error::ApiError;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::list_view::ListView;
use crate::pagination::{Pagination, PAGE_SIZE_KEY};
use crate::resources::{DetailRequest, Resource};
use crate::runtime_config::{config_source_for, RuntimeConfigCell};
use crate::settings::{FileStore, SettingsStore};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub struct App {
    config: Config,
    runtime: Arc<RuntimeConfigCell>,
    cache: Arc<RequestCache>,
    store: Arc<dyn SettingsStore>,
}

impl App {
    /// Wire the HTTP stack and the file-backed settings store from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let source = config
            .runtime_config_url
            .as_deref()
            .map(|loc| config_source_for(loc, timeout));
        let runtime = Arc::new(RuntimeConfigCell::new(source, config.api_base_url.clone()));

        let fetcher = HttpFetcher::new(runtime.clone())
            .with_timeout_ms(config.request_timeout_ms)
            .with_auth_token(config.api_auth_token.clone());

        let store = FileStore::open(&config.settings_path)
            .with_context(|| format!("Failed to open settings at {}", config.settings_path))?;

        Ok(Self::with_parts(config, runtime, Arc::new(fetcher), Arc::new(store)))
    }

    /// Assemble from explicit parts (custom fetchers, in-memory settings).
    pub fn with_parts(
        config: Config,
        runtime: Arc<RuntimeConfigCell>,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            config,
            runtime,
            cache: Arc::new(RequestCache::new(fetcher)),
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<RuntimeConfigCell> {
        &self.runtime
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// A list view for `resource`. A persisted page size that is no longer
    /// one of the configured choices is replaced by the default.
    pub fn list_view<T: DeserializeOwned>(&self, resource: Resource) -> ListView<T> {
        let defaults = resource
            .pagination_defaults()
            .with_page_size(self.config.default_page_size)
            .with_storage_key(PAGE_SIZE_KEY);
        let mut pagination = Pagination::new(resource.pagination_mode(), defaults, self.store.clone());
        if !self.config.allows_page_size(pagination.page_size()) {
            log::info!(
                "[app] persisted page size {} not allowed, using {}",
                pagination.page_size(),
                self.config.default_page_size
            );
            if let Err(e) = pagination.set_page_size(self.config.default_page_size) {
                log::warn!("[app] cannot apply default page size: {e}");
            }
        }
        ListView::with_pagination(resource, self.cache.clone(), pagination)
    }

    /// Fetch one record. Detail endpoints answer with the same envelope as
    /// lists; the first row is the record and an empty envelope is a 404.
    pub async fn detail(&self, detail: &DetailRequest) -> Result<Value, ApiError> {
        let req = detail.descriptor();
        let body: Value = self.cache.fetch_as(&req).await?;
        match body.get(detail.resource.items_key()) {
            Some(Value::Array(rows)) => rows.first().cloned().ok_or_else(|| ApiError::Status {
                status: 404,
                url: req.key().to_string(),
            }),
            _ => Ok(body),
        }
    }
}
