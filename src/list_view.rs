//! A paginated list for one resource
//!
//! Wires a [`Pagination`] to the shared [`RequestCache`]: the view owns the
//! filter and search params, builds the request for the current page, and
//! feeds page data back only if no reset or page change happened while the
//! request was in flight.

use crate::cache::{FetchResult, RequestCache};
use crate::error::ApiError;
use crate::models::ListPage;
use crate::pagination::{OrderDirection, PageRequest, Pagination, PaginationError};
use crate::request::{ParamValue, RequestDescriptor};
use crate::resources::Resource;
use crate::settings::SettingsStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Result of loading the current page.
#[derive(Clone, Debug, PartialEq)]
pub struct ListOutcome<T> {
    pub page: u32,
    pub rows: Vec<T>,
    pub has_next: bool,
    pub total_results: Option<u64>,
    /// API error message embedded in an otherwise successful response.
    pub api_error: Option<String>,
    /// The view changed while the request was in flight; pagination was
    /// left untouched and these rows should not be rendered.
    pub stale: bool,
}

pub struct ListView<T> {
    resource: Resource,
    pagination: Pagination,
    filters: BTreeMap<String, ParamValue>,
    cache: Arc<RequestCache>,
    _rows: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> ListView<T> {
    pub fn new(resource: Resource, cache: Arc<RequestCache>, store: Arc<dyn SettingsStore>) -> Self {
        Self::with_pagination(
            resource,
            cache,
            Pagination::new(
                resource.pagination_mode(),
                resource.pagination_defaults(),
                store,
            ),
        )
    }

    pub fn with_pagination(resource: Resource, cache: Arc<RequestCache>, pagination: Pagination) -> Self {
        Self {
            resource,
            pagination,
            filters: BTreeMap::new(),
            cache,
            _rows: PhantomData,
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn pagination_mut(&mut self) -> &mut Pagination {
        &mut self.pagination
    }

    /// Set a resource filter (`address`, `block_height`, `symbol`, ...).
    /// Changing the scope restarts pagination.
    pub fn set_filter(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        if self.filters.get(&key) != Some(&value) {
            self.filters.insert(key, value);
            self.pagination.reset_pagination();
        }
    }

    pub fn clear_filter(&mut self, key: &str) {
        if self.filters.remove(key).is_some() {
            self.pagination.reset_pagination();
        }
    }

    /// Free-text search (`q`); empty text clears it.
    pub fn search(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.clear_filter("q");
        } else {
            self.set_filter("q", text);
        }
    }

    pub fn set_order(&mut self, field: Option<&str>, direction: Option<OrderDirection>) {
        if let Some(field) = field {
            self.pagination.set_order_by(field);
        }
        if let Some(direction) = direction {
            self.pagination.set_order_direction(direction);
        }
    }

    pub fn current_request(&self) -> (RequestDescriptor, PageRequest) {
        let page = self.pagination.request();
        let mut req = self.resource.list_request();
        for (key, value) in &self.filters {
            req.set(key.as_str(), value.clone());
        }
        (page.apply_to(req), page)
    }

    /// Advance one page. Returns `false` if there is no next page or the
    /// cursor for it is not known yet.
    pub fn next_page(&mut self) -> bool {
        if !self.pagination.has_next() {
            return false;
        }
        match self.pagination.page().checked_add(1) {
            Some(target) => self.goto(target),
            None => false,
        }
    }

    pub fn prev_page(&mut self) -> bool {
        match self.pagination.page() {
            1 => false,
            page => self.goto(page - 1),
        }
    }

    /// Jump to `page`. Unreachable cursor pages are ignored.
    pub fn goto(&mut self, page: u32) -> bool {
        match self.pagination.set_page(page) {
            Ok(()) => true,
            Err(PaginationError::UnreachablePage { .. }) => false,
            Err(e) => {
                log::debug!("[list] {} goto {page}: {e}", self.resource);
                false
            }
        }
    }

    /// Decode a fetch result for `page_req` and apply its page data if the
    /// request is still the current one. Split from [`ListView::load`] so an
    /// event loop can fetch in the background and apply the result later.
    pub fn apply(
        &mut self,
        req: &RequestDescriptor,
        page_req: &PageRequest,
        result: FetchResult<Value>,
    ) -> Result<ListOutcome<T>, ApiError> {
        let data = match (result.error, result.data) {
            (Some(e), _) => return Err(e),
            (None, Some(data)) => data,
            (None, None) => {
                return Err(ApiError::Network {
                    url: req.key().to_string(),
                    message: "no data".into(),
                })
            }
        };

        let list: ListPage<T> = ListPage::from_value(&data, self.resource.items_key())
            .map_err(|e| ApiError::Decode {
                url: req.key().to_string(),
                message: e.to_string(),
            })?;

        let applied = self.pagination.apply_page_data(
            page_req,
            list.next_cursor.as_deref(),
            list.items.len(),
        );
        if !applied {
            log::debug!("[list] {} dropped stale page {}", self.resource, page_req.page);
        }

        Ok(ListOutcome {
            page: page_req.page,
            rows: list.items,
            has_next: self.pagination.has_next(),
            total_results: list.total_results,
            api_error: list.error,
            stale: !applied,
        })
    }

    /// Fetch the current page through the cache and apply it.
    pub async fn load(&mut self) -> Result<ListOutcome<T>, ApiError> {
        let (req, page_req) = self.current_request();
        let result = self.cache.fetch(&req).await;
        self.apply(&req, &page_req, result)
    }

    /// Refetch the current page, bypassing the cached result.
    pub async fn reload(&mut self) -> Result<ListOutcome<T>, ApiError> {
        let (req, page_req) = self.current_request();
        let result = self.cache.revalidate(&req).await;
        self.apply(&req, &page_req, result)
    }
}
