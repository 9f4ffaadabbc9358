//! Pagination state for list views
//!
//! One [`Pagination`] per mounted list. It produces the addressing params for
//! the next request (offset or cursor, plus sort and limit) and evolves as
//! page data arrives.
//!
//! ## Modes
//!
//! - **Offset**: `offset = (page - 1) * page_size`, so any page can be
//!   requested directly.
//! - **Cursor**: the server hands out the cursor for page `n + 1` only after
//!   page `n` was fetched. Navigation is forward one page at a time (or back to
//!   any page already visited).
//!
//! ## Resets
//!
//! Changing page size, sort field or sort direction resets to page 1 with
//! `cursor_map = {1: None}` and `has_next = true`. Filter and search params
//! belong to the view, which must call [`Pagination::reset_pagination`]
//! itself when they change.
//!
//! ## Generations
//!
//! Every reset and every page change bumps a generation counter. A
//! [`PageRequest`] remembers the generation it was built under, and
//! [`Pagination::apply_page_data`] drops data from older generations, so a
//! slow superseded response cannot rewrite the cursor map.

use crate::request::RequestDescriptor;
use crate::settings::SettingsStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Default storage key for the persisted page size.
pub const PAGE_SIZE_KEY: &str = "scanx.page_size";

pub const DEFAULT_PAGE_SIZE: u32 = 25;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    Offset,
    Cursor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

impl std::str::FromStr for OrderDirection {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(OrderDirection::Asc),
            "desc" => Ok(OrderDirection::Desc),
            _ => Err(anyhow::anyhow!(
                "Invalid order direction '{s}'. Valid options: asc, desc"
            )),
        }
    }
}

impl std::fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected pagination changes. State is never modified when one of these is
/// returned.
///
/// `UnreachablePage` is the cursor-mode jump guard. Callers are expected to
/// ignore it: the jump simply does not happen and nothing is shown to the user.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page {requested} has no known cursor (furthest reachable page is {furthest})")]
    UnreachablePage { requested: u32, furthest: u32 },

    #[error("pages start at 1")]
    InvalidPage,

    #[error("page size must be positive")]
    InvalidPageSize,
}

impl PaginationError {
    /// True for the silent cursor-mode guard.
    pub fn is_guard_rejection(&self) -> bool {
        matches!(self, PaginationError::UnreachablePage { .. })
    }
}

/// How the current page is addressed on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageAddress {
    Offset(u64),
    /// `None` for page 1.
    Cursor(Option<String>),
}

/// Snapshot of everything needed to request the current page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub page: u32,
    pub page_size: u32,
    pub address: PageAddress,
    pub order_by: String,
    pub order_direction: OrderDirection,
}

impl PageRequest {
    /// Write `limit`, `offset`/`cursor`, `order_by` and `order_direction`.
    pub fn apply_to(&self, mut req: RequestDescriptor) -> RequestDescriptor {
        req.set("limit", self.page_size);
        match &self.address {
            PageAddress::Offset(offset) => {
                req.set("offset", *offset);
                req.remove("cursor");
            }
            PageAddress::Cursor(cursor) => {
                req.set("cursor", cursor.clone());
                req.remove("offset");
            }
        }
        req.set("order_by", self.order_by.as_str());
        req.set("order_direction", self.order_direction.as_str());
        req
    }
}

/// Initial values for a [`Pagination`].
#[derive(Clone, Debug)]
pub struct PaginationDefaults {
    pub page_size: u32,
    pub order_by: String,
    pub order_direction: OrderDirection,
    pub storage_key: String,
}

impl PaginationDefaults {
    pub fn new(order_by: impl Into<String>, order_direction: OrderDirection) -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            order_by: order_by.into(),
            order_direction,
            storage_key: PAGE_SIZE_KEY.to_string(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

pub struct Pagination {
    mode: PaginationMode,
    page: u32,
    page_size: u32,
    order_by: String,
    order_direction: OrderDirection,
    cursor_map: BTreeMap<u32, Option<String>>,
    has_next: bool,
    generation: u64,
    storage_key: String,
    store: Arc<dyn SettingsStore>,
}

impl std::fmt::Debug for Pagination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pagination")
            .field("mode", &self.mode)
            .field("page", &self.page)
            .field("page_size", &self.page_size)
            .field("order_by", &self.order_by)
            .field("order_direction", &self.order_direction)
            .field("cursor_map", &self.cursor_map)
            .field("has_next", &self.has_next)
            .field("generation", &self.generation)
            .finish()
    }
}

fn first_page_map() -> BTreeMap<u32, Option<String>> {
    BTreeMap::from([(1, None)])
}

impl Pagination {
    /// Create pagination state, reading the persisted page size from `store`.
    pub fn new(
        mode: PaginationMode,
        defaults: PaginationDefaults,
        store: Arc<dyn SettingsStore>,
    ) -> Self {
        let page_size = store
            .get(&defaults.storage_key)
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.page_size.max(1));

        Self {
            mode,
            page: 1,
            page_size,
            order_by: defaults.order_by,
            order_direction: defaults.order_direction,
            cursor_map: first_page_map(),
            has_next: true,
            generation: 0,
            storage_key: defaults.storage_key,
            store,
        }
    }

    pub fn mode(&self) -> PaginationMode {
        self.mode
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn order_by(&self) -> &str {
        &self.order_by
    }

    pub fn order_direction(&self) -> OrderDirection {
        self.order_direction
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cursor_map(&self) -> &BTreeMap<u32, Option<String>> {
        &self.cursor_map
    }

    /// Row offset of the current page. Only sent on the wire in Offset mode.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Cursor for the current page (`None` on page 1). Only meaningful in
    /// Cursor mode.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor_map.get(&self.page).and_then(|c| c.as_deref())
    }

    /// Highest page that `set_page` would currently accept in Cursor mode.
    pub fn furthest_reachable(&self) -> u32 {
        self.cursor_map.keys().next_back().copied().unwrap_or(1)
    }

    pub fn set_page(&mut self, page: u32) -> Result<(), PaginationError> {
        if page == 0 {
            return Err(PaginationError::InvalidPage);
        }
        if self.mode == PaginationMode::Cursor && !self.cursor_map.contains_key(&page) {
            let err = PaginationError::UnreachablePage {
                requested: page,
                furthest: self.furthest_reachable(),
            };
            log::debug!("[pagination] ignoring jump: {err}");
            return Err(err);
        }
        if page != self.page {
            self.page = page;
            self.generation += 1;
        }
        Ok(())
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Result<(), PaginationError> {
        if page_size == 0 {
            return Err(PaginationError::InvalidPageSize);
        }
        self.page_size = page_size;
        if let Err(e) = self.store.set(&self.storage_key, &page_size.to_string()) {
            log::warn!("[pagination] failed to persist page size {page_size}: {e:#}");
        }
        self.reset_pagination();
        Ok(())
    }

    pub fn set_order_by(&mut self, field: impl Into<String>) {
        self.order_by = field.into();
        self.reset_pagination();
    }

    pub fn set_order_direction(&mut self, direction: OrderDirection) {
        self.order_direction = direction;
        self.reset_pagination();
    }

    pub fn reset_pagination(&mut self) {
        self.page = 1;
        self.cursor_map = first_page_map();
        self.has_next = true;
        self.generation += 1;
    }

    /// Ingest the outcome of the fetch for the current page.
    ///
    /// Cursor mode stores `next_cursor` as the cursor of `page + 1` and drops
    /// every entry past it. An empty or missing cursor, or an empty page,
    /// leaves `page + 1` unreachable and `has_next` false.
    pub fn on_page_data(&mut self, next_cursor: Option<&str>, received: usize) {
        match self.mode {
            PaginationMode::Offset => {
                self.has_next = received >= self.page_size as usize;
            }
            PaginationMode::Cursor => {
                let page = self.page;
                self.cursor_map.retain(|p, _| *p <= page);
                let next = next_cursor.filter(|c| !c.is_empty() && received >= 1);
                if let Some(cursor) = next {
                    self.cursor_map.insert(page + 1, Some(cursor.to_string()));
                }
                self.has_next = next.is_some();
            }
        }
    }

    /// Generation-checked [`Pagination::on_page_data`]. Returns `false` and
    /// changes nothing when `req` was built before the latest reset or page
    /// change.
    pub fn apply_page_data(
        &mut self,
        req: &PageRequest,
        next_cursor: Option<&str>,
        received: usize,
    ) -> bool {
        if req.generation != self.generation {
            log::debug!(
                "[pagination] dropping stale page data (generation {} != {})",
                req.generation,
                self.generation
            );
            return false;
        }
        self.on_page_data(next_cursor, received);
        true
    }

    pub fn address(&self) -> PageAddress {
        match self.mode {
            PaginationMode::Offset => PageAddress::Offset(self.offset()),
            PaginationMode::Cursor => PageAddress::Cursor(self.cursor().map(str::to_string)),
        }
    }

    pub fn request(&self) -> PageRequest {
        PageRequest {
            generation: self.generation,
            page: self.page,
            page_size: self.page_size,
            address: self.address(),
            order_by: self.order_by.clone(),
            order_direction: self.order_direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStore;
    use quickcheck_macros::quickcheck;

    fn store() -> Arc<dyn SettingsStore> {
        Arc::new(MemoryStore::new())
    }

    fn offset_pager(page_size: u32) -> Pagination {
        Pagination::new(
            PaginationMode::Offset,
            PaginationDefaults::new("height", OrderDirection::Desc).with_page_size(page_size),
            store(),
        )
    }

    fn cursor_pager() -> Pagination {
        Pagination::new(
            PaginationMode::Cursor,
            PaginationDefaults::new("date", OrderDirection::Desc),
            store(),
        )
    }

    fn assert_reset(p: &Pagination) {
        assert_eq!(p.page(), 1);
        assert_eq!(p.cursor_map(), &BTreeMap::from([(1, None)]));
        assert!(p.has_next());
    }

    #[quickcheck]
    fn prop_offset_is_page_times_size(page: u16, size: u16) -> bool {
        let page = u32::from(page).max(1);
        let size = u32::from(size).max(1);
        let mut p = offset_pager(size);
        p.set_page(page).unwrap();
        p.offset() == u64::from(page - 1) * u64::from(size)
            && p.address() == PageAddress::Offset(p.offset())
    }

    #[test]
    fn test_initial_state() {
        let p = cursor_pager();
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(p.cursor(), None);
        assert!(p.has_next());
        assert_eq!(p.address(), PageAddress::Cursor(None));
    }

    #[test]
    fn test_offset_jumps_anywhere() {
        let mut p = offset_pager(25);
        p.set_page(7).unwrap();
        assert_eq!(p.offset(), 150);
        p.set_page(1).unwrap();
        assert_eq!(p.offset(), 0);
        assert_eq!(p.set_page(0), Err(PaginationError::InvalidPage));
        assert_eq!(p.page(), 1);
    }

    #[test]
    fn test_cursor_jump_without_data_is_rejected() {
        let mut p = cursor_pager();
        let before = p.request();
        let err = p.set_page(5).unwrap_err();
        assert!(err.is_guard_rejection());
        assert_eq!(
            err,
            PaginationError::UnreachablePage {
                requested: 5,
                furthest: 1
            }
        );
        assert_eq!(p.request(), before);
    }

    #[test]
    fn test_cursor_forward_then_back() {
        let mut p = cursor_pager();
        p.on_page_data(Some("c2"), 25);
        p.set_page(2).unwrap();
        p.on_page_data(Some("c3"), 25);
        p.set_page(3).unwrap();
        assert_eq!(p.cursor(), Some("c3"));

        p.set_page(1).unwrap();
        assert_eq!(p.cursor(), None);
        // Page 2 is still known, page 4 never was.
        p.set_page(2).unwrap();
        assert_eq!(p.cursor(), Some("c2"));
        assert!(p.set_page(4).is_err());
    }

    #[test]
    fn test_cursor_data_prunes_stale_chain() {
        let mut p = cursor_pager();
        p.on_page_data(Some("c2"), 25);
        p.set_page(2).unwrap();
        p.on_page_data(Some("c3"), 25);
        p.set_page(3).unwrap();
        p.on_page_data(Some("c4"), 25);
        assert_eq!(p.furthest_reachable(), 4);

        // Revisiting page 1 and receiving a different cursor drops 3 and 4.
        p.set_page(1).unwrap();
        p.on_page_data(Some("c2b"), 25);
        assert_eq!(
            p.cursor_map(),
            &BTreeMap::from([(1, None), (2, Some("c2b".to_string()))])
        );
        assert!(p.set_page(3).is_err());
    }

    #[test]
    fn test_reset_after_page_size_change() {
        let mut p = cursor_pager();
        p.on_page_data(Some("c2"), 25);
        p.set_page(2).unwrap();
        p.on_page_data(None, 3);
        assert!(!p.has_next());

        p.set_page_size(50).unwrap();
        assert_reset(&p);
        assert_eq!(p.page_size(), 50);
        assert_eq!(p.set_page_size(0), Err(PaginationError::InvalidPageSize));
        assert_eq!(p.page_size(), 50);
    }

    #[test]
    fn test_reset_after_sort_changes() {
        let mut p = offset_pager(25);
        p.set_page(4).unwrap();
        p.on_page_data(None, 3);
        p.set_order_by("hash");
        assert_reset(&p);
        assert_eq!(p.order_by(), "hash");

        p.set_page(4).unwrap();
        p.on_page_data(None, 3);
        p.set_order_direction(OrderDirection::Asc);
        assert_reset(&p);
        assert_eq!(p.order_direction(), OrderDirection::Asc);
    }

    #[test]
    fn test_has_next_offset_mode() {
        let mut p = offset_pager(25);
        p.on_page_data(None, 25);
        assert!(p.has_next());
        p.on_page_data(None, 10);
        assert!(!p.has_next());
    }

    #[test]
    fn test_has_next_cursor_mode() {
        let mut p = cursor_pager();
        p.on_page_data(Some("abc123"), 25);
        assert!(p.has_next());
        assert_eq!(p.cursor_map().get(&2), Some(&Some("abc123".to_string())));

        p.on_page_data(None, 0);
        assert!(!p.has_next());
        assert!(!p.cursor_map().contains_key(&2));

        // A cursor on an empty page does not open a next page.
        p.on_page_data(Some("zzz"), 0);
        assert!(!p.has_next());
        p.on_page_data(Some(""), 10);
        assert!(!p.has_next());
    }

    #[test]
    fn test_offset_scenario() {
        let mut p = offset_pager(25);
        p.on_page_data(None, 25);
        assert!(p.has_next());
        p.set_page(2).unwrap();
        assert_eq!(p.offset(), 25);
        p.on_page_data(None, 12);
        assert!(!p.has_next());
        p.set_page(3).unwrap();
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn test_cursor_scenario() {
        let mut p = cursor_pager();
        assert_eq!((p.page(), p.cursor()), (1, None));
        p.on_page_data(Some("tok_a"), 25);
        assert!(p.has_next());
        assert_eq!(
            p.cursor_map(),
            &BTreeMap::from([(1, None), (2, Some("tok_a".to_string()))])
        );
        p.set_page(2).unwrap();
        assert_eq!(p.cursor(), Some("tok_a"));
        p.on_page_data(None, 3);
        assert!(!p.has_next());
        assert!(p.set_page(3).is_err());
        assert_eq!(p.page(), 2);
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let mut p = cursor_pager();
        let stale = p.request();
        p.set_order_by("height");
        assert!(!p.apply_page_data(&stale, Some("old"), 25));
        assert_eq!(p.cursor_map(), &BTreeMap::from([(1, None)]));

        let fresh = p.request();
        assert!(p.apply_page_data(&fresh, Some("new"), 25));
        assert_eq!(p.cursor_map().get(&2), Some(&Some("new".to_string())));
    }

    #[test]
    fn test_page_size_is_persisted() {
        let shared = store();
        let defaults = PaginationDefaults::new("height", OrderDirection::Desc);

        let mut p = Pagination::new(PaginationMode::Offset, defaults.clone(), shared.clone());
        p.set_page_size(100).unwrap();
        assert_eq!(shared.get(PAGE_SIZE_KEY).as_deref(), Some("100"));

        let p2 = Pagination::new(PaginationMode::Cursor, defaults, shared);
        assert_eq!(p2.page_size(), 100);
    }

    #[test]
    fn test_bad_persisted_value_falls_back() {
        let shared = store();
        shared.set(PAGE_SIZE_KEY, "zero").unwrap();
        let p = Pagination::new(
            PaginationMode::Offset,
            PaginationDefaults::new("height", OrderDirection::Desc).with_page_size(10),
            shared,
        );
        assert_eq!(p.page_size(), 10);
    }

    #[test]
    fn test_request_params() {
        let mut p = offset_pager(25);
        p.set_page(3).unwrap();
        let req = p
            .request()
            .apply_to(RequestDescriptor::new("blocks").param("q", "abc"));
        assert_eq!(
            req.path(),
            "blocks?limit=25&offset=50&order_by=height&order_direction=desc&q=abc"
        );

        let c = cursor_pager();
        let req = c.request().apply_to(RequestDescriptor::new("events"));
        assert_eq!(
            req.path(),
            "events?limit=25&order_by=date&order_direction=desc"
        );
    }
}
