//! Request cache keyed by [`RequestKey`]
//!
//! - At most one request in flight per key; concurrent callers share it
//! - Arriving at a key revalidates it. Cached data is returned immediately
//!   and refreshed in the background; a cached error is refetched and the
//!   caller waits for the new outcome. Nothing refreshes on a timer or
//!   retries on its own
//! - Revalidation keeps the previous data visible; a failed revalidation
//!   records the error next to the stale data
//! - Different keys never share a slot, so a slow response for an old key
//!   cannot overwrite a newer key's result
//!
//! Background revalidation runs on `tokio::spawn`, so [`RequestCache::fetch`]
//! must be polled inside a tokio runtime.

use crate::error::ApiError;
use crate::fetcher::Fetcher;
use crate::request::{RequestDescriptor, RequestKey};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type FetchOutcome = Result<Arc<Value>, ApiError>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;
type SlotMap = HashMap<RequestKey, Slot>;

/// What a view renders for one key.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchResult<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    /// True only while neither data nor error is known for the key.
    pub loading: bool,
}

impl<T> FetchResult<T> {
    fn idle() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.error.as_ref().is_some_and(ApiError::is_not_found)
    }
}

/// Per-key request lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Loading,
    Success,
    Failed,
}

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct Slot {
    data: Option<Arc<Value>>,
    error: Option<ApiError>,
    in_flight: Option<InFlight>,
}

impl Slot {
    fn is_settled(&self) -> bool {
        self.data.is_some() || self.error.is_some()
    }

    /// Data from the last successful fetch, with no failure recorded since.
    fn has_fresh_data(&self) -> bool {
        self.data.is_some() && self.error.is_none()
    }

    fn result(&self) -> FetchResult<Value> {
        FetchResult {
            data: self.data.clone(),
            error: self.error.clone(),
            loading: !self.is_settled() && self.in_flight.is_some(),
        }
    }

    fn state(&self) -> FetchState {
        match (&self.error, &self.data, &self.in_flight) {
            (Some(_), _, _) => FetchState::Failed,
            (None, Some(_), _) => FetchState::Success,
            (None, None, Some(_)) => FetchState::Loading,
            (None, None, None) => FetchState::Idle,
        }
    }
}

fn lock(slots: &Mutex<SlotMap>) -> MutexGuard<'_, SlotMap> {
    match slots.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// What `run` does once the slot lock is released.
enum Step {
    Answer {
        result: FetchResult<Value>,
        background: Option<(u64, SharedFetch)>,
    },
    Wait(u64, SharedFetch),
}

pub struct RequestCache {
    fetcher: Arc<dyn Fetcher>,
    slots: Arc<Mutex<SlotMap>>,
    next_id: AtomicU64,
}

impl RequestCache {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn slots(&self) -> MutexGuard<'_, SlotMap> {
        lock(&self.slots)
    }

    /// Result for `req`, revalidating the key.
    ///
    /// - Nothing cached: fetch (or join the fetch in flight) and wait
    /// - Data cached: return it now and refresh in the background
    /// - Error cached: refetch and wait, so navigating back to a failed key
    ///   recovers from a transient failure
    pub async fn fetch(&self, req: &RequestDescriptor) -> FetchResult<Value> {
        self.run(req, false).await
    }

    /// Fetch `req` again even if a result is cached (joins a request already
    /// in flight). This is the explicit refetch for "retry" actions.
    pub async fn revalidate(&self, req: &RequestDescriptor) -> FetchResult<Value> {
        self.run(req, true).await
    }

    /// Fetch and decode into `T`. An error recorded for the key wins over
    /// stale data.
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        req: &RequestDescriptor,
    ) -> Result<T, ApiError> {
        let result = self.fetch(req).await;
        let key = req.key();
        match (result.error, result.data) {
            (Some(e), _) => Err(e),
            (None, Some(data)) => T::deserialize(&*data).map_err(|e| ApiError::Decode {
                url: key.to_string(),
                message: e.to_string(),
            }),
            (None, None) => Err(ApiError::Network {
                url: key.to_string(),
                message: "request evicted before it settled".into(),
            }),
        }
    }

    async fn run(&self, req: &RequestDescriptor, force: bool) -> FetchResult<Value> {
        let key = req.key();
        let mut force = force;
        loop {
            let step = {
                let mut slots = self.slots();
                let slot = slots.entry(key.clone()).or_default();
                if !force && slot.has_fresh_data() {
                    let background = match &slot.in_flight {
                        Some(_) => None,
                        None => {
                            log::debug!("[cache] hit {key}, revalidating");
                            Some(self.begin(slot, req))
                        }
                    };
                    Step::Answer {
                        result: slot.result(),
                        background,
                    }
                } else if let Some(in_flight) = &slot.in_flight {
                    log::debug!("[cache] join {key}");
                    Step::Wait(in_flight.id, in_flight.fetch.clone())
                } else {
                    log::debug!("[cache] fetch {key}");
                    let (id, fetch) = self.begin(slot, req);
                    Step::Wait(id, fetch)
                }
            };

            let (id, fetch) = match step {
                Step::Answer { result, background } => {
                    if let Some((id, fetch)) = background {
                        let slots = self.slots.clone();
                        let key = key.clone();
                        tokio::spawn(async move {
                            let outcome = fetch.await;
                            settle(&slots, &key, id, outcome);
                        });
                    }
                    return result;
                }
                Step::Wait(id, fetch) => (id, fetch),
            };

            let outcome = fetch.await;
            let result = settle(&self.slots, &key, id, outcome);
            if !result.loading {
                return result;
            }
            // Superseded by a newer revalidation that has not settled yet.
            force = false;
        }
    }

    /// Register a new in-flight fetch for `slot`.
    fn begin(&self, slot: &mut Slot, req: &RequestDescriptor) -> (u64, SharedFetch) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fetcher = self.fetcher.clone();
        let path = req.path();
        let fetch = async move { fetcher.fetch_json(&path).await.map(Arc::new) }
            .boxed()
            .shared();
        slot.in_flight = Some(InFlight {
            id,
            fetch: fetch.clone(),
        });
        (id, fetch)
    }

    /// Current result for `key` without triggering any I/O.
    pub fn snapshot(&self, key: &RequestKey) -> FetchResult<Value> {
        self.slots()
            .get(key)
            .map(Slot::result)
            .unwrap_or_else(FetchResult::idle)
    }

    pub fn state(&self, key: &RequestKey) -> FetchState {
        self.slots()
            .get(key)
            .map(Slot::state)
            .unwrap_or(FetchState::Idle)
    }

    /// Replace the cached data for `key` (clearing any error), or evict the
    /// key with `None`. A request in flight for the key is detached and its
    /// result will not be cached.
    pub fn mutate(&self, key: &RequestKey, data: Option<Value>) {
        let mut slots = self.slots();
        match data {
            Some(value) => {
                let slot = slots.entry(key.clone()).or_default();
                slot.data = Some(Arc::new(value));
                slot.error = None;
                slot.in_flight = None;
            }
            None => {
                slots.remove(key);
            }
        }
    }

    /// Drop every cached result for `endpoint`, so dependent lists refetch.
    /// Returns how many keys were invalidated.
    pub fn invalidate_endpoint(&self, endpoint: &str) -> usize {
        let endpoint = endpoint.trim_matches('/');
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|key, _| key.endpoint() != endpoint);
        let removed = before - slots.len();
        if removed > 0 {
            log::debug!("[cache] invalidated {removed} keys for {endpoint}");
        }
        removed
    }

    pub fn clear(&self) {
        self.slots().clear();
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Record `outcome` for `key` if fetch `id` is still the one in flight.
/// Settling twice, or after the slot moved on, changes nothing.
fn settle(
    slots: &Mutex<SlotMap>,
    key: &RequestKey,
    id: u64,
    outcome: FetchOutcome,
) -> FetchResult<Value> {
    let mut slots = lock(slots);
    let Some(slot) = slots.get_mut(key) else {
        // Evicted while in flight: hand the outcome to the caller, cache nothing.
        return match outcome {
            Ok(data) => FetchResult {
                data: Some(data),
                error: None,
                loading: false,
            },
            Err(error) => FetchResult {
                data: None,
                error: Some(error),
                loading: false,
            },
        };
    };

    if slot.in_flight.as_ref().map(|f| f.id) == Some(id) {
        slot.in_flight = None;
        match outcome {
            Ok(data) => {
                slot.data = Some(data);
                slot.error = None;
            }
            Err(error) => {
                log::info!("[cache] {key} failed: {error}");
                slot.error = Some(error);
            }
        }
    }
    slot.result()
}
