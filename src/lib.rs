//! scanx - list pagination and request caching for a blockchain explorer
//!
//! Every list page of the explorer (blocks, transactions, addresses, tokens,
//! events, NFTs, series, contracts, DAOs) runs on the same two pieces:
//!
//! - [`pagination::Pagination`]: page, page size, sort and the cursor map,
//!   producing the addressing params for the next request
//! - [`cache::RequestCache`]: deduplicated, revalidating fetches keyed by the
//!   canonical request key, with 404 kept apart from other failures
//!
//! [`list_view::ListView`] wires the two together for one resource and
//! [`app::App`] owns the process-wide pieces (runtime config, cache,
//! persisted settings).
//!
//! ## Usage
//!
//! ```bash
//! scanx list blocks --pages 2
//! scanx show addresses P2K... --with balance
//! ```

// Shared contracts
pub mod error;
pub mod models;
pub mod request;
pub mod resources;

// Configuration (CLI/env and runtime config.json)
pub mod config;
pub mod runtime_config;

// Request/cache layer
pub mod cache;
pub mod fetcher;

// Pagination state machine and persisted settings
pub mod pagination;
pub mod settings;

// Composition
pub mod app;
pub mod list_view;

// Re-export commonly used types
pub use app::App;
pub use cache::{FetchResult, FetchState, RequestCache};
pub use config::{Config, CliArgs};
pub use error::{classify_error, is_not_found_error, ApiError, ErrorKind};
pub use list_view::{ListOutcome, ListView};
pub use pagination::{OrderDirection, Pagination, PaginationError, PaginationMode};
pub use request::{RequestDescriptor, RequestKey};
pub use resources::{DetailRequest, Resource};
