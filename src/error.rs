//! Request error taxonomy
//!
//! Every failure on the fetch path becomes an [`ApiError`]. Views only need
//! one distinction: "not found" (HTTP 404) versus everything else. Errors are
//! `Clone` because a single deduplicated request may be observed by several
//! callers.

use thiserror::Error;

/// How a view should present a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 404: the resource does not exist.
    NotFound,
    /// Any other non-2xx status, network failure, timeout or bad payload.
    RequestFailed,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("http {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("invalid json from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            ApiError::Status { url, .. }
            | ApiError::Timeout { url, .. }
            | ApiError::Network { url, .. }
            | ApiError::Decode { url, .. } => url,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        if self.is_not_found() {
            ErrorKind::NotFound
        } else {
            ErrorKind::RequestFailed
        }
    }

    /// Short user-facing message; "not found" reads differently from "failed".
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "not found",
            ErrorKind::RequestFailed => "failed to load",
        }
    }
}

/// Classify an erased error. Anything that is not an [`ApiError`] is a
/// generic failure.
pub fn classify_error(err: &anyhow::Error) -> ErrorKind {
    err.downcast_ref::<ApiError>()
        .map(ApiError::kind)
        .unwrap_or(ErrorKind::RequestFailed)
}

#[inline]
pub fn is_not_found_error(err: &anyhow::Error) -> bool {
    classify_error(err) == ErrorKind::NotFound
}
