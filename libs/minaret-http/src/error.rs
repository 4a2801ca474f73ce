use std::time::Duration;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a URL was rejected. The `reason` text next to it is for humans only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    ParseError,
    MissingAuthority,
    MissingScheme,
}

/// Everything that can go wrong between building a request and reading its
/// body.
///
/// Sending yields `Ok` for every HTTP status; [`HttpError::HttpStatus`] only
/// appears once a caller asks for a checked body or
/// [`error_for_status`](crate::HttpResponse::error_for_status).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// One attempt exceeded its budget.
    #[error("request attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Connect, I/O or protocol failure below HTTP.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),

    #[error("response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Non-2xx status. `body_preview` is at most
    /// [`ERROR_BODY_PREVIEW_LIMIT`](crate::ERROR_BODY_PREVIEW_LIMIT) bytes.
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: http::StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("form encoding failed: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    /// The concurrency limit or the buffer is full; nothing was sent.
    #[error("client overloaded: too many requests in flight")]
    Overloaded,

    /// The background worker of the client is gone.
    #[error("HTTP client is shut down")]
    ServiceClosed,

    #[error("invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// Scheme not permitted by the [`TransportSecurity`](crate::TransportSecurity) policy.
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout(_))
    }

    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        if let HttpError::HttpStatus { status, .. } = self {
            Some(*status)
        } else {
            None
        }
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}
