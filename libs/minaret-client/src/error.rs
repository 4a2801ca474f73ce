use minaret_auth::{AuthConfigError, CredentialStoreError};
use minaret_http::HttpError;
use thiserror::Error;

/// Errors of the typed backend API and the session manager.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Transport failure or non-2xx answer from the backend
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Reading or writing stored credentials failed
    #[error(transparent)]
    Store(#[from] CredentialStoreError),

    /// Invalid client configuration or URL
    #[error(transparent)]
    Config(#[from] AuthConfigError),

    /// A 2xx body that does not have the expected shape
    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Input rejected before anything was sent
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// HTTP status of a backend rejection, if this is one.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            ApiError::Http(e) => e.status(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(http::StatusCode::UNAUTHORIZED)
    }

    /// Human-readable `message` of a JSON error body.
    ///
    /// Validation failures may carry a list of messages; they are joined
    /// with `"; "`.
    #[must_use]
    pub fn server_message(&self) -> Option<String> {
        let ApiError::Http(HttpError::HttpStatus { body_preview, .. }) = self else {
            return None;
        };
        let body: serde_json::Value = serde_json::from_str(body_preview).ok()?;
        match body.get("message")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let parts: Vec<&str> = items.iter().filter_map(serde_json::Value::as_str).collect();
                (!parts.is_empty()).then(|| parts.join("; "))
            }
            _ => None,
        }
    }
}
