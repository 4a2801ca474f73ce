use thiserror::Error;

/// Failures of a [`CredentialStore`](crate::CredentialStore) backend.
///
/// Messages never include token values.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialStoreError {
    /// Reading or writing the backing file failed
    #[error("credential store I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The persisted document could not be decoded
    #[error("credential store at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The persisted document could not be encoded
    #[error("failed to encode credentials: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failures of the refresh exchange.
///
/// The coordinator swallows these into "no token" after clearing
/// credentials; they exist for logging and for direct [`TokenRefresher`]
/// callers.
///
/// [`TokenRefresher`]: crate::TokenRefresher
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RefreshError {
    /// Transport, timeout or status failure. Produced by
    /// [`format_http_error`](crate::format_http_error), never contains secrets.
    #[error("{0}")]
    Http(String),

    /// The exchange, response body included, outlived the refresh timeout
    #[error("token refresh timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The refresh endpoint answered 2xx with an unusable body
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    /// Persisting the new token pair failed
    #[error("failed to persist refreshed tokens: {0}")]
    Store(#[from] CredentialStoreError),
}

/// Invalid [`AuthClientConfig`](crate::AuthClientConfig).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthConfigError {
    #[error("auth config error: {0}")]
    Invalid(String),

    #[error("failed to build refresh client: {0}")]
    Http(String),
}
