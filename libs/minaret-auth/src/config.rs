use std::fmt;
use std::time::Duration;

use url::Url;

use crate::endpoints::AuthEndpoints;
use crate::error::AuthConfigError;

/// Default timeout of the refresh exchange
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of the session auth pipeline and its refresh client.
///
/// `Debug` redacts the values of [`extra_headers`](Self::extra_headers).
#[derive(Clone)]
pub struct AuthClientConfig {
    /// API base URL. The refresh URL is this plus the refresh path.
    pub base_url: Option<Url>,

    /// Refresh and primary-auth path classification.
    pub endpoints: AuthEndpoints,

    /// Timeout of a single refresh exchange (default: 10 s).
    pub refresh_timeout: Duration,

    /// Extra headers attached to every refresh request (API keys, tenant ids).
    pub extra_headers: Vec<(String, String)>,

    /// Override for the refresh client's HTTP configuration.
    /// When `None`,
    /// [`HttpClientConfig::refresh_endpoint()`](minaret_http::HttpClientConfig::refresh_endpoint)
    /// is used. `refresh_timeout` always wins over its request timeout.
    pub http_config: Option<minaret_http::HttpClientConfig>,
}

impl AuthClientConfig {
    /// Config for `base_url` with every other field defaulted.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns [`AuthConfigError::Invalid`] if `base_url` is missing or not
    /// http(s), or if `refresh_timeout` is zero.
    pub fn validate(&self) -> Result<(), AuthConfigError> {
        let Some(base_url) = &self.base_url else {
            return Err(AuthConfigError::Invalid("base_url must be set".into()));
        };
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AuthConfigError::Invalid(format!(
                "base_url scheme must be http or https, got '{}'",
                base_url.scheme()
            )));
        }
        if self.refresh_timeout.is_zero() {
            return Err(AuthConfigError::Invalid(
                "refresh_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Absolute URL of the refresh exchange.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError::Invalid`] if the config does not validate.
    pub fn refresh_url(&self) -> Result<Url, AuthConfigError> {
        self.validate()?;
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| AuthConfigError::Invalid("base_url must be set".into()))?;
        join_path(base, self.endpoints.refresh_path())
    }
}

/// Append `path` to `base`, keeping any path prefix `base` carries.
///
/// # Errors
///
/// Returns [`AuthConfigError::Invalid`] if the result is not a valid URL.
pub fn join_path(base: &Url, path: &str) -> Result<Url, AuthConfigError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| AuthConfigError::Invalid(format!("invalid URL '{joined}': {e}")))
}

impl fmt::Debug for AuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted_headers: Vec<_> = self
            .extra_headers
            .iter()
            .map(|(k, _)| (k.as_str(), "[REDACTED]"))
            .collect();
        f.debug_struct("AuthClientConfig")
            .field("base_url", &self.base_url)
            .field("endpoints", &self.endpoints)
            .field("refresh_timeout", &self.refresh_timeout)
            .field("extra_headers", &redacted_headers)
            .field("http_config", &self.http_config)
            .finish()
    }
}

impl Default for AuthClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            endpoints: AuthEndpoints::default(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            extra_headers: Vec::new(),
            http_config: None,
        }
    }
}
