use std::time::Duration;

use minaret_auth::{AuthClientConfig, AuthEndpoints, DEFAULT_REFRESH_TIMEOUT};
use minaret_http::{HttpClientConfig, TransportSecurity};
use url::Url;

use crate::error::ApiError;

/// Configuration of an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Backend base URL, e.g. `https://api.minaret.app`. A path prefix is kept.
    pub base_url: Url,

    /// Transport settings of the authenticated client.
    pub http: HttpClientConfig,

    /// Timeout of a single refresh exchange.
    pub refresh_timeout: Duration,

    /// Refresh and primary-auth path classification.
    pub endpoints: AuthEndpoints,
}

impl ApiClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http: HttpClientConfig::default(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            endpoints: AuthEndpoints::default(),
        }
    }

    /// Plain-HTTP config with short timeouts, for mock servers.
    #[must_use]
    pub fn for_testing(base_url: Url) -> Self {
        Self {
            http: HttpClientConfig::for_testing(),
            refresh_timeout: Duration::from_secs(5),
            ..Self::new(base_url)
        }
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Config`] for a non-http(s) base URL, a zero
    /// timeout, or a plain-HTTP base URL while the transport is TLS-only.
    pub fn validate(&self) -> Result<(), ApiError> {
        self.auth_config().validate()?;
        if self.http.request_timeout.is_zero() {
            return Err(invalid("http.request_timeout must be greater than zero"));
        }
        if self.base_url.scheme() == "http" && self.http.transport == TransportSecurity::TlsOnly {
            return Err(invalid(
                "base_url uses http but the transport is TLS-only; enable insecure HTTP explicitly",
            ));
        }
        Ok(())
    }

    /// Config of the refresh exchange derived from this one.
    ///
    /// The refresh client keeps its conservative preset but follows this
    /// config's transport, TLS roots and User-Agent.
    #[must_use]
    pub fn auth_config(&self) -> AuthClientConfig {
        let mut refresh_http = HttpClientConfig::refresh_endpoint();
        refresh_http.transport = self.http.transport;
        refresh_http.tls_roots = self.http.tls_roots;
        refresh_http.user_agent.clone_from(&self.http.user_agent);

        AuthClientConfig {
            endpoints: self.endpoints.clone(),
            refresh_timeout: self.refresh_timeout,
            http_config: Some(refresh_http),
            ..AuthClientConfig::new(self.base_url.clone())
        }
    }
}

fn invalid(msg: &str) -> ApiError {
    ApiError::Config(minaret_auth::AuthConfigError::Invalid(msg.to_owned()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn https_default_is_valid() {
        ApiClientConfig::new(url("https://api.example.com")).validate().unwrap();
    }

    #[test]
    fn http_needs_insecure_transport() {
        let cfg = ApiClientConfig::new(url("http://localhost:3000"));
        assert!(matches!(cfg.validate(), Err(ApiError::Config(_))));

        let mut cfg = cfg;
        cfg.http.transport = TransportSecurity::AllowInsecureHttp;
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_timeouts_rejected() {
        let mut cfg = ApiClientConfig::for_testing(url("http://localhost:3000"));
        cfg.refresh_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = ApiClientConfig::for_testing(url("http://localhost:3000"));
        cfg.http.request_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn refresh_client_follows_transport() {
        let cfg = ApiClientConfig::for_testing(url("http://localhost:3000/api"));
        let auth = cfg.auth_config();

        let http = auth.http_config.as_ref().unwrap();
        assert_eq!(http.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(auth.refresh_timeout, Duration::from_secs(5));
        assert_eq!(
            auth.refresh_url().unwrap().as_str(),
            "http://localhost:3000/api/auth/refresh"
        );
    }
}
