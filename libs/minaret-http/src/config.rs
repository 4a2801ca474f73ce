use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("minaret-http/", env!("CARGO_PKG_VERSION"));

const MIB: usize = 1024 * 1024;

/// Cap on requests in flight. Excess requests fail with
/// [`HttpError::Overloaded`](crate::HttpError::Overloaded) instead of waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_concurrent_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 64,
        }
    }
}

impl RateLimitConfig {
    /// Four in flight; enough for a single-flight refresh exchange.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            max_concurrent_requests: 4,
        }
    }
}

/// Trust anchors for TLS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Bundled Mozilla roots.
    #[default]
    WebPki,
    /// The operating system store.
    Native,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    #[default]
    TlsOnly,
    /// `http://` URLs are accepted. Local development and mock servers only.
    AllowInsecureHttp,
}

/// Settings of one [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Budget of a single attempt; 30 s by default.
    pub request_timeout: Duration,
    /// Largest body any reader will buffer; 10 MiB by default.
    pub max_body_size: usize,
    pub user_agent: String,
    /// `None` turns the concurrency limit off.
    pub rate_limit: Option<RateLimitConfig>,
    pub transport: TransportSecurity,
    pub tls_roots: TlsRootConfig,
    /// Queue depth in front of the stack.
    pub buffer_capacity: usize,
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * MIB,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            rate_limit: Some(RateLimitConfig::default()),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::WebPki,
            buffer_capacity: 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Preset of the dedicated refresh client: short timeout, token-sized
    /// body limit and a small pool.
    #[must_use]
    pub fn refresh_endpoint() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 64 * 1024,
            rate_limit: Some(RateLimitConfig::conservative()),
            buffer_capacity: 16,
            pool_idle_timeout: Some(Duration::from_secs(60)),
            pool_max_idle_per_host: 2,
            ..Self::default()
        }
    }

    /// Plain HTTP, no concurrency limit. For local mock servers.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: MIB,
            rate_limit: None,
            transport: TransportSecurity::AllowInsecureHttp,
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Self::default()
        }
    }
}
