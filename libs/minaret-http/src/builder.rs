use std::time::Duration;

use bytes::Bytes;
use http::header::USER_AGENT;
use http::{HeaderValue, Response};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tower::buffer::Buffer;
use tower::limit::ConcurrencyLimitLayer;
use tower::load_shed::LoadShedLayer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;
use tower_http::set_header::SetRequestHeaderLayer;

use crate::client::{BufferedService, HttpClient};
use crate::config::{HttpClientConfig, TlsRootConfig, TransportSecurity};
use crate::error::HttpError;
use crate::response::ResponseBody;
use crate::tls;

/// Boxed request/response service as seen by an auth layer.
///
/// An auth layer receives the transport in this shape and must hand back the
/// same shape; every HTTP status arrives as `Ok(response)`.
pub type InnerService =
    BoxCloneService<http::Request<Full<Bytes>>, http::Response<ResponseBody>, HttpError>;

type WrapFn = Box<dyn FnOnce(InnerService) -> InnerService + Send>;

/// Assembles an [`HttpClient`] from an [`HttpClientConfig`] and an optional
/// auth layer.
///
/// Request flow, outermost first:
///
/// ```text
/// Buffer -> [LoadShed -> ConcurrencyLimit] -> [auth] -> error mapping
///        -> Timeout -> User-Agent -> Decompression -> hyper
/// ```
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    wrap: Option<WrapFn>,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config, wrap: None }
    }

    /// Timeout of one attempt. A request replayed by the auth layer gets a
    /// fresh budget.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Plug in the auth layer. It sits inside the concurrency limit, so a
    /// replay does not take a second permit, and outside the timeout, so each
    /// attempt is timed separately. Setting it twice keeps the last one.
    #[must_use]
    pub fn with_auth_layer(
        mut self,
        wrap: impl FnOnce(InnerService) -> InnerService + Send + 'static,
    ) -> Self {
        self.wrap = Some(Box::new(wrap));
        self
    }

    /// # Errors
    /// [`HttpError::Tls`] when the root store cannot be loaded,
    /// [`HttpError::InvalidHeaderValue`] for an unusable User-Agent.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let Self { config, wrap } = self;

        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                target: "minaret_http::security",
                "plain HTTP is allowed; traffic to http:// URLs is not encrypted"
            );
        }

        let mut service = transport_service(&config)?;
        if let Some(wrap) = wrap {
            service = wrap(service);
        }
        if let Some(limit) = config.rate_limit
            && limit.max_concurrent_requests < usize::MAX
        {
            service = ServiceBuilder::new()
                .layer(LoadShedLayer::new())
                .layer(ConcurrencyLimitLayer::new(limit.max_concurrent_requests))
                .service(service)
                .map_err(|e: tower::BoxError| into_http_error(e, None))
                .boxed_clone();
        }

        // Buffer hands out cheap clones that share one worker; zero capacity panics.
        let service: BufferedService = Buffer::new(service, config.buffer_capacity.max(1));

        Ok(HttpClient {
            service,
            max_body_size: config.max_body_size,
            transport_security: config.transport,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Timeout, User-Agent and decompression over a pooled hyper client.
fn transport_service(config: &HttpClientConfig) -> Result<InnerService, HttpError> {
    let mut pool = Client::builder(TokioExecutor::new());
    // idle eviction needs a timer
    pool.pool_timer(TokioTimer::new())
        .pool_max_idle_per_host(config.pool_max_idle_per_host);
    if let Some(idle) = config.pool_idle_timeout {
        pool.pool_idle_timeout(idle);
    }
    let hyper_client = pool.build::<_, Full<Bytes>>(https_connector(config)?);

    let user_agent = HeaderValue::from_str(&config.user_agent)?;
    let timeout = config.request_timeout;
    let service = ServiceBuilder::new()
        .layer(TimeoutLayer::new(timeout))
        .layer(SetRequestHeaderLayer::if_not_present(USER_AGENT, user_agent))
        .layer(DecompressionLayer::new())
        .service(hyper_client)
        .map_response(box_body)
        .map_err(move |e: tower::BoxError| into_http_error(e, Some(timeout)));

    Ok(service.boxed_clone())
}

/// Convert a boxed tower error.
///
/// `HttpError`s raised further in are passed through untouched; `timeout`
/// is the budget reported when the timeout layer fired.
fn into_http_error(err: tower::BoxError, timeout: Option<Duration>) -> HttpError {
    if let Some(timeout) = timeout
        && err.is::<tower::timeout::error::Elapsed>()
    {
        return HttpError::Timeout(timeout);
    }
    if err.is::<tower::load_shed::error::Overloaded>() {
        return HttpError::Overloaded;
    }
    match err.downcast::<HttpError>() {
        Ok(inner) => *inner,
        Err(other) => HttpError::Transport(other),
    }
}

fn box_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    response.map(|body| body.map_err(Into::into).boxed())
}

/// ALPN offers h2 and http/1.1 on either root store.
fn https_connector(config: &HttpClientConfig) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let with_roots = match config.tls_roots {
        TlsRootConfig::WebPki => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(tls::crypto_provider())
            .map_err(|e| HttpError::Tls(Box::new(e)))?,
        TlsRootConfig::Native => HttpsConnectorBuilder::new().with_tls_config(
            tls::native_roots_client_config().map_err(|e| HttpError::Tls(e.into()))?,
        ),
    };

    let connector = match config.transport {
        TransportSecurity::TlsOnly => with_roots.https_only().enable_all_versions().build(),
        TransportSecurity::AllowInsecureHttp => {
            with_roots.https_or_http().enable_all_versions().build()
        }
    };
    Ok(connector)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;

    #[test]
    fn new_uses_default_config() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.request_timeout, Duration::from_secs(30));
        assert_eq!(builder.config.user_agent, DEFAULT_USER_AGENT);
        assert!(builder.wrap.is_none());
    }

    #[test]
    fn setters_override_config() {
        let builder = HttpClientBuilder::new()
            .timeout(Duration::from_secs(3))
            .max_body_size(64)
            .transport(TransportSecurity::AllowInsecureHttp);
        assert_eq!(builder.config.request_timeout, Duration::from_secs(3));
        assert_eq!(builder.config.max_body_size, 64);
        assert_eq!(builder.config.transport, TransportSecurity::AllowInsecureHttp);
    }

    #[tokio::test]
    async fn user_agent_with_control_bytes_is_rejected() {
        let result = HttpClientBuilder::new().user_agent("minaret\x00cli").build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[tokio::test]
    async fn zero_buffer_capacity_still_builds() {
        let mut config = HttpClientConfig::for_testing();
        config.buffer_capacity = 0;
        assert!(HttpClientBuilder::with_config(config).build().is_ok());
    }

    // -- error mapping ---

    #[test]
    fn elapsed_becomes_timeout_with_budget() {
        let err: tower::BoxError = Box::new(tower::timeout::error::Elapsed::new());
        let mapped = into_http_error(err, Some(Duration::from_millis(250)));
        assert!(matches!(mapped, HttpError::Timeout(d) if d == Duration::from_millis(250)));
    }

    #[test]
    fn inner_http_error_passes_through() {
        let err: tower::BoxError = Box::new(HttpError::ServiceClosed);
        assert!(matches!(into_http_error(err, None), HttpError::ServiceClosed));
    }

    #[test]
    fn shed_load_becomes_overloaded() {
        let err: tower::BoxError = Box::new(tower::load_shed::error::Overloaded::new());
        assert!(matches!(into_http_error(err, None), HttpError::Overloaded));
    }

    #[test]
    fn unknown_error_is_transport() {
        let err: tower::BoxError = "socket closed".into();
        assert!(matches!(into_http_error(err, None), HttpError::Transport(_)));
    }
}
