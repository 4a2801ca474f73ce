use std::future::Future;
use std::pin::Pin;
use std::task::Poll;

use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use tower::Service;
use tower::buffer::Buffer;

use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;

pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// Async HTTP client.
///
/// Clones share one middleware stack through a buffered channel, so the client
/// can be stored in an `Arc`-free struct and handed to tasks as is.
///
/// ```ignore
/// let profile: Profile = client
///     .get("https://api.example.com/user/profile")
///     .send()
///     .await?
///     .json()
///     .await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_body_size", &self.max_body_size)
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Client with [`HttpClientConfig::default`](crate::HttpClientConfig).
    ///
    /// # Errors
    /// See [`HttpClientBuilder::build`].
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// `url` must be absolute; relative URLs fail on send with
    /// [`HttpError::InvalidUri`].
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, url.to_owned())
    }

    /// Hand a finished request to the stack.
    ///
    /// A full buffer fails fast with [`HttpError::Overloaded`] instead of
    /// queueing.
    pub(crate) async fn dispatch(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<ResponseBody>, HttpError> {
        let mut service = self.service.clone();

        let ready = std::future::poll_fn(|cx| match service.poll_ready(cx) {
            Poll::Ready(result) => Poll::Ready(Some(result)),
            Poll::Pending => Poll::Ready(None),
        })
        .await;
        match ready {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(from_buffer_error(e)),
            None => return Err(HttpError::Overloaded),
        }

        service.call(request).await.map_err(from_buffer_error)
    }
}

/// Errors of the inner stack come back boxed; anything that is not an
/// `HttpError` means the buffer worker died.
fn from_buffer_error(err: tower::BoxError) -> HttpError {
    match err.downcast::<HttpError>() {
        Ok(inner) => *inner,
        Err(other) => {
            tracing::error!(error = %other, "HTTP buffer worker is gone");
            HttpError::ServiceClosed
        }
    }
}
