use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, Method, Request, Uri};
use http_body_util::Full;
use serde::Serialize;

use crate::client::HttpClient;
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

enum Body {
    Empty,
    Raw(Bytes),
    Encoded {
        bytes: Bytes,
        content_type: &'static str,
    },
}

/// A request being assembled.
///
/// A bad header does not break the chain: the error is kept and returned by
/// the next fallible call (`json`, `form` or `send`).
#[must_use = "a request is only sent by .send()"]
pub struct RequestBuilder {
    client: HttpClient,
    method: Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Body,
    pending_error: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: HttpClient, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: Vec::new(),
            body: Body::Empty,
            pending_error: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.pending_error.is_none() {
            match HeaderName::try_from(name) {
                Err(e) => self.pending_error = Some(HttpError::InvalidHeaderName(e)),
                Ok(name) => match HeaderValue::try_from(value) {
                    Err(e) => self.pending_error = Some(HttpError::InvalidHeaderValue(e)),
                    Ok(value) => self.headers.push((name, value)),
                },
            }
        }
        self
    }

    /// Add a pre-validated header. `sensitive` keeps the value out of `Debug`
    /// output and HPACK tables.
    pub fn header_value(mut self, name: HeaderName, mut value: HeaderValue, sensitive: bool) -> Self {
        value.set_sensitive(sensitive);
        self.headers.push((name, value));
        self
    }

    /// # Errors
    /// A pending header error, or [`HttpError::Json`] if `body` fails to
    /// serialize.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, HttpError> {
        let bytes = serde_json::to_vec(body)?;
        self.encoded(Bytes::from(bytes), JSON)
    }

    /// # Errors
    /// A pending header error, or [`HttpError::FormEncode`].
    pub fn form(self, fields: &[(&str, &str)]) -> Result<Self, HttpError> {
        let encoded = serde_urlencoded::to_string(fields)?;
        self.encoded(Bytes::from(encoded), FORM)
    }

    /// Raw body; no `Content-Type` is added.
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = Body::Raw(body);
        self
    }

    fn encoded(mut self, bytes: Bytes, content_type: &'static str) -> Result<Self, HttpError> {
        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }
        self.body = Body::Encoded {
            bytes,
            content_type,
        };
        Ok(self)
    }

    /// Send the request. Any HTTP status is `Ok`; use
    /// [`HttpResponse::error_for_status`] to reject non-2xx.
    ///
    /// # Errors
    /// A pending header error, URL or scheme rejection, and transport
    /// failures including [`HttpError::Timeout`].
    pub async fn send(self) -> Result<HttpResponse, HttpError> {
        let Self {
            client,
            method,
            url,
            headers,
            body,
            pending_error,
        } = self;
        if let Some(e) = pending_error {
            return Err(e);
        }

        let uri = check_url(&url, client.transport_security)?;
        let caller_content_type = headers.iter().any(|(name, _)| name == CONTENT_TYPE);

        let mut builder = Request::builder().method(method).uri(uri);
        let bytes = match body {
            Body::Empty => Bytes::new(),
            Body::Raw(bytes) => bytes,
            Body::Encoded {
                bytes,
                content_type,
            } => {
                if !caller_content_type {
                    builder = builder.header(CONTENT_TYPE, content_type);
                }
                bytes
            }
        };
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let request = builder.body(Full::new(bytes))?;

        let inner = client.dispatch(request).await?;
        Ok(HttpResponse {
            inner,
            max_body_size: client.max_body_size,
        })
    }
}

/// Absolute `http(s)` URL allowed by the transport policy.
fn check_url(url: &str, transport: TransportSecurity) -> Result<Uri, HttpError> {
    let invalid = |kind, reason: String| HttpError::InvalidUri {
        url: url.to_owned(),
        kind,
        reason,
    };

    let uri: Uri = url
        .parse()
        .map_err(|e: http::uri::InvalidUri| invalid(InvalidUriKind::ParseError, e.to_string()))?;
    let Some(scheme) = uri.scheme_str() else {
        return Err(invalid(InvalidUriKind::MissingScheme, "missing scheme".to_owned()));
    };
    if uri.authority().is_none() {
        return Err(invalid(
            InvalidUriKind::MissingAuthority,
            "missing host".to_owned(),
        ));
    }

    match (scheme, transport) {
        ("https", _) | ("http", TransportSecurity::AllowInsecureHttp) => Ok(uri),
        ("http", TransportSecurity::TlsOnly) => Err(HttpError::InvalidScheme {
            scheme: "http".to_owned(),
            reason: "HTTPS required; plain HTTP is not allowed by the transport".to_owned(),
        }),
        (other, _) => Err(HttpError::InvalidScheme {
            scheme: other.to_owned(),
            reason: "only http and https are supported".to_owned(),
        }),
    }
}
