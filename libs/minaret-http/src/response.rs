use bytes::{Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// Cap on the body text copied into [`HttpError::HttpStatus`].
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

const PREVIEW_TOO_LARGE: &str = "<body too large for preview>";

pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Response whose body readers never buffer more than `max_body_size` bytes.
///
/// `bytes` reads any status; `checked_bytes`, `json` and `text` turn a
/// non-2xx status into [`HttpError::HttpStatus`] with a body preview.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Fail on non-2xx without touching the body, so the preview is empty.
    ///
    /// # Errors
    /// [`HttpError::HttpStatus`] for any non-2xx status.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        let status = self.status();
        if status.is_success() {
            Ok(self)
        } else {
            Err(HttpError::HttpStatus {
                status,
                body_preview: String::new(),
                content_type: content_type(self.headers()),
            })
        }
    }

    /// # Errors
    /// [`HttpError::BodyTooLarge`] or a transport failure while reading.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        collect_limited(self.inner, self.max_body_size).await
    }

    /// # Errors
    /// [`HttpError::HttpStatus`] for non-2xx, otherwise as [`bytes`](Self::bytes).
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        let status = self.status();
        if status.is_success() {
            return self.bytes().await;
        }

        let content_type = content_type(self.headers());
        // an oversized preview must not mask the status
        let limit = self.max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
        let body_preview = match collect_limited(self.inner, limit).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(HttpError::BodyTooLarge { .. }) => PREVIEW_TOO_LARGE.to_owned(),
            Err(e) => return Err(e),
        };
        Err(HttpError::HttpStatus {
            status,
            body_preview,
            content_type,
        })
    }

    /// # Errors
    /// As [`checked_bytes`](Self::checked_bytes), plus [`HttpError::Json`].
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let bytes = self.checked_bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Lossy UTF-8.
    ///
    /// # Errors
    /// As [`checked_bytes`](Self::checked_bytes).
    pub async fn text(self) -> Result<String, HttpError> {
        let bytes = self.checked_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

async fn collect_limited(response: Response<ResponseBody>, limit: usize) -> Result<Bytes, HttpError> {
    let mut body = response.into_body();
    let mut buf = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        let Some(chunk) = frame.data_ref() else {
            continue;
        };
        let actual = buf.len() + chunk.len();
        if actual > limit {
            return Err(HttpError::BodyTooLarge { limit, actual });
        }
        buf.extend_from_slice(chunk);
    }

    Ok(buf.freeze())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn response(status: u16, body: &'static str, max_body_size: usize) -> HttpResponse {
        let body: ResponseBody = Full::new(Bytes::from_static(body.as_bytes()))
            .map_err(|never| match never {})
            .boxed();
        let inner = Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        HttpResponse {
            inner,
            max_body_size,
        }
    }

    #[tokio::test]
    async fn json_of_success_body() {
        let value: serde_json::Value = response(200, r#"{"accessToken":"a"}"#, 1024)
            .json()
            .await
            .unwrap();
        assert_eq!(value["accessToken"], "a");
    }

    #[tokio::test]
    async fn status_error_carries_preview_and_content_type() {
        let err = response(409, r#"{"message":"email taken"}"#, 1024)
            .checked_bytes()
            .await
            .unwrap_err();
        let HttpError::HttpStatus {
            status,
            body_preview,
            content_type,
        } = err
        else {
            panic!("expected an HTTP status error");
        };
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body_preview.contains("email taken"));
        assert_eq!(content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn bytes_reads_any_status() {
        let body = response(500, "oops", 1024).bytes().await.unwrap();
        assert_eq!(&body[..], b"oops");
    }

    #[tokio::test]
    async fn limit_is_enforced() {
        let err = response(200, "0123456789", 4).bytes().await.unwrap_err();
        assert!(matches!(err, HttpError::BodyTooLarge { limit: 4, actual: 10 }));
    }

    #[tokio::test]
    async fn oversized_error_body_keeps_status() {
        let err = response(502, "0123456789", 4).text().await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(matches!(
            err,
            HttpError::HttpStatus { ref body_preview, .. } if body_preview == PREVIEW_TOO_LARGE
        ));
    }

    #[test]
    fn error_for_status_only_rejects_non_2xx() {
        assert!(response(204, "", 16).error_for_status().is_ok());
        let err = response(401, "", 16).error_for_status().unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }
}
