#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport of the Minaret client stack.
//!
//! [`HttpClient`] is hyper over rustls behind a tower stack: pooled
//! connections, a per-attempt timeout reported as [`HttpError::Timeout`], a
//! default `User-Agent`, gzip/brotli/deflate decoding and an optional
//! fail-fast concurrency limit. [`HttpClientBuilder::with_auth_layer`] is the
//! hook `minaret-auth` uses to put its session pipeline in front of the
//! transport.
//!
//! Sending never fails on an HTTP status. Layers above the transport see 401s
//! as plain responses; callers opt into status errors through
//! [`HttpResponse::error_for_status`] or the checked body readers.
//!
//! ```ignore
//! use minaret_http::HttpClient;
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .user_agent("minaret/0.1")
//!     .build()?;
//!
//! let health: Health = client
//!     .get("https://api.example.com/admin/healthy")
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod request;
mod response;
mod tls;

pub use builder::{HttpClientBuilder, InnerService};
pub use client::HttpClient;
pub use config::{
    DEFAULT_USER_AGENT, HttpClientConfig, RateLimitConfig, TlsRootConfig, TransportSecurity,
};
pub use error::{HttpError, InvalidUriKind};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, ResponseBody};
