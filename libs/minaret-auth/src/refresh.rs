//! Single-flight token refresh.
//!
//! At most one refresh exchange runs at a time. Every caller that arrives
//! while it runs awaits the same shared result.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::AuthClientConfig;
use crate::credentials::{CredentialStore, TokenPair};
use crate::error::{AuthConfigError, RefreshError};
use crate::http_error::format_http_error;

/// Performs the refresh exchange: old refresh token in, new pair out.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, RefreshError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// `POST {base_url}/auth/refresh` with `{ "refreshToken": ... }`, expecting
/// `{ "accessToken": ..., "refreshToken": ... }`.
///
/// Uses its own client without the session pipeline, so a failing refresh
/// can never recurse into another refresh.
pub struct HttpTokenRefresher {
    client: minaret_http::HttpClient,
    url: Url,
    extra_headers: Vec<(String, String)>,
    timeout: Duration,
}

impl HttpTokenRefresher {
    /// # Errors
    ///
    /// Returns [`AuthConfigError`] if the config is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &AuthClientConfig) -> Result<Self, AuthConfigError> {
        let url = config.refresh_url()?;

        let mut http_config = config
            .http_config
            .clone()
            .unwrap_or_else(minaret_http::HttpClientConfig::refresh_endpoint);
        http_config.request_timeout = config.refresh_timeout;

        let client = minaret_http::HttpClientBuilder::with_config(http_config)
            .build()
            .map_err(|e| AuthConfigError::Http(format_http_error(&e, "token refresh")))?;

        Ok(Self {
            client,
            url,
            extra_headers: config.extra_headers.clone(),
            timeout: config.refresh_timeout,
        })
    }
}

impl fmt::Debug for HttpTokenRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTokenRefresher")
            .field("url", &self.url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    /// The whole exchange, body included, is bounded by the refresh timeout.
    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, RefreshError> {
        tokio::time::timeout(self.timeout, self.exchange(refresh_token))
            .await
            .map_err(|_| RefreshError::Timeout(self.timeout))?
    }
}

impl HttpTokenRefresher {
    async fn exchange(&self, refresh_token: &SecretString) -> Result<TokenPair, RefreshError> {
        let http_err = |e: minaret_http::HttpError| {
            RefreshError::Http(format_http_error(&e, "token refresh"))
        };

        let mut builder = self.client.post(self.url.as_str());
        for (name, value) in &self.extra_headers {
            builder = builder.header(name, value);
        }

        let body = RefreshRequest {
            refresh_token: refresh_token.expose_secret(),
        };
        let response = builder
            .json(&body)
            .map_err(http_err)?
            .send()
            .await
            .map_err(http_err)?;

        let parsed: RefreshResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(minaret_http::HttpError::Json(e)) => {
                return Err(RefreshError::InvalidResponse(e.to_string()));
            }
            Err(e) => return Err(http_err(e)),
        };

        if parsed.access_token.is_empty() || parsed.refresh_token.is_empty() {
            return Err(RefreshError::InvalidResponse(
                "empty accessToken or refreshToken".into(),
            ));
        }

        Ok(TokenPair::new(
            parsed.access_token.as_str(),
            parsed.refresh_token.as_str(),
        ))
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Option<SecretString>>>;

#[derive(Default)]
struct Slot {
    generation: u64,
    in_flight: Option<SharedRefresh>,
}

struct CoordinatorInner {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    slot: Mutex<Slot>,
}

/// Clears the in-flight slot when the refresh task ends, including by panic.
struct ClearSlot {
    inner: Arc<CoordinatorInner>,
    generation: u64,
}

impl Drop for ClearSlot {
    fn drop(&mut self) {
        self.inner.clear_slot(self.generation);
    }
}

/// Process-wide refresh coordinator. Cheap to clone; clones share the slot.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                refresher,
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    /// Whether a refresh exchange is currently in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.slot.lock().in_flight.is_some()
    }

    /// Obtain a fresh access token, joining an in-flight refresh if any.
    ///
    /// Returns `None` when there is no refresh token (the access token is
    /// dropped, nothing is sent) or when the exchange fails (all credentials
    /// are cleared). The exchange runs on its own task: dropping this future
    /// does not cancel it.
    pub async fn ensure_fresh_token(&self) -> Option<SecretString> {
        let shared = {
            let mut slot = self.inner.slot.lock();
            if let Some(in_flight) = &slot.in_flight {
                tracing::debug!("joining in-flight token refresh");
                in_flight.clone()
            } else {
                slot.generation = slot.generation.wrapping_add(1);
                let generation = slot.generation;
                let inner = Arc::clone(&self.inner);
                let task = tokio::spawn(async move {
                    let _guard = ClearSlot {
                        inner: Arc::clone(&inner),
                        generation,
                    };
                    inner.run_refresh().await
                });
                let inner = Arc::clone(&self.inner);
                let shared = task
                    .map(move |joined| match joined {
                        Ok(token) => token,
                        Err(e) => {
                            tracing::error!(error = %e, "token refresh task failed");
                            inner.clear_slot(generation);
                            None
                        }
                    })
                    .boxed()
                    .shared();
                slot.in_flight = Some(shared.clone());
                shared
            }
        };

        shared.await
    }
}

impl CoordinatorInner {
    fn clear_slot(&self, generation: u64) {
        let mut slot = self.slot.lock();
        if slot.generation == generation {
            slot.in_flight = None;
        }
    }

    async fn run_refresh(&self) -> Option<SecretString> {
        let refresh_token = match self.store.get_refresh_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!("no refresh token available; dropping access token");
                if let Err(e) = self.store.remove_access_token().await {
                    tracing::warn!(error = %e, "failed to remove access token");
                }
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read refresh token");
                self.clear_credentials().await;
                return None;
            }
        };

        tracing::info!("refreshing session tokens");
        let tokens = match self.refresher.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed; clearing credentials");
                self.clear_credentials().await;
                return None;
            }
        };

        let access_token = tokens.access_token.clone();
        if let Err(e) = self.store.set_tokens(tokens).await {
            tracing::warn!(error = %e, "failed to persist refreshed tokens; clearing credentials");
            self.clear_credentials().await;
            return None;
        }

        tracing::info!("session tokens refreshed");
        Some(access_token)
    }

    async fn clear_credentials(&self) {
        if let Err(e) = self.store.clear_all().await {
            tracing::warn!(error = %e, "failed to clear credentials");
        }
    }
}
