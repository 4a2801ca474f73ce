use std::fmt;
use std::sync::Arc;

use minaret_auth::{
    CredentialStore, HttpClientBuilderExt, HttpTokenRefresher, RefreshCoordinator,
    SessionAuthLayer, SessionInvalidationHandler, TokenRefresher, join_path,
};
use minaret_http::{HttpClient, HttpClientBuilder, HttpResponse, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{AdminApi, AuthApi, UserApi};
use crate::config::ApiClientConfig;
use crate::error::ApiError;

/// Typed entry point to the Minaret backend.
///
/// Every request goes through the session pipeline: the stored access token
/// is attached and an expired session is refreshed and replayed once.
/// Cheap to clone; clones share the transport, store and coordinator.
///
/// ```ignore
/// let api = ApiClient::builder(config, store).build()?;
/// let me = api.user().profile().await?;
/// let roles = api.admin().list_roles().await?;
/// ```
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: Url,
    store: Arc<dyn CredentialStore>,
    coordinator: RefreshCoordinator,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    #[must_use]
    pub fn builder(config: ApiClientConfig, store: Arc<dyn CredentialStore>) -> ApiClientBuilder {
        ApiClientBuilder::new(config, store)
    }

    #[must_use]
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    #[must_use]
    pub fn user(&self) -> UserApi<'_> {
        UserApi::new(self)
    }

    #[must_use]
    pub fn admin(&self) -> AdminApi<'_> {
        AdminApi::new(self)
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// The pipeline-enabled transport, for endpoints without a typed wrapper.
    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> Result<String, ApiError> {
        Ok(join_path(&self.base_url, path)?.into())
    }

    pub(crate) fn get(&self, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.http.get(&self.url(path)?))
    }

    pub(crate) fn post(&self, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.http.post(&self.url(path)?))
    }

    pub(crate) fn patch(&self, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.http.patch(&self.url(path)?))
    }

    pub(crate) fn delete(&self, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.http.delete(&self.url(path)?))
    }
}

/// Send `request` and decode its 2xx JSON body.
pub async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    path: &str,
) -> Result<T, ApiError> {
    let value = fetch_value(request).await?;
    decode(value, path)
}

/// Like [`fetch_json`], but accepts the payload wrapped as `{ "<key>": ... }`.
pub async fn fetch_unwrapped<T: DeserializeOwned>(
    request: RequestBuilder,
    path: &str,
    key: &str,
) -> Result<T, ApiError> {
    let value = fetch_value(request).await?;
    decode(unwrap_key(value, key), path)
}

/// Send `request`, fail on non-2xx, discard the body.
pub async fn fetch_unit(request: RequestBuilder) -> Result<(), ApiError> {
    request.send().await?.checked_bytes().await?;
    Ok(())
}

async fn fetch_value(request: RequestBuilder) -> Result<serde_json::Value, ApiError> {
    let response: HttpResponse = request.send().await?;
    let body = response.checked_bytes().await?;
    if body.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_slice(&body).map_err(minaret_http::HttpError::from)?)
}

fn decode<T: DeserializeOwned>(value: serde_json::Value, path: &str) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|source| ApiError::Decode {
        path: path.to_owned(),
        source,
    })
}

fn unwrap_key(value: serde_json::Value, key: &str) -> serde_json::Value {
    match value {
        serde_json::Value::Object(mut map) if map.contains_key(key) => {
            map.remove(key).unwrap_or(serde_json::Value::Null)
        }
        other => other,
    }
}

/// Assembles an [`ApiClient`] and its session pipeline.
pub struct ApiClientBuilder {
    config: ApiClientConfig,
    store: Arc<dyn CredentialStore>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    on_invalidated: Option<Arc<dyn SessionInvalidationHandler>>,
}

impl ApiClientBuilder {
    #[must_use]
    pub fn new(config: ApiClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            config,
            store,
            refresher: None,
            on_invalidated: None,
        }
    }

    /// Replace the HTTP refresh exchange.
    #[must_use]
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Called after credentials are cleared because a session could not be
    /// recovered.
    #[must_use]
    pub fn on_session_invalidated(mut self, handler: Arc<dyn SessionInvalidationHandler>) -> Self {
        self.on_invalidated = Some(handler);
        self
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Config`] for an invalid config and
    /// [`ApiError::Http`] if the transport cannot be built.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        self.config.validate()?;

        let refresher: Arc<dyn TokenRefresher> = match self.refresher {
            Some(refresher) => refresher,
            None => Arc::new(HttpTokenRefresher::new(&self.config.auth_config())?),
        };
        let coordinator = RefreshCoordinator::new(self.store.clone(), refresher);
        let layer = SessionAuthLayer::with_options(
            self.store.clone(),
            coordinator.clone(),
            self.config.endpoints.clone(),
            self.on_invalidated,
        );

        let http = HttpClientBuilder::with_config(self.config.http)
            .with_session_auth(layer)
            .build()?;

        tracing::debug!(base_url = %self.config.base_url, "api client ready");

        Ok(ApiClient {
            http,
            base_url: self.config.base_url,
            store: self.store,
            coordinator,
        })
    }
}
