use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tower::{Layer, Service, ServiceExt};

use crate::credentials::CredentialStore;
use crate::endpoints::AuthEndpoints;
use crate::invalidation::SessionInvalidationHandler;
use crate::refresh::RefreshCoordinator;
use minaret_http::HttpError;

/// Why an attempt counts as an authorization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthFailure {
    Unauthorized,
    TimedOut,
}

fn classify<B>(outcome: &Result<Response<B>, HttpError>) -> Option<AuthFailure> {
    match outcome {
        Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => Some(AuthFailure::Unauthorized),
        Err(e) if e.is_timeout() => Some(AuthFailure::TimedOut),
        _ => None,
    }
}

struct Pipeline {
    store: Arc<dyn CredentialStore>,
    coordinator: RefreshCoordinator,
    endpoints: AuthEndpoints,
    on_invalidated: Option<Arc<dyn SessionInvalidationHandler>>,
}

/// Tower layer that attaches the stored bearer token and recovers once from
/// an expired session.
///
/// Per request:
/// - `Authorization: Bearer <access token>` is set when a token is stored.
/// - A `401` response or a per-attempt timeout triggers one coordinated
///   refresh and a replay of the original request with the new token.
/// - The refresh exchange itself is never recovered. A `401` from a
///   primary-auth call (login) is never recovered either.
/// - When recovery is exhausted, credentials are cleared and the
///   [`SessionInvalidationHandler`] (if any) is notified. The caller gets
///   the failing response or error.
///
/// Must sit outside the per-attempt timeout layer; see
/// [`HttpClientBuilderExt::with_session_auth`](crate::HttpClientBuilderExt::with_session_auth).
#[derive(Clone)]
pub struct SessionAuthLayer {
    pipeline: Arc<Pipeline>,
}

impl SessionAuthLayer {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, coordinator: RefreshCoordinator) -> Self {
        Self::with_options(store, coordinator, AuthEndpoints::default(), None)
    }

    #[must_use]
    pub fn with_options(
        store: Arc<dyn CredentialStore>,
        coordinator: RefreshCoordinator,
        endpoints: AuthEndpoints,
        on_invalidated: Option<Arc<dyn SessionInvalidationHandler>>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                store,
                coordinator,
                endpoints,
                on_invalidated,
            }),
        }
    }
}

impl fmt::Debug for SessionAuthLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuthLayer")
            .field("endpoints", &self.pipeline.endpoints)
            .field("has_invalidation_handler", &self.pipeline.on_invalidated.is_some())
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for SessionAuthLayer {
    type Service = SessionAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionAuthService {
            inner,
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

/// Service produced by [`SessionAuthLayer`].
#[derive(Clone)]
pub struct SessionAuthService<S> {
    inner: S,
    pipeline: Arc<Pipeline>,
}

impl<S> fmt::Debug for SessionAuthService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuthService").finish_non_exhaustive()
    }
}

impl<S, B, ResBody> Service<Request<B>> for SessionAuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Clone + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = HttpError;
    type Future = BoxFuture<'static, Result<Response<ResBody>, HttpError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        // Clone-swap: the instance that was polled ready serves this call.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let pipeline = Arc::clone(&self.pipeline);

        Box::pin(async move { pipeline.execute(inner, req).await })
    }
}

impl Pipeline {
    async fn execute<S, B, ResBody>(
        &self,
        mut inner: S,
        req: Request<B>,
    ) -> Result<Response<ResBody>, HttpError>
    where
        S: Service<Request<B>, Response = Response<ResBody>, Error = HttpError> + Send,
        S::Future: Send,
        B: Clone + Send,
        ResBody: Send,
    {
        let (parts, body) = req.into_parts();
        let is_refresh = self.endpoints.is_refresh(&parts.uri);
        let is_primary_auth = self.endpoints.is_primary_auth(&parts.uri);
        let replay = (parts.clone(), body.clone());

        let mut first = Request::from_parts(parts, body);
        self.authorize(first.headers_mut()).await;
        let outcome = inner.call(first).await;

        let Some(failure) = classify(&outcome) else {
            return outcome;
        };

        if is_refresh {
            tracing::debug!(?failure, "refresh exchange failed; not recovering");
            return outcome;
        }
        if is_primary_auth && failure == AuthFailure::Unauthorized {
            tracing::debug!("primary authentication rejected; not recovering");
            return outcome;
        }

        tracing::debug!(?failure, path = %replay.0.uri.path(), "authorization failure; refreshing session");
        let Some(token) = self.coordinator.ensure_fresh_token().await else {
            self.invalidate_session().await;
            return outcome;
        };
        drop(outcome);

        let (parts, body) = replay;
        let mut retry = Request::from_parts(parts, body);
        match bearer_value(&token) {
            Ok(value) => {
                retry.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(e) => {
                tracing::warn!("refreshed access token is not a valid header value");
                self.invalidate_session().await;
                return Err(HttpError::InvalidHeaderValue(e));
            }
        }

        let outcome = inner.oneshot(retry).await;
        match classify(&outcome) {
            Some(AuthFailure::Unauthorized) if is_primary_auth => {
                tracing::debug!("primary authentication rejected after refresh; not invalidating");
            }
            Some(failure) => {
                tracing::warn!(?failure, "request failed again after refresh");
                self.invalidate_session().await;
            }
            None => {}
        }
        outcome
    }

    /// Attach the stored access token. Store failures degrade to an
    /// unauthenticated request.
    async fn authorize(&self, headers: &mut HeaderMap) {
        match self.store.get_access_token().await {
            Ok(Some(token)) => match bearer_value(&token) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => {
                    tracing::warn!("stored access token is not a valid header value; sending unauthenticated");
                }
            },
            Ok(None) => tracing::debug!("no access token; sending unauthenticated"),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read access token; sending unauthenticated");
            }
        }
    }

    async fn invalidate_session(&self) {
        tracing::warn!("session recovery exhausted; clearing credentials");
        if let Err(e) = self.store.clear_all().await {
            tracing::warn!(error = %e, "failed to clear credentials");
        }
        if let Some(handler) = &self.on_invalidated {
            handler.on_session_invalidated().await;
        }
    }
}

fn bearer_value(token: &SecretString) -> Result<HeaderValue, http::header::InvalidHeaderValue> {
    let raw = zeroize::Zeroizing::new(format!("Bearer {}", token.expose_secret()));
    let mut value = HeaderValue::from_str(&raw)?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::credentials::{MemoryCredentialStore, TokenPair};
    use crate::error::RefreshError;
    use crate::refresh::TokenRefresher;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http_body_util::Full;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // -- scripted inner service -----------------------------------------------

    /// Answers 200 only to `Bearer <accepted>`; anything else gets 401.
    /// Records the Authorization header of every call.
    #[derive(Clone)]
    struct TokenGate {
        accepted: &'static str,
        seen: Arc<Mutex<Vec<Option<String>>>>,
        time_out_first: Arc<AtomicUsize>,
    }

    impl TokenGate {
        fn new(accepted: &'static str) -> Self {
            Self {
                accepted,
                seen: Arc::new(Mutex::new(Vec::new())),
                time_out_first: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn seen(&self) -> Vec<Option<String>> {
            self.seen.lock().clone()
        }
    }

    impl Service<Request<Full<Bytes>>> for TokenGate {
        type Response = Response<Full<Bytes>>;
        type Error = HttpError;
        type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let auth = req
                .headers()
                .get(AUTHORIZATION)
                .map(|v| v.to_str().unwrap().to_owned());
            self.seen.lock().push(auth.clone());

            if self
                .time_out_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Box::pin(async { Err(HttpError::Timeout(Duration::from_secs(1))) });
            }

            let expected = format!("Bearer {}", self.accepted);
            let status = if auth.as_deref() == Some(expected.as_str()) {
                StatusCode::OK
            } else {
                StatusCode::UNAUTHORIZED
            };
            Box::pin(async move {
                Ok(Response::builder()
                    .status(status)
                    .body(Full::new(Bytes::new()))
                    .unwrap())
            })
        }
    }

    // -- scripted refresher and hook ------------------------------------------

    struct FixedRefresher {
        calls: AtomicUsize,
        result: Option<&'static str>,
    }

    #[async_trait]
    impl TokenRefresher for FixedRefresher {
        async fn refresh(&self, _: &SecretString) -> Result<TokenPair, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.result {
                Some(access) => Ok(TokenPair::new(access, "r-next")),
                None => Err(RefreshError::Http("token refresh HTTP 500".into())),
            }
        }
    }

    #[derive(Default)]
    struct CountingHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SessionInvalidationHandler for CountingHook {
        async fn on_session_invalidated(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        store: Arc<MemoryCredentialStore>,
        refresher: Arc<FixedRefresher>,
        hook: Arc<CountingHook>,
        layer: SessionAuthLayer,
    }

    fn harness(tokens: Option<TokenPair>, refresh_result: Option<&'static str>) -> Harness {
        let store = Arc::new(tokens.map_or_else(MemoryCredentialStore::new, MemoryCredentialStore::with_tokens));
        let refresher = Arc::new(FixedRefresher {
            calls: AtomicUsize::new(0),
            result: refresh_result,
        });
        let hook = Arc::new(CountingHook::default());
        let coordinator = RefreshCoordinator::new(store.clone(), refresher.clone());
        let handler: Arc<dyn SessionInvalidationHandler> = hook.clone();
        let layer = SessionAuthLayer::with_options(
            store.clone(),
            coordinator,
            AuthEndpoints::default(),
            Some(handler),
        );
        Harness {
            store,
            refresher,
            hook,
            layer,
        }
    }

    fn get(path: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(format!("http://api.test{path}"))
            .body(Full::new(Bytes::from_static(b"payload")))
            .unwrap()
    }

    // -- token injection ------------------------------------------------------

    #[tokio::test]
    async fn attaches_stored_token() {
        let h = harness(Some(TokenPair::new("good", "r")), None);
        let gate = TokenGate::new("good");
        let svc = h.layer.layer(gate.clone());

        let resp = svc.oneshot(get("/user/profile")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(gate.seen(), vec![Some("Bearer good".to_owned())]);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sends_unauthenticated_without_token() {
        let h = harness(None, None);
        let gate = TokenGate::new("good");
        let svc = h.layer.layer(gate.clone());

        let resp = svc.oneshot(get("/auth/register")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(gate.seen(), vec![None]);
        // no refresh token: nothing to exchange, session invalidated
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
    }

    // -- recovery -------------------------------------------------------------

    #[tokio::test]
    async fn expired_token_is_refreshed_and_replayed() {
        let h = harness(Some(TokenPair::new("stale", "r")), Some("fresh"));
        let gate = TokenGate::new("fresh");
        let svc = h.layer.layer(gate.clone());

        let resp = svc.oneshot(get("/auth/me")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            gate.seen(),
            vec![Some("Bearer stale".to_owned()), Some("Bearer fresh".to_owned())]
        );
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timeout_is_recovered_like_401() {
        let h = harness(Some(TokenPair::new("stale", "r")), Some("fresh"));
        let gate = TokenGate::new("fresh");
        gate.time_out_first.store(1, Ordering::SeqCst);
        let svc = h.layer.layer(gate.clone());

        let resp = svc.oneshot(get("/user/profile")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_failure_invalidates_without_second_refresh() {
        let h = harness(Some(TokenPair::new("stale", "r")), Some("also-rejected"));
        let gate = TokenGate::new("never");
        let svc = h.layer.layer(gate.clone());

        let resp = svc.oneshot(get("/user/profile")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(gate.seen().len(), 2);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
        assert!(h.store.get_refresh_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_original_failure() {
        let h = harness(Some(TokenPair::new("stale", "r")), None);
        let gate = TokenGate::new("fresh");
        let svc = h.layer.layer(gate.clone());

        let resp = svc.oneshot(get("/user/profile")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(gate.seen().len(), 1);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
        assert!(h.store.get_access_token().await.unwrap().is_none());
    }

    // -- non-recoverable endpoints --------------------------------------------

    #[tokio::test]
    async fn login_401_is_not_recovered() {
        let h = harness(Some(TokenPair::new("stale", "r")), Some("fresh"));
        let gate = TokenGate::new("fresh");
        let svc = h.layer.layer(gate.clone());

        let resp = svc.oneshot(get("/auth/login")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn login_timeout_is_recovered() {
        let h = harness(Some(TokenPair::new("stale", "r")), Some("fresh"));
        let gate = TokenGate::new("fresh");
        gate.time_out_first.store(1, Ordering::SeqCst);
        let svc = h.layer.layer(gate.clone());

        let resp = svc.oneshot(get("/auth/login")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn login_rejected_after_refresh_keeps_session() {
        let h = harness(Some(TokenPair::new("stale", "r")), Some("fresh"));
        let gate = TokenGate::new("other");
        gate.time_out_first.store(1, Ordering::SeqCst);
        let svc = h.layer.layer(gate.clone());

        let resp = svc.oneshot(get("/auth/login")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(gate.seen().len(), 2);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 0);
        let access = h.store.get_access_token().await.unwrap();
        assert_eq!(access.map(|t| t.expose_secret().to_owned()).as_deref(), Some("fresh"));
        assert!(h.store.get_refresh_token().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn retry_timeout_is_final() {
        let h = harness(Some(TokenPair::new("stale", "r")), Some("fresh"));
        let gate = TokenGate::new("fresh");
        gate.time_out_first.store(2, Ordering::SeqCst);
        let svc = h.layer.layer(gate.clone());

        let err = svc.oneshot(get("/user/profile")).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(gate.seen().len(), 2);
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
        assert!(h.store.get_access_token().await.unwrap().is_none());
        assert!(h.store.get_refresh_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_timeout_twice_invalidates() {
        let h = harness(Some(TokenPair::new("stale", "r")), Some("fresh"));
        let gate = TokenGate::new("fresh");
        gate.time_out_first.store(2, Ordering::SeqCst);
        let svc = h.layer.layer(gate.clone());

        let err = svc.oneshot(get("/auth/login")).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_exchange_is_never_recovered() {
        let h = harness(Some(TokenPair::new("stale", "r")), Some("fresh"));
        let gate = TokenGate::new("fresh");
        gate.time_out_first.store(1, Ordering::SeqCst);
        let svc = h.layer.layer(gate.clone());

        let err = svc.oneshot(get("/auth/refresh")).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 0);
    }

    // -- misc -----------------------------------------------------------------

    #[tokio::test]
    async fn replay_keeps_method_and_body() {
        #[derive(Clone, Default)]
        struct BodyEcho {
            bodies: Arc<Mutex<Vec<(http::Method, Bytes)>>>,
        }

        impl Service<Request<Full<Bytes>>> for BodyEcho {
            type Response = Response<Full<Bytes>>;
            type Error = HttpError;
            type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

            fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
                let bodies = self.bodies.clone();
                Box::pin(async move {
                    use http_body_util::BodyExt;
                    let method = req.method().clone();
                    let bytes = req.into_body().collect().await.unwrap().to_bytes();
                    let first = {
                        let mut guard = bodies.lock();
                        guard.push((method, bytes));
                        guard.len() == 1
                    };
                    let status = if first { StatusCode::UNAUTHORIZED } else { StatusCode::OK };
                    Ok(Response::builder()
                        .status(status)
                        .body(Full::new(Bytes::new()))
                        .unwrap())
                })
            }
        }

        let h = harness(Some(TokenPair::new("stale", "r")), Some("fresh"));
        let echo = BodyEcho::default();
        let svc = h.layer.layer(echo.clone());
        let req = Request::builder()
            .method(http::Method::PATCH)
            .uri("http://api.test/user/update-profile")
            .body(Full::new(Bytes::from_static(b"{\"name\":\"A\"}")))
            .unwrap();

        svc.oneshot(req).await.unwrap();

        let bodies = echo.bodies.lock().clone();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0], bodies[1]);
        assert_eq!(bodies[1].0, http::Method::PATCH);
    }

    #[test]
    fn bearer_value_is_sensitive() {
        let value = bearer_value(&SecretString::from("abc")).unwrap();
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().unwrap(), "Bearer abc");
    }

    #[test]
    fn layer_debug_hides_store() {
        let h = harness(Some(TokenPair::new("top-secret", "r")), None);
        let dbg = format!("{:?}", h.layer);
        assert!(!dbg.contains("top-secret"));
    }
}
