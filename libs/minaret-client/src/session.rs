//! Logged-in state on top of [`ApiClient`].
//!
//! [`Session`] owns the login lifecycle (hydrate, login, logout, profile
//! refresh). [`SessionState`] publishes [`AuthState`] through a
//! `tokio::sync::watch` channel and doubles as the pipeline's
//! [`SessionInvalidationHandler`], so an unrecoverable session drops the
//! state to logged out no matter which call noticed it.

use std::sync::Arc;

use async_trait::async_trait;
use minaret_auth::{CredentialStore, SecretString, SessionInvalidationHandler};
use tokio::sync::watch;

use crate::client::ApiClient;
use crate::config::ApiClientConfig;
use crate::error::ApiError;
use crate::models::{AuthUser, LoginRequest};

/// Snapshot of the logged-in state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub is_authenticated: bool,
    /// Set once stored credentials have been examined at startup.
    pub hydrated: bool,
}

impl AuthState {
    fn logged_out() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            hydrated: true,
        }
    }
}

/// Observable auth state plus the invalidation reaction.
pub struct SessionState {
    store: Arc<dyn CredentialStore>,
    tx: watch::Sender<AuthState>,
}

impl SessionState {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (tx, _rx) = watch::channel(AuthState::default());
        Self { store, tx }
    }

    #[must_use]
    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    fn publish(&self, state: AuthState) {
        self.tx.send_replace(state);
    }

    fn publish_logged_out(&self) {
        self.publish(AuthState::logged_out());
    }

    fn publish_user(&self, user: AuthUser) {
        self.tx.send_modify(|state| {
            state.user = Some(user);
            state.is_authenticated = true;
        });
    }

    async fn clear_credentials(&self) {
        if let Err(e) = self.store.clear_all().await {
            tracing::warn!(error = %e, "failed to clear stored credentials");
        }
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("state", &*self.tx.borrow())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionInvalidationHandler for SessionState {
    async fn on_session_invalidated(&self) {
        tracing::warn!("session invalidated; signing out");
        self.clear_credentials().await;
        self.tx.send_modify(|state| {
            state.user = None;
            state.is_authenticated = false;
        });
    }
}

/// Login lifecycle of one user against one backend.
///
/// ```ignore
/// let session = Session::connect(config, store)?;
/// let mut changes = session.subscribe();
/// session.hydrate().await;
/// if !session.state().is_authenticated {
///     session.login("a@b.c", SecretString::from(password)).await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    api: ApiClient,
    state: Arc<SessionState>,
}

impl Session {
    /// Build the API client with this session as its invalidation handler.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] or [`ApiError::Http`] if the client
    /// cannot be built.
    pub fn connect(
        config: ApiClientConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let state = Arc::new(SessionState::new(store.clone()));
        let handler: Arc<dyn SessionInvalidationHandler> = state.clone();
        let api = ApiClient::builder(config, store)
            .on_session_invalidated(handler)
            .build()?;
        Ok(Self { api, state })
    }

    /// Pair an already built client with its state. `api` should have been
    /// built with `state` as its invalidation handler.
    #[must_use]
    pub fn from_parts(api: ApiClient, state: Arc<SessionState>) -> Self {
        Self { api, state }
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.current()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn store(&self) -> &Arc<dyn CredentialStore> {
        self.api.store()
    }

    /// Restore the session from stored credentials.
    ///
    /// - nothing stored: logged out;
    /// - only a refresh token: one refresh, logged out if it fails;
    /// - an access token: fetch the profile, logged out (and credentials
    ///   cleared) if that fails for any reason.
    ///
    /// Always ends with `hydrated` set.
    pub async fn hydrate(&self) -> AuthState {
        let (access, refresh) = match self.read_tokens().await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "hydrate: reading credentials failed");
                return self.sign_out_locally().await;
            }
        };
        tracing::debug!(
            has_access_token = access.is_some(),
            has_refresh_token = refresh.is_some(),
            "hydrate: stored credentials"
        );

        let access = match (access, refresh) {
            (None, None) => {
                self.state.publish_logged_out();
                return self.state();
            }
            (None, Some(_)) => {
                tracing::info!("hydrate: only a refresh token is stored; refreshing");
                self.api.coordinator().ensure_fresh_token().await
            }
            (access, _) => access,
        };
        if access.is_none() {
            tracing::info!("hydrate: refresh failed; signing out");
            return self.sign_out_locally().await;
        }

        match self.api.user().profile().await {
            Ok(user) => {
                self.state.publish(AuthState {
                    user: Some(user),
                    is_authenticated: true,
                    hydrated: true,
                });
                self.state()
            }
            Err(e) if e.is_unauthorized() => {
                tracing::info!("hydrate: profile rejected with 401; signing out");
                self.sign_out_locally().await
            }
            Err(e) => {
                tracing::warn!(error = %e, "hydrate: profile fetch failed; signing out");
                self.sign_out_locally().await
            }
        }
    }

    /// Log in with email and password.
    ///
    /// Stores the returned token pair, then fetches the full profile, falling
    /// back to the user from the login answer if that fails.
    ///
    /// # Errors
    /// Returns the login rejection ([`ApiError::Http`]) or a store failure.
    pub async fn login(&self, email: &str, password: SecretString) -> Result<AuthUser, ApiError> {
        let response = self
            .api
            .auth()
            .login(&LoginRequest {
                email: email.to_owned(),
                password,
            })
            .await?;
        let (login_user, tokens) = response.into_parts();
        self.store().set_tokens(tokens).await?;
        tracing::info!(user_id = %login_user.id, "logged in");

        let user = match self.api.user().profile().await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::debug!(error = %e, "profile after login failed; using login user");
                login_user
            }
        };
        self.state.publish_user(user.clone());
        Ok(user)
    }

    /// Log out: notify the backend if possible, then clear local state.
    ///
    /// The backend notification is best effort. Local credentials are
    /// always cleared.
    ///
    /// # Errors
    /// Returns [`ApiError::Store`] if clearing stored credentials fails; the
    /// published state is logged out either way.
    pub async fn logout(&self) -> Result<(), ApiError> {
        match self.store().get_refresh_token().await {
            Ok(Some(refresh_token)) => {
                if let Err(e) = self.api.auth().logout(&refresh_token).await {
                    tracing::debug!(error = %e, "logout notification failed; ignoring");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "logout: refresh token unreadable"),
        }

        let cleared = self.store().clear_all().await;
        self.state.publish_logged_out();
        tracing::info!("logged out");
        cleared.map_err(ApiError::from)
    }

    /// Refetch the profile. A no-op without an access token; failures are
    /// logged and leave the state untouched.
    pub async fn refresh_user(&self) -> Option<AuthUser> {
        match self.store().get_access_token().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!("refresh_user: no access token; skipping");
                return None;
            }
            Err(e) => {
                tracing::debug!(error = %e, "refresh_user: access token unreadable");
                return None;
            }
        }

        match self.api.user().profile().await {
            Ok(user) => {
                self.state.publish_user(user.clone());
                Some(user)
            }
            Err(e) => {
                tracing::debug!(error = %e, "refresh_user failed");
                None
            }
        }
    }

    /// Force a refresh through the shared coordinator.
    ///
    /// Returns the new access token, or `None` after the coordinator has
    /// cleared credentials; the state is then logged out.
    pub async fn refresh_tokens(&self) -> Option<SecretString> {
        let token = self.api.coordinator().ensure_fresh_token().await;
        if token.is_none() {
            self.state.tx.send_modify(|state| {
                state.user = None;
                state.is_authenticated = false;
            });
        }
        token
    }

    async fn read_tokens(
        &self,
    ) -> Result<(Option<SecretString>, Option<SecretString>), ApiError> {
        let access = self.store().get_access_token().await?;
        let refresh = self.store().get_refresh_token().await?;
        Ok((access, refresh))
    }

    async fn sign_out_locally(&self) -> AuthState {
        self.state.clear_credentials().await;
        self.state.publish_logged_out();
        self.state()
    }
}
