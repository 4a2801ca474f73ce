#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Session authentication for the Minaret client stack.
//!
//! - [`CredentialStore`] persists the access/refresh token pair
//!   ([`MemoryCredentialStore`], [`FileCredentialStore`]).
//! - [`RefreshCoordinator`] runs at most one refresh exchange at a time and
//!   shares its outcome with every concurrent caller.
//! - [`SessionAuthLayer`] attaches the bearer token to outgoing requests and
//!   recovers once from `401`s and timeouts by refreshing and replaying.
//! - [`SessionInvalidationHandler`] hears about sessions that could not be
//!   recovered.
//!
//! ```ignore
//! let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(path));
//! let refresher = Arc::new(HttpTokenRefresher::new(&auth_config)?);
//! let coordinator = RefreshCoordinator::new(store.clone(), refresher);
//!
//! let client = HttpClientBuilder::new()
//!     .with_session_auth(SessionAuthLayer::new(store, coordinator))
//!     .build()?;
//! ```

mod builder_ext;
mod config;
mod credentials;
mod endpoints;
mod error;
mod http_error;
mod invalidation;
mod layer;
mod refresh;

pub use builder_ext::HttpClientBuilderExt;
pub use config::{AuthClientConfig, DEFAULT_REFRESH_TIMEOUT, join_path};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore, TokenPair};
pub use endpoints::{AuthEndpoints, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH};
pub use error::{AuthConfigError, CredentialStoreError, RefreshError};
pub use http_error::format_http_error;
pub use invalidation::SessionInvalidationHandler;
pub use layer::{SessionAuthLayer, SessionAuthService};
pub use refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};

// Re-exported so callers can name token values without a direct dependency.
pub use secrecy::{ExposeSecret, SecretString};
