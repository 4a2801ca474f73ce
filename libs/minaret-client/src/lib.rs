#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Typed client for the Minaret backend.
//!
//! - [`ApiClient`] wraps a pipeline-enabled transport and exposes the
//!   backend's surfaces as [`AuthApi`], [`UserApi`] and [`AdminApi`].
//! - [`Session`] drives login, logout and startup hydration, and publishes
//!   [`AuthState`] to any number of observers.
//!
//! ```ignore
//! let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(path));
//! let session = Session::connect(ApiClientConfig::new(base_url), store)?;
//!
//! if !session.hydrate().await.is_authenticated {
//!     session.login(&email, password).await?;
//! }
//! let sessions = session.api().auth().sessions().await?;
//! ```

mod api;
mod client;
mod config;
mod error;
pub mod models;
mod session;

#[cfg(test)]
mod test_support;

pub use api::{AdminApi, AuthApi, UserApi};
pub use client::{ApiClient, ApiClientBuilder};
pub use config::ApiClientConfig;
pub use error::ApiError;
pub use models::{AuthUser, SessionInfo, UserProfile};
pub use session::{AuthState, Session, SessionState};
