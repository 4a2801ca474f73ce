//! Persisted access/refresh token pair.
//!
//! The pipeline reads the access token on every request; only the refresh
//! coordinator, explicit login/logout and session invalidation write.

mod file;
mod memory;

use std::fmt;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::CredentialStoreError;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

/// Access and refresh token written together.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Asynchronous token storage.
///
/// Each operation is atomic on its own. [`set_tokens`](Self::set_tokens)
/// writes both tokens as a single step; readers never observe a new access
/// token next to an old refresh token.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_access_token(&self) -> Result<Option<SecretString>, CredentialStoreError>;

    async fn get_refresh_token(&self) -> Result<Option<SecretString>, CredentialStoreError>;

    async fn set_access_token(&self, token: SecretString) -> Result<(), CredentialStoreError>;

    async fn set_refresh_token(&self, token: SecretString) -> Result<(), CredentialStoreError>;

    /// Replace both tokens at once.
    async fn set_tokens(&self, tokens: TokenPair) -> Result<(), CredentialStoreError>;

    /// Drop the access token, keeping the refresh token.
    async fn remove_access_token(&self) -> Result<(), CredentialStoreError>;

    /// Drop both tokens.
    async fn clear_all(&self) -> Result<(), CredentialStoreError>;
}
