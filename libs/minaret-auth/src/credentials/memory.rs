use async_trait::async_trait;
use parking_lot::RwLock;
use secrecy::SecretString;

use super::{CredentialStore, TokenPair};
use crate::error::CredentialStoreError;

#[derive(Default)]
struct Slots {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

/// Process-local store. Both tokens sit behind one lock.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slots: RwLock<Slots>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `tokens`.
    #[must_use]
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            slots: RwLock::new(Slots {
                access: Some(tokens.access_token),
                refresh: Some(tokens.refresh_token),
            }),
        }
    }
}

impl std::fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.read();
        f.debug_struct("MemoryCredentialStore")
            .field("has_access_token", &slots.access.is_some())
            .field("has_refresh_token", &slots.refresh.is_some())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_access_token(&self) -> Result<Option<SecretString>, CredentialStoreError> {
        Ok(self.slots.read().access.clone())
    }

    async fn get_refresh_token(&self) -> Result<Option<SecretString>, CredentialStoreError> {
        Ok(self.slots.read().refresh.clone())
    }

    async fn set_access_token(&self, token: SecretString) -> Result<(), CredentialStoreError> {
        self.slots.write().access = Some(token);
        Ok(())
    }

    async fn set_refresh_token(&self, token: SecretString) -> Result<(), CredentialStoreError> {
        self.slots.write().refresh = Some(token);
        Ok(())
    }

    async fn set_tokens(&self, tokens: TokenPair) -> Result<(), CredentialStoreError> {
        let mut slots = self.slots.write();
        slots.access = Some(tokens.access_token);
        slots.refresh = Some(tokens.refresh_token);
        Ok(())
    }

    async fn remove_access_token(&self) -> Result<(), CredentialStoreError> {
        self.slots.write().access = None;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CredentialStoreError> {
        *self.slots.write() = Slots::default();
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn exposed(token: Option<SecretString>) -> Option<String> {
        token.map(|t| t.expose_secret().to_owned())
    }

    #[tokio::test]
    async fn starts_empty() {
        let store = MemoryCredentialStore::new();
        assert!(store.get_access_token().await.unwrap().is_none());
        assert!(store.get_refresh_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_tokens_replaces_both() {
        let store = MemoryCredentialStore::with_tokens(TokenPair::new("a1", "r1"));
        store.set_tokens(TokenPair::new("a2", "r2")).await.unwrap();

        assert_eq!(exposed(store.get_access_token().await.unwrap()).as_deref(), Some("a2"));
        assert_eq!(exposed(store.get_refresh_token().await.unwrap()).as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn remove_access_keeps_refresh() {
        let store = MemoryCredentialStore::with_tokens(TokenPair::new("a1", "r1"));
        store.remove_access_token().await.unwrap();

        assert!(store.get_access_token().await.unwrap().is_none());
        assert_eq!(exposed(store.get_refresh_token().await.unwrap()).as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn clear_all_drops_everything() {
        let store = MemoryCredentialStore::with_tokens(TokenPair::new("a1", "r1"));
        store.clear_all().await.unwrap();

        assert!(store.get_access_token().await.unwrap().is_none());
        assert!(store.get_refresh_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn individual_setters() {
        let store = MemoryCredentialStore::new();
        store.set_access_token(SecretString::from("a")).await.unwrap();
        store.set_refresh_token(SecretString::from("r")).await.unwrap();

        assert_eq!(exposed(store.get_access_token().await.unwrap()).as_deref(), Some("a"));
        assert_eq!(exposed(store.get_refresh_token().await.unwrap()).as_deref(), Some("r"));
    }

    #[test]
    fn debug_reports_presence_only() {
        let store = MemoryCredentialStore::with_tokens(TokenPair::new("secret-a", "secret-r"));
        let dbg = format!("{store:?}");
        assert!(dbg.contains("has_access_token: true"));
        assert!(!dbg.contains("secret-a"));
    }
}
