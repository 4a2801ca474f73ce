use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use zeroize::{Zeroize, Zeroizing};

use super::{CredentialStore, TokenPair};
use crate::error::CredentialStoreError;

/// On-disk document. Wiped from memory when dropped.
#[derive(Default, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
#[serde(rename_all = "camelCase")]
struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// JSON file store: `{ "accessToken": "...", "refreshToken": "..." }`.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash never leaves a half-written document. On Unix the file is created
/// with mode `0600`. A missing file reads as "no tokens".
///
/// Read-modify-write operations are serialized within the process; other
/// processes sharing the file are not coordinated.
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn io_error(&self, source: std::io::Error) -> CredentialStoreError {
        CredentialStoreError::Io {
            path: self.display_path(),
            source,
        }
    }

    async fn load(&self) -> Result<StoredCredentials, CredentialStoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => Zeroizing::new(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredCredentials::default()),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_slice(&raw).map_err(|source| CredentialStoreError::Corrupt {
            path: self.display_path(),
            source,
        })
    }

    async fn save(&self, doc: &StoredCredentials) -> Result<(), CredentialStoreError> {
        let bytes = Zeroizing::new(serde_json::to_vec(doc).map_err(CredentialStoreError::Encode)?);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let tmp = self.temp_path();
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp).await.map_err(|e| self.io_error(e))?;
        file.write_all(&bytes).await.map_err(|e| self.io_error(e))?;
        file.sync_all().await.map_err(|e| self.io_error(e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn update(
        &self,
        apply: impl FnOnce(&mut StoredCredentials) + Send,
    ) -> Result<(), CredentialStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        apply(&mut doc);
        self.save(&doc).await
    }
}

impl std::fmt::Debug for FileCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCredentialStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get_access_token(&self) -> Result<Option<SecretString>, CredentialStoreError> {
        let mut doc = self.load().await?;
        Ok(doc.access_token.take().map(SecretString::from))
    }

    async fn get_refresh_token(&self) -> Result<Option<SecretString>, CredentialStoreError> {
        let mut doc = self.load().await?;
        Ok(doc.refresh_token.take().map(SecretString::from))
    }

    async fn set_access_token(&self, token: SecretString) -> Result<(), CredentialStoreError> {
        self.update(|doc| doc.access_token = Some(token.expose_secret().to_owned()))
            .await
    }

    async fn set_refresh_token(&self, token: SecretString) -> Result<(), CredentialStoreError> {
        self.update(|doc| doc.refresh_token = Some(token.expose_secret().to_owned()))
            .await
    }

    async fn set_tokens(&self, tokens: TokenPair) -> Result<(), CredentialStoreError> {
        let _guard = self.write_lock.lock().await;
        let doc = StoredCredentials {
            access_token: Some(tokens.access_token.expose_secret().to_owned()),
            refresh_token: Some(tokens.refresh_token.expose_secret().to_owned()),
        };
        self.save(&doc).await
    }

    async fn remove_access_token(&self) -> Result<(), CredentialStoreError> {
        self.update(|doc| doc.access_token.zeroize()).await
    }

    async fn clear_all(&self) -> Result<(), CredentialStoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
