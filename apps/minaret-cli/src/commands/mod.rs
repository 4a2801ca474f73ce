use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow, bail};
use clap::Subcommand;
use minaret_auth::{CredentialStore, FileCredentialStore};
use minaret_client::{ApiError, Session};
use serde_json::Value;

use crate::config::AppConfig;

mod account;
mod auth;

#[derive(Subcommand)]
pub enum Command {
    /// Sign in and store the token pair
    Login(auth::LoginArgs),
    /// Notify the backend and forget stored credentials
    Logout,
    /// Show the signed-in user, refreshing tokens if needed
    Whoami,
    /// List active sessions of the signed-in user
    Sessions,
    /// Exchange the stored refresh token for a new pair
    Refresh,
    /// Report stored credential state without calling the backend
    Status,
}

impl Command {
    /// Run the command; the returned value is printed as JSON.
    pub async fn run(&self, ctx: &Context) -> Result<Value> {
        match self {
            Command::Login(args) => args.run(ctx).await,
            Command::Logout => auth::logout(ctx).await,
            Command::Whoami => account::whoami(ctx).await,
            Command::Sessions => account::sessions(ctx).await,
            Command::Refresh => auth::refresh(ctx).await,
            Command::Status => account::status(ctx).await,
        }
    }
}

/// Everything a command needs: the session over the file store.
pub struct Context {
    config: AppConfig,
    credentials_path: PathBuf,
    session: Session,
}

impl Context {
    pub fn open(config: AppConfig) -> Result<Self> {
        let credentials_path = config.credentials_path()?;
        let store: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(&credentials_path));
        let session = Session::connect(config.client_config(), store)
            .context("failed to build the API client")?;
        tracing::debug!(
            base_url = %config.api.base_url,
            credentials = %credentials_path.display(),
            "session opened"
        );
        Ok(Self {
            config,
            credentials_path,
            session,
        })
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn store(&self) -> &Arc<dyn CredentialStore> {
        self.session.api().store()
    }

    fn config(&self) -> &AppConfig {
        &self.config
    }

    fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Fail early when neither token is stored.
    async fn require_credentials(&self) -> Result<()> {
        let store = self.store();
        let has_access = store
            .get_access_token()
            .await
            .context("failed to read stored credentials")?
            .is_some();
        let has_refresh = store
            .get_refresh_token()
            .await
            .context("failed to read stored credentials")?
            .is_some();
        if !has_access && !has_refresh {
            bail!("not logged in; run `minaret login`");
        }
        Ok(())
    }
}

/// Prefer the backend's own message over the raw status line.
fn api_failure(action: &str, err: ApiError) -> anyhow::Error {
    match err.server_message() {
        Some(message) => anyhow!("{action}: {message}"),
        None => anyhow::Error::new(err).context(action.to_owned()),
    }
}
