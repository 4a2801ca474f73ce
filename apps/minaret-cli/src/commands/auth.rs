use anyhow::{Context as _, Result, bail};
use clap::Args;
use minaret_auth::SecretString;
use serde_json::{Value, json};

use super::{Context, api_failure};

const PASSWORD_ENV: &str = "MINARET_PASSWORD";

#[derive(Args)]
pub struct LoginArgs {
    /// Account e-mail
    #[arg(long)]
    email: String,

    /// Account password
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    password: Option<String>,
}

impl LoginArgs {
    pub async fn run(&self, ctx: &Context) -> Result<Value> {
        let password = self
            .password
            .clone()
            .map(SecretString::from)
            .with_context(|| format!("a password is required: pass --password or set {PASSWORD_ENV}"))?;

        let user = ctx
            .session()
            .login(&self.email, password)
            .await
            .map_err(|e| api_failure("login failed", e))?;
        tracing::info!(user_id = %user.id, "logged in");

        Ok(json!({ "user": user }))
    }
}

pub async fn logout(ctx: &Context) -> Result<Value> {
    ctx.session()
        .logout()
        .await
        .context("failed to clear stored credentials")?;
    Ok(json!({ "loggedOut": true }))
}

pub async fn refresh(ctx: &Context) -> Result<Value> {
    ctx.require_credentials().await?;
    if ctx.session().refresh_tokens().await.is_none() {
        bail!("token refresh failed; stored credentials were cleared, log in again");
    }
    Ok(json!({ "refreshed": true }))
}
