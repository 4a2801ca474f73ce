use anyhow::{Context as _, Result, bail};
use serde_json::{Value, json};

use super::{Context, api_failure};

/// Hydrate the session and print the user. Fails when not signed in.
pub async fn whoami(ctx: &Context) -> Result<Value> {
    let state = ctx.session().hydrate().await;
    match state.user {
        Some(user) if state.is_authenticated => Ok(json!({ "user": user })),
        _ => bail!("not logged in; run `minaret login`"),
    }
}

pub async fn sessions(ctx: &Context) -> Result<Value> {
    ctx.require_credentials().await?;
    let sessions = ctx
        .session()
        .api()
        .auth()
        .sessions()
        .await
        .map_err(|e| api_failure("failed to list sessions", e))?;
    Ok(json!({ "sessions": sessions }))
}

/// Offline view of the stored credentials.
pub async fn status(ctx: &Context) -> Result<Value> {
    let store = ctx.store();
    let has_access_token = store
        .get_access_token()
        .await
        .context("failed to read stored credentials")?
        .is_some();
    let has_refresh_token = store
        .get_refresh_token()
        .await
        .context("failed to read stored credentials")?
        .is_some();

    Ok(json!({
        "baseUrl": ctx.config().api.base_url.as_str(),
        "credentials": ctx.credentials_path().display().to_string(),
        "hasAccessToken": has_access_token,
        "hasRefreshToken": has_refresh_token,
    }))
}
