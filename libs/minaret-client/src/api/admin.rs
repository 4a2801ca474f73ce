use crate::client::{ApiClient, fetch_json, fetch_unit, fetch_unwrapped};
use crate::error::ApiError;
use crate::models::{
    AdminRole, AdminUser, AssignRoleRequest, DashboardStats, RoleNameRequest, SessionInfo,
};

const HEALTHY: &str = "/admin/healthy";
const DASHBOARD: &str = "/admin/dashboard";
const USERS: &str = "/admin/users";
const ROLES: &str = "/admin/roles";

/// `/admin/*` endpoints. Require an admin role server-side.
#[derive(Debug, Clone, Copy)]
pub struct AdminApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AdminApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    /// Returns [`ApiError::Http`] when the admin surface is unreachable or
    /// the caller lacks access.
    pub async fn healthy(&self) -> Result<(), ApiError> {
        fetch_unit(self.client.get(HEALTHY)?).await
    }

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection, [`ApiError::Decode`] for an
    /// unexpected body.
    pub async fn dashboard(&self) -> Result<DashboardStats, ApiError> {
        fetch_json(self.client.get(DASHBOARD)?, DASHBOARD).await
    }

    // -- users ----------------------------------------------------------------

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection, [`ApiError::Decode`] for an
    /// unexpected body.
    pub async fn list_users(&self) -> Result<Vec<AdminUser>, ApiError> {
        fetch_unwrapped(self.client.get(USERS)?, USERS, "users").await
    }

    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for an unusable id, otherwise as
    /// [`list_users`](Self::list_users).
    pub async fn get_user(&self, user_id: &str) -> Result<AdminUser, ApiError> {
        let path = user_path(user_id, "")?;
        fetch_unwrapped(self.client.get(&path)?, &path, "user").await
    }

    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for an unusable id, [`ApiError::Http`]
    /// on rejection.
    pub async fn activate_user(&self, user_id: &str) -> Result<(), ApiError> {
        fetch_unit(self.client.post(&user_path(user_id, "/activate")?)?).await
    }

    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for an unusable id, [`ApiError::Http`]
    /// on rejection.
    pub async fn deactivate_user(&self, user_id: &str) -> Result<(), ApiError> {
        fetch_unit(self.client.post(&user_path(user_id, "/deactivate")?)?).await
    }

    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for an unusable id, otherwise as
    /// [`list_users`](Self::list_users).
    pub async fn list_user_sessions(&self, user_id: &str) -> Result<Vec<SessionInfo>, ApiError> {
        let path = user_path(user_id, "/sessions")?;
        fetch_unwrapped(self.client.get(&path)?, &path, "sessions").await
    }

    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for an unusable id, [`ApiError::Http`]
    /// on rejection.
    pub async fn revoke_all_sessions(&self, user_id: &str) -> Result<(), ApiError> {
        fetch_unit(self.client.post(&user_path(user_id, "/sessions/revoke-all")?)?).await
    }

    // -- roles ----------------------------------------------------------------

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection, [`ApiError::Decode`] for an
    /// unexpected body.
    pub async fn list_roles(&self) -> Result<Vec<AdminRole>, ApiError> {
        fetch_unwrapped(self.client.get(ROLES)?, ROLES, "roles").await
    }

    /// Create a role. The name is trimmed and lower-cased first.
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for a blank name, [`ApiError::Http`]
    /// on rejection.
    pub async fn create_role(&self, name: &str) -> Result<(), ApiError> {
        let body = RoleNameRequest {
            name: normalize_role_name(name)?,
        };
        fetch_unit(self.client.post(ROLES)?.json(&body)?).await
    }

    /// Rename a role. The name is trimmed and lower-cased first.
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for a blank name or unusable id,
    /// [`ApiError::Http`] on rejection.
    pub async fn update_role(&self, role_id: &str, name: &str) -> Result<(), ApiError> {
        let body = RoleNameRequest {
            name: normalize_role_name(name)?,
        };
        let path = format!("{ROLES}/{}", path_segment(role_id)?);
        fetch_unit(self.client.patch(&path)?.json(&body)?).await
    }

    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for an unusable id, [`ApiError::Http`]
    /// on rejection.
    pub async fn delete_role(&self, role_id: &str) -> Result<(), ApiError> {
        let path = format!("{ROLES}/{}", path_segment(role_id)?);
        fetch_unit(self.client.delete(&path)?).await
    }

    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for an unusable id, [`ApiError::Http`]
    /// on rejection.
    pub async fn assign_role(&self, user_id: &str, role_id: &str) -> Result<(), ApiError> {
        let body = AssignRoleRequest {
            role_id: path_segment(role_id)?,
        };
        let path = user_path(user_id, "/roles")?;
        fetch_unit(self.client.post(&path)?.json(&body)?).await
    }

    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for an unusable id, [`ApiError::Http`]
    /// on rejection.
    pub async fn remove_role(&self, user_id: &str, role_id: &str) -> Result<(), ApiError> {
        let path = user_path(user_id, &format!("/roles/{}", path_segment(role_id)?))?;
        fetch_unit(self.client.delete(&path)?).await
    }
}

fn normalize_role_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("role name must not be blank".into()));
    }
    Ok(name)
}

/// Reject ids that would change the request path.
fn path_segment(id: &str) -> Result<&str, ApiError> {
    if id.is_empty() || id.contains(['/', '?', '#', '%']) || id.chars().any(char::is_whitespace) {
        return Err(ApiError::InvalidInput(format!("invalid id '{id}'")));
    }
    Ok(id)
}

fn user_path(user_id: &str, suffix: &str) -> Result<String, ApiError> {
    Ok(format!("{USERS}/{}{suffix}", path_segment(user_id)?))
}
