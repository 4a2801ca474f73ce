use crate::client::{ApiClient, fetch_unit, fetch_unwrapped};
use crate::error::ApiError;
use crate::models::{ChangePasswordPayload, UpdateProfilePayload, UserProfile};

const PROFILE: &str = "/user/profile";
const UPDATE_PROFILE: &str = "/user/update-profile";
const CHANGE_PASSWORD: &str = "/user/change-password";
const DEACTIVATE: &str = "/user/deactivate";

/// `/user/*` endpoints of the signed-in user.
#[derive(Debug, Clone, Copy)]
pub struct UserApi<'a> {
    client: &'a ApiClient,
}

impl<'a> UserApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// The profile, bare or wrapped as `{ "user": ... }`.
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] on rejection, [`ApiError::Decode`] for an
    /// unexpected body.
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        fetch_unwrapped(self.client.get(PROFILE)?, PROFILE, "user").await
    }

    /// Patch the profile and return the updated one.
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidInput`] for an empty patch, otherwise as
    /// [`profile`](Self::profile).
    pub async fn update_profile(
        &self,
        patch: &UpdateProfilePayload,
    ) -> Result<UserProfile, ApiError> {
        if patch.is_empty() {
            return Err(ApiError::InvalidInput("profile update has no fields".into()));
        }
        let req = self.client.patch(UPDATE_PROFILE)?.json(patch)?;
        fetch_unwrapped(req, UPDATE_PROFILE, "user").await
    }

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn change_password(&self, payload: &ChangePasswordPayload) -> Result<(), ApiError> {
        fetch_unit(self.client.post(CHANGE_PASSWORD)?.json(payload)?).await
    }

    /// Deactivate the signed-in account. The caller should log out afterward.
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn deactivate(&self) -> Result<(), ApiError> {
        fetch_unit(self.client.post(DEACTIVATE)?).await
    }
}
