use http::{HeaderName, HeaderValue};
use minaret_auth::{ExposeSecret, SecretString};
use minaret_http::HttpError;

use crate::client::{ApiClient, fetch_json, fetch_unit, fetch_unwrapped};
use crate::error::ApiError;
use crate::models::{
    AuthResponse, AuthUser, ChangeEmailConfirmRequest, ChangeEmailRequest, EmailRequest,
    LoginRequest, LoginResponse, LogoutRequest, RegisterRequest, ResetPasswordRequest,
    RevokeSessionRequest, SessionInfo, VerifyEmailRequest,
};

const LOGIN: &str = "/auth/login";
const REGISTER: &str = "/auth/register";
const LOGOUT: &str = "/auth/logout";
const ME: &str = "/me";
const VERIFY_EMAIL: &str = "/auth/verify-email";
const RESEND_EMAIL_OTP: &str = "/auth/resend-email-otp";
const FORGOT_PASSWORD: &str = "/auth/forgot-password";
const RESET_PASSWORD: &str = "/auth/reset-password";
const CHANGE_EMAIL_REQUEST: &str = "/auth/change-email/request";
const CHANGE_EMAIL_CONFIRM: &str = "/auth/change-email/confirm";
const SESSIONS: &str = "/auth/sessions";
const REVOKE_SESSION: &str = "/auth/sessions/revoke";
const REVOKE_OTHER_SESSIONS: &str = "/auth/sessions/revoke-others";

/// Header carrying the caller's refresh token on `revoke-others`, so the
/// backend can tell which session to keep.
const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// `/auth/*` endpoints.
#[derive(Debug, Clone, Copy)]
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Exchange credentials for a user and token pair. Tokens are not stored;
    /// [`Session::login`](crate::Session::login) does that.
    ///
    /// A `401` here is surfaced as is, never refreshed.
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let req = self.client.post(LOGIN)?.json(request)?;
        fetch_json(req, LOGIN).await
    }

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let req = self.client.post(REGISTER)?.json(request)?;
        fetch_json(req, REGISTER).await
    }

    /// Revoke `refresh_token` server-side.
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn logout(&self, refresh_token: &SecretString) -> Result<(), ApiError> {
        let body = LogoutRequest {
            refresh_token: refresh_token.expose_secret(),
        };
        fetch_unit(self.client.post(LOGOUT)?.json(&body)?).await
    }

    /// The user the current access token belongs to.
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] on rejection, [`ApiError::Decode`] for an
    /// unexpected body.
    pub async fn me(&self) -> Result<AuthUser, ApiError> {
        fetch_unwrapped(self.client.get(ME)?, ME, "user").await
    }

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn verify_email(&self, request: &VerifyEmailRequest) -> Result<(), ApiError> {
        fetch_unit(self.client.post(VERIFY_EMAIL)?.json(request)?).await
    }

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn resend_email_otp(&self, email: &str) -> Result<(), ApiError> {
        let body = EmailRequest {
            email: email.to_owned(),
        };
        fetch_unit(self.client.post(RESEND_EMAIL_OTP)?.json(&body)?).await
    }

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let body = EmailRequest {
            email: email.to_owned(),
        };
        fetch_unit(self.client.post(FORGOT_PASSWORD)?.json(&body)?).await
    }

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<(), ApiError> {
        fetch_unit(self.client.post(RESET_PASSWORD)?.json(request)?).await
    }

    /// Start an email change; the backend mails a code to `new_email`.
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn change_email_request(&self, new_email: &str) -> Result<(), ApiError> {
        let body = ChangeEmailRequest {
            new_email: new_email.to_owned(),
        };
        fetch_unit(self.client.post(CHANGE_EMAIL_REQUEST)?.json(&body)?).await
    }

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn change_email_confirm(
        &self,
        request: &ChangeEmailConfirmRequest,
    ) -> Result<(), ApiError> {
        fetch_unit(self.client.post(CHANGE_EMAIL_CONFIRM)?.json(request)?).await
    }

    /// Active sessions of the current user.
    ///
    /// # Errors
    /// Returns [`ApiError::Http`] on rejection, [`ApiError::Decode`] for an
    /// unexpected body.
    pub async fn sessions(&self) -> Result<Vec<SessionInfo>, ApiError> {
        fetch_unwrapped(self.client.get(SESSIONS)?, SESSIONS, "sessions").await
    }

    /// # Errors
    /// Returns [`ApiError::Http`] on rejection or transport failure.
    pub async fn revoke_session(&self, session_id: &str) -> Result<(), ApiError> {
        let body = RevokeSessionRequest { session_id };
        fetch_unit(self.client.post(REVOKE_SESSION)?.json(&body)?).await
    }

    /// Revoke every session except the current one.
    ///
    /// The stored refresh token identifies the current session; with none
    /// stored the header is sent empty and the backend decides.
    ///
    /// # Errors
    /// Returns [`ApiError::Store`] if the token cannot be read and
    /// [`ApiError::Http`] on rejection or transport failure.
    pub async fn revoke_other_sessions(&self) -> Result<(), ApiError> {
        let refresh_token = self.client.store().get_refresh_token().await?;
        let value = match &refresh_token {
            Some(token) => HeaderValue::from_str(token.expose_secret()).map_err(HttpError::from)?,
            None => HeaderValue::from_static(""),
        };

        let req = self.client.post(REVOKE_OTHER_SESSIONS)?.header_value(
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
            value,
            true,
        );
        fetch_unit(req).await
    }
}
