//! Wire types of the Minaret backend. All bodies are camelCase JSON.
//!
//! Passwords, one-time codes and tokens are held as [`SecretString`] and
//! redacted from `Debug`.

use std::collections::BTreeMap;
use std::fmt;

use minaret_auth::{ExposeSecret, SecretString, TokenPair};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

// -- users --------------------------------------------------------------------

/// Signed-in user as returned by login and the profile endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl AuthUser {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    /// `"First Last"`, or the email when no name is set.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }
}

/// The profile endpoints return the same shape as [`AuthUser`].
pub type UserProfile = AuthUser;

// -- auth ---------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Answer of `/auth/login` and `/auth/register`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: AuthUser,
    #[serde(deserialize_with = "secret")]
    pub access_token: SecretString,
    #[serde(deserialize_with = "secret")]
    pub refresh_token: SecretString,
}

pub type AuthResponse = LoginResponse;

impl LoginResponse {
    /// Split into the user and the token pair to persist.
    #[must_use]
    pub fn into_parts(self) -> (AuthUser, TokenPair) {
        let tokens = TokenPair::new(
            self.access_token.expose_secret(),
            self.refresh_token.expose_secret(),
        );
        (self.user, tokens)
    }
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("user", &self.user)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    #[serde(serialize_with = "expose")]
    pub new_password: SecretString,
}

impl fmt::Debug for ResetPasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetPasswordRequest")
            .field("email", &self.email)
            .field("otp", &"[REDACTED]")
            .field("new_password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEmailRequest {
    pub new_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEmailConfirmRequest {
    pub otp: String,
    pub new_email: String,
}

/// One signed-in device or browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RevokeSessionRequest<'a> {
    pub session_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LogoutRequest<'a> {
    pub refresh_token: &'a str,
}

// -- user ---------------------------------------------------------------------

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UpdateProfilePayload {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.phone.is_none()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    #[serde(serialize_with = "expose")]
    pub current_password: SecretString,
    #[serde(serialize_with = "expose")]
    pub new_password: SecretString,
}

impl fmt::Debug for ChangePasswordPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangePasswordPayload { .. }")
    }
}

// -- admin --------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRole {
    pub id: String,
    pub name: String,
}

/// Admin dashboard counters. Unknown counters land in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_sessions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_count: Option<u64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RoleNameRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssignRoleRequest<'a> {
    pub role_id: &'a str,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auth_user_tolerates_missing_optionals() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@b.c"
        }))
        .unwrap();

        assert!(!user.email_verified);
        assert!(user.roles.is_empty());
        assert_eq!(user.display_name(), "a@b.c");
    }

    #[test]
    fn auth_user_roles_are_case_insensitive() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@b.c",
            "emailVerified": true,
            "roles": ["Admin", "user"],
            "firstName": "Amina",
            "lastName": "Yusuf"
        }))
        .unwrap();

        assert!(user.is_admin());
        assert!(user.has_role("USER"));
        assert_eq!(user.display_name(), "Amina Yusuf");
    }

    #[test]
    fn login_request_serializes_password_but_hides_it_in_debug() {
        let req = LoginRequest {
            email: "a@b.c".into(),
            password: SecretString::from("hunter2"),
        };

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body, json!({"email": "a@b.c", "password": "hunter2"}));
        assert!(!format!("{req:?}").contains("hunter2"));
    }

    #[test]
    fn login_response_splits_into_token_pair() {
        let resp: LoginResponse = serde_json::from_value(json!({
            "user": {"id": "u1", "email": "a@b.c"},
            "accessToken": "acc",
            "refreshToken": "ref"
        }))
        .unwrap();
        let debug = format!("{resp:?}");
        assert!(!debug.contains("\"acc\""));
        assert!(!debug.contains("\"ref\""));

        let (user, tokens) = resp.into_parts();
        assert_eq!(user.id, "u1");
        assert_eq!(tokens.access_token.expose_secret(), "acc");
        assert_eq!(tokens.refresh_token.expose_secret(), "ref");
    }

    #[test]
    fn update_profile_omits_unset_fields() {
        let patch = UpdateProfilePayload {
            phone: Some("+90 555".into()),
            ..UpdateProfilePayload::default()
        };
        assert!(!patch.is_empty());
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"phone": "+90 555"}));
        assert!(UpdateProfilePayload::default().is_empty());
    }

    #[test]
    fn dashboard_keeps_unknown_counters() {
        let stats: DashboardStats = serde_json::from_value(json!({
            "userCount": 12,
            "activeSessions": 3,
            "pendingVerifications": 2
        }))
        .unwrap();

        assert_eq!(stats.user_count, Some(12));
        assert_eq!(stats.admin_count, None);
        assert_eq!(stats.other.get("pendingVerifications"), Some(&json!(2)));
    }

    #[test]
    fn session_info_defaults_is_current() {
        let s: SessionInfo = serde_json::from_value(json!({"id": "s1"})).unwrap();
        assert!(!s.is_current);
    }
}
