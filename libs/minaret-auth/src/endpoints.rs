use http::Uri;

/// Default path of the refresh exchange
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Default primary-authentication path
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";

/// Classifies requests the pipeline must not recover.
///
/// Matching is a suffix match on the URI path, so the same classifier works
/// whether the API is mounted at `/` or under a prefix such as `/api/v1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    refresh_path: String,
    primary_auth_paths: Vec<String>,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
            primary_auth_paths: vec![DEFAULT_LOGIN_PATH.to_owned()],
        }
    }
}

impl AuthEndpoints {
    /// Replace the refresh path.
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = normalize(path.into());
        self
    }

    /// Add a primary-authentication path (e.g. an SSO sign-in).
    #[must_use]
    pub fn with_primary_auth_path(mut self, path: impl Into<String>) -> Self {
        self.primary_auth_paths.push(normalize(path.into()));
        self
    }

    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    #[must_use]
    pub fn is_refresh(&self, uri: &Uri) -> bool {
        path_matches(uri, &self.refresh_path)
    }

    #[must_use]
    pub fn is_primary_auth(&self, uri: &Uri) -> bool {
        self.primary_auth_paths
            .iter()
            .any(|suffix| path_matches(uri, suffix))
    }
}

fn normalize(path: String) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn path_matches(uri: &Uri, suffix: &str) -> bool {
    let path = uri.path();
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    path.ends_with(suffix)
}
