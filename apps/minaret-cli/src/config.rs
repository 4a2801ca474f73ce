//! Layered CLI configuration.
//!
//! Sources, later ones winning: built-in defaults, the YAML file passed with
//! `--config`, `MINARET__*` environment variables (`__` separates nesting
//! levels, e.g. `MINARET__API__BASE_URL`), then command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use minaret_auth::DEFAULT_REFRESH_TIMEOUT;
use minaret_client::ApiClientConfig;
use minaret_http::TransportSecurity;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

pub const ENV_PREFIX: &str = "MINARET__";

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const CREDENTIALS_DIR: &str = "minaret";
const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend settings. `base_url` has no serde default; the defaults layer of
/// [`AppConfig::load`] supplies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: Url,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(default = "default_refresh_timeout", with = "humantime_serde")]
    pub refresh_timeout: Duration,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Permit plain HTTP for non-loopback hosts.
    #[serde(default)]
    pub allow_insecure_http: bool,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_refresh_timeout() -> Duration {
    DEFAULT_REFRESH_TIMEOUT
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: default_request_timeout(),
            refresh_timeout: default_refresh_timeout(),
            user_agent: None,
            allow_insecure_http: false,
        }
    }

    /// Plain HTTP is always allowed for loopback hosts.
    #[must_use]
    pub fn allows_insecure_http(&self) -> bool {
        if self.allow_insecure_http {
            return true;
        }
        match self.base_url.host() {
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Token file; defaults to `<config dir>/minaret/credentials.json`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset and no `-v` is given.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Values given on the command line that win over every other source.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub base_url: Option<Url>,
    pub credentials: Option<PathBuf>,
}

impl AppConfig {
    /// Load defaults, then `path` if given, then the environment.
    ///
    /// # Errors
    /// Fails if `path` does not exist or any source holds an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::default("api.base_url", DEFAULT_BASE_URL));
        if let Some(path) = path {
            if !path.is_file() {
                bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment
            .extract()
            .context("failed to load configuration")
    }

    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(url) = &overrides.base_url {
            self.api.base_url = url.clone();
        }
        if let Some(path) = &overrides.credentials {
            self.credentials.path = Some(path.clone());
        }
    }

    /// # Errors
    /// Fails when no path is configured and the platform has no config dir.
    pub fn credentials_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials.path {
            return Ok(path.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join(CREDENTIALS_DIR).join(CREDENTIALS_FILE))
            .context("no config directory on this platform; set credentials.path")
    }

    #[must_use]
    pub fn client_config(&self) -> ApiClientConfig {
        let mut config = ApiClientConfig::new(self.api.base_url.clone());
        config.http.request_timeout = self.api.request_timeout;
        config.refresh_timeout = self.api.refresh_timeout;
        if let Some(user_agent) = &self.api.user_agent {
            config.http.user_agent.clone_from(user_agent);
        }
        if self.api.allows_insecure_http() {
            config.http.transport = TransportSecurity::AllowInsecureHttp;
        }
        config
    }

    /// # Errors
    /// Fails only if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to render configuration")
    }
}
