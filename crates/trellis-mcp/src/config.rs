//! Environment-sourced server configuration.
//!
//! A missing credential is a fatal startup error, never a per-call one:
//! `main` exits before any session starts.

use std::time::Duration;

use thiserror::Error;
use trellis_github::GithubConfig;

/// Environment variable carrying the GitHub credential.
pub const ENV_TOKEN: &str = "GITHUB_TOKEN";

/// Environment variable overriding the API base address.
pub const ENV_API_URL: &str = "GITHUB_API_URL";

/// Per-request timeout for remote calls.
const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Startup configuration errors. All fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The credential variable is absent or blank.
    #[error("{ENV_TOKEN} is not set; a GitHub token is required to start")]
    MissingToken,
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// GitHub credential.
    pub token: String,

    /// API base address override, when set.
    pub base_url: Option<String>,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingToken`] when the credential is
    /// absent or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var(ENV_TOKEN).ok(),
            std::env::var(ENV_API_URL).ok(),
        )
    }

    /// Build configuration from raw variable values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingToken`] when the credential is
    /// absent or blank.
    pub fn from_vars(
        token: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let base_url = base_url.filter(|u| !u.trim().is_empty());
        Ok(Self { token, base_url })
    }

    /// Derive the relation client configuration.
    #[must_use]
    pub fn github(&self) -> GithubConfig {
        let mut cfg = GithubConfig::new(self.token.clone());
        if let Some(base_url) = &self.base_url {
            cfg.base_url = base_url.clone();
        }
        cfg.timeout = REMOTE_TIMEOUT;
        cfg
    }
}
