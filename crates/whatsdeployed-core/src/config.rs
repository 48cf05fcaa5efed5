//! Forge client configuration
//!
//! Built once by the binaries (from the environment or command-line flags)
//! and handed to [`crate::GitHubClient::new`]. The library never reads the
//! environment behind the caller's back.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};

/// Default GitHub REST API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Login GitHub uses as committer when a PR is merged with the web UI button.
pub const DEFAULT_MERGE_BOT_LOGIN: &str = "web-flow";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const DEFAULT_USER_AGENT: &str = "whatsdeployed (https://whatsdeployed.io)";

/// Forge access configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// REST API root, without trailing slash
    pub api_base_url: String,
    /// User-Agent sent with every outbound request
    pub user_agent: String,
    /// Personal access token (optional, but unauthenticated clients hit rate limits fast)
    pub auth_token: Option<String>,
    /// Timeout applied to each outbound call
    pub request_timeout: Duration,
    /// Committer login that marks a web-UI merge
    pub merge_bot_login: String,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        ForgeConfig {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            merge_bot_login: DEFAULT_MERGE_BOT_LOGIN.to_string(),
        }
    }
}

impl ForgeConfig {
    /// Create a config from environment variables.
    ///
    /// Reads `GITHUB_API_URL`, `REQUESTS_USER_AGENT`, `GITHUB_AUTH_TOKEN`,
    /// `GITHUB_REQUEST_TIMEOUT` (seconds) and `GITHUB_MERGE_BOT_LOGIN`.
    /// Unset or blank variables keep defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ForgeConfig::from_env`] but with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ForgeConfig::default();

        if let Some(url) = lookup("GITHUB_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(agent) = lookup("REQUESTS_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            config.user_agent = agent;
        }
        config.auth_token = lookup("GITHUB_AUTH_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(raw) = lookup("GITHUB_REQUEST_TIMEOUT") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                DeployError::Config(format!("GITHUB_REQUEST_TIMEOUT is not a number: {raw}"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(login) = lookup("GITHUB_MERGE_BOT_LOGIN").filter(|v| !v.trim().is_empty()) {
            config.merge_bot_login = login.trim().to_string();
        }

        Ok(config)
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    /// Point the client at another API root (GitHub Enterprise, test servers)
    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_merge_bot_login(mut self, login: &str) -> Self {
        self.merge_bot_login = login.to_string();
        self
    }

    /// Value for the `Authorization` header, if a token is configured.
    pub fn authorization_header(&self) -> Option<String> {
        self.auth_token.as_ref().map(|t| format!("token {t}"))
    }
}
