//! Issuer configuration (code over environment).

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::poll::{PollDeadline, PollPolicy};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "offline_access"];

/// A required environment variable was absent.
#[derive(Debug, Error)]
#[error("environment variable {0} is not set")]
pub struct MissingEnv(pub &'static str);

/// Connection settings for one identity issuer.
///
/// # Example
/// ```
/// use idflow::config::IdentityConfig;
///
/// let config = IdentityConfig::new(
///     "https://id.example.com",
///     "my-client-id",
///     "https://app.example.com/callback",
/// )
/// .with_scopes(["openid", "email"]);
/// assert_eq!(config.scopes, vec!["openid", "email"]);
/// ```
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub issuer_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub request_timeout: Duration,
    pub poll: PollPolicy,
}

impl IdentityConfig {
    pub fn new(
        issuer_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            issuer_url: issuer_url.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Load from environment variables (reads `.env` when present).
    ///
    /// `IDFLOW_ISSUER_URL`, `IDFLOW_CLIENT_ID`, and `IDFLOW_REDIRECT_URI`
    /// are required; `IDFLOW_SCOPES` (space-separated),
    /// `IDFLOW_REQUEST_TIMEOUT_SECS`, `IDFLOW_POLL_INTERVAL_MS`, and
    /// `IDFLOW_POLL_MAX_ATTEMPTS` override defaults when parseable.
    pub fn from_env() -> Result<Self, MissingEnv> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new(
            require_env("IDFLOW_ISSUER_URL")?,
            require_env("IDFLOW_CLIENT_ID")?,
            require_env("IDFLOW_REDIRECT_URI")?,
        );
        if let Ok(scopes) = std::env::var("IDFLOW_SCOPES") {
            config.scopes = scopes.split_whitespace().map(String::from).collect();
        }
        if let Some(secs) = parse_env::<u64>("IDFLOW_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(millis) = parse_env::<u64>("IDFLOW_POLL_INTERVAL_MS") {
            config.poll.interval = Duration::from_millis(millis);
        }
        if let Some(attempts) = parse_env::<u32>("IDFLOW_POLL_MAX_ATTEMPTS") {
            config.poll.deadline = PollDeadline::MaxAttempts(attempts);
        }
        Ok(config)
    }
}

fn require_env(name: &'static str) -> Result<String, MissingEnv> {
    std::env::var(name).map_err(|_| MissingEnv(name))
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, raw = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = IdentityConfig::new("https://id.example.com", "cid", "https://cb");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.scopes.contains(&"openid".to_string()));
    }

    #[test]
    fn builders_override_defaults() {
        let config = IdentityConfig::new("https://id.example.com", "cid", "https://cb")
            .with_request_timeout(Duration::from_secs(5))
            .with_scopes(["openid"]);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.scopes, vec!["openid"]);
    }
}
