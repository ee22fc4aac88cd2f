//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::StageError;

/// Connection settings for a [`StageClient`](crate::client::StageClient).
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the repository manager, e.g. `https://repo.example.com/nexus/`.
    pub base_url: String,
    /// User name for Basic authentication.
    #[serde(default)]
    pub username: String,
    /// Password for Basic authentication.
    #[serde(default)]
    pub password: String,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout in seconds. Unset leaves the transport default.
    #[serde(default)]
    pub request_timeout_seconds: Option<f64>,
    /// How to poll for completion of asynchronous actions.
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_user_agent() -> String {
    concat!("nexus-staging/", env!("CARGO_PKG_VERSION")).to_string()
}

impl ClientConfig {
    /// Creates a configuration for `base_url` with defaults for everything else.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: String::new(),
            password: String::new(),
            user_agent: default_user_agent(),
            request_timeout_seconds: None,
            poll: PollConfig::default(),
        }
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StageError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StageError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| StageError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, seconds: f64) -> Self {
        self.request_timeout_seconds = Some(seconds);
        self
    }

    /// Sets the polling behaviour.
    #[must_use]
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Gets the request timeout as a Duration.
    pub fn request_timeout(&self) -> Result<Option<Duration>, StageError> {
        self.request_timeout_seconds
            .map(|seconds| {
                Duration::try_from_secs_f64(seconds).map_err(|_| {
                    StageError::Config(format!("invalid request timeout {seconds}"))
                })
            })
            .transpose()
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("poll", &self.poll)
            .finish()
    }
}

/// Polling behaviour while waiting for an asynchronous action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between polls in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum number of polls. Unset polls until the server reports completion.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_interval_ms() -> u64 {
    500
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    /// Sets the interval between polls.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Bounds the number of polls.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Gets the interval as a Duration.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
