//! Client configuration.

use std::fmt;
use std::time::Duration;

use miniboard_proto::POSTS_TABLE;

/// Default backend URL: the in-process backend.
pub const DEFAULT_URL: &str = "local://";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of each subscription's event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Environment variable holding the backend URL.
pub const URL_ENV: &str = "MINIBOARD_URL";

/// Environment variable holding the public (anonymous) key.
pub const ANON_KEY_ENV: &str = "MINIBOARD_ANON_KEY";

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend endpoint URL.
    pub url: String,

    /// Public key presented to the backend. Opaque to the client.
    pub anon_key: String,

    /// Table the board reads and writes.
    pub table: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Capacity of each subscription's event channel.
    pub channel_capacity: usize,
}

impl ClientConfig {
    /// Create a configuration for the given endpoint and key.
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            table: POSTS_TABLE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Configuration for the in-process backend.
    pub fn local() -> Self {
        Self::new(DEFAULT_URL, "")
    }

    /// Read the endpoint and key from the environment, falling back to the
    /// in-process backend.
    pub fn from_env() -> Self {
        let url = std::env::var(URL_ENV).unwrap_or_else(|_| DEFAULT_URL.to_string());
        let anon_key = std::env::var(ANON_KEY_ENV).unwrap_or_default();
        Self::new(url, anon_key)
    }

    /// Set the table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the subscription channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// The URL scheme, e.g. `local` for `local://`.
    pub fn scheme(&self) -> Option<&str> {
        self.url.split_once("://").map(|(scheme, _)| scheme)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("table", &self.table)
            .field("timeout", &self.timeout)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.table, POSTS_TABLE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.scheme(), Some("local"));
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("https://board.example.com", "pk-123")
            .with_table("threads")
            .with_timeout(Duration::from_secs(5))
            .with_channel_capacity(0);

        assert_eq!(config.scheme(), Some("https"));
        assert_eq!(config.table, "threads");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.channel_capacity, 1);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ClientConfig::new("local://", "secret-key");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }
}
