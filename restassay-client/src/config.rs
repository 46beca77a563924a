//! Test client configuration.

use std::env;
use std::time::Duration;

/// Default cap on assertion attempts made by a retrying policy.
pub const MAX_ATTEMPTS: u32 = 8;

/// Test client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Default request timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip decompression.
    pub gzip: bool,
    /// Enable brotli decompression.
    pub brotli: bool,
    /// Follow redirects inside the transport. Off by default so that tests
    /// can observe `3xx` responses and navigate with `follow()`.
    pub follow_redirects: bool,
    /// Maximum redirects to follow when `follow_redirects` is on.
    pub max_redirects: usize,
    /// Hard cap on evaluations of a retrying assertion.
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("restassay/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            brotli: true,
            follow_redirects: false,
            max_redirects: 10,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Create config from environment variables.
    ///
    /// - `RESTASSAY_TIMEOUT_MS` - request timeout
    /// - `RESTASSAY_CONNECT_TIMEOUT_MS` - connection timeout
    /// - `RESTASSAY_MAX_ATTEMPTS` - retry cap
    /// - `RESTASSAY_USER_AGENT` - user agent
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        let mut config = Self::default();
        if let Some(timeout) = millis("RESTASSAY_TIMEOUT_MS") {
            config.timeout = timeout;
        }
        if let Some(timeout) = millis("RESTASSAY_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = timeout;
        }
        if let Some(attempts) = lookup("RESTASSAY_MAX_ATTEMPTS")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|attempts| *attempts > 0)
        {
            config.max_attempts = attempts;
        }
        if let Some(agent) = lookup("RESTASSAY_USER_AGENT") {
            config.user_agent = agent;
        }
        config
    }
}

/// Builder for test client configuration.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip decompression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Enable or disable brotli decompression.
    pub fn brotli(mut self, enable: bool) -> Self {
        self.config.brotli = enable;
        self
    }

    /// Enable or disable following redirects in the transport.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Set the cap on evaluations of a retrying assertion (at least 1).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts.max(1);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_attempts, MAX_ATTEMPTS);
        assert!(!config.follow_redirects);
        assert!(config.user_agent.starts_with("restassay/"));
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .timeout(Duration::from_secs(5))
            .max_attempts(0)
            .follow_redirects(true)
            .build();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 1);
        assert!(config.follow_redirects);
    }

    #[test]
    fn test_from_lookup() {
        let config = ClientConfig::from_lookup(|key| match key {
            "RESTASSAY_TIMEOUT_MS" => Some("1500".to_string()),
            "RESTASSAY_MAX_ATTEMPTS" => Some("3".to_string()),
            "RESTASSAY_CONNECT_TIMEOUT_MS" => Some("soon".to_string()),
            _ => None,
        });
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }
}
