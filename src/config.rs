use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::discount::DiscountCodes;
use crate::error::DeskError;
use crate::provider::LiveStripeClientConfig;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};

/// Main configuration for the billing desk
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub provider: LiveStripeClientConfig,
    #[serde(default)]
    pub discounts: DiscountCodes,
    /// Overrides the key from the settings file when set.
    #[serde(skip)]
    pub stripe_api_key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    /// Seconds between periodic cache refreshes (default: 15 minutes)
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_refresh_interval_secs() -> u64 {
    15 * 60
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.refresh.interval_secs = interval.as_secs();
        self
    }

    pub fn with_provider(mut self, provider: LiveStripeClientConfig) -> Self {
        self.config.provider = provider;
        self
    }

    pub fn with_discounts(mut self, discounts: DiscountCodes) -> Self {
        self.config.discounts = discounts;
        self
    }

    pub fn with_stripe_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.stripe_api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Load configuration from environment variables with BILLDESK_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = parse_env_with_prefix("PORT") {
            self.config.server.port = port;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Some(secs) = parse_env_with_prefix("REFRESH_INTERVAL_SECS") {
            self.config.refresh.interval_secs = secs;
        }
        if let Some(secs) = parse_env_with_prefix("PROVIDER_TIMEOUT_SECS") {
            self.config.provider.timeout_seconds = secs;
        }
        if let Some(retries) = parse_env_with_prefix("PROVIDER_MAX_RETRIES") {
            self.config.provider.max_retries = retries;
        }
        if let Some(key) = get_env_with_prefix("STRIPE_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.config.stripe_api_key = Some(SecretString::from(key.trim().to_string()));
        }

        self.config.discounts = self.config.discounts.from_env();

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration is invalid:
    /// - Invalid server address (host:port)
    /// - Invalid log level
    /// - Zero refresh interval or provider timeout
    /// - Empty discount codes
    pub fn build(self) -> crate::error::Result<Config> {
        self.config.server.addr().map_err(|e| {
            DeskError::bad_request(format!(
                "Invalid server address {}:{} - {}",
                self.config.server.host, self.config.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(DeskError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.config.refresh.interval_secs == 0 {
            return Err(DeskError::bad_request(
                "Refresh interval must be greater than 0",
            ));
        }

        if self.config.provider.timeout_seconds == 0 {
            return Err(DeskError::bad_request(
                "Provider timeout must be greater than 0",
            ));
        }

        let codes = &self.config.discounts;
        if [&codes.tier_1, &codes.tier_2, &codes.tier_3, &codes.independent]
            .iter()
            .any(|code| code.trim().is_empty())
        {
            return Err(DeskError::bad_request("Discount codes must not be empty"));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.refresh.interval(), Duration::from_secs(900));
        assert_eq!(config.provider.timeout_seconds, 30);
        assert_eq!(config.discounts.independent, "independent_artist");
        assert!(config.stripe_api_key.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ConfigBuilder::new()
            .with_host("0.0.0.0")
            .with_port(9100)
            .with_refresh_interval(Duration::from_secs(60))
            .with_stripe_api_key("sk_test_abcdefghijklmnop")
            .build()
            .unwrap();

        assert_eq!(config.server.addr().unwrap().port(), 9100);
        assert_eq!(config.refresh.interval_secs, 60);
        assert_eq!(
            config.stripe_api_key.unwrap().expose_secret(),
            "sk_test_abcdefghijklmnop"
        );
    }

    #[test]
    fn test_validation() {
        assert!(ConfigBuilder::new().with_log_level("loud").build().is_err());
        assert!(ConfigBuilder::new().with_host("not a host").build().is_err());
        assert!(
            ConfigBuilder::new()
                .with_refresh_interval(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(
            ConfigBuilder::new()
                .with_discounts(DiscountCodes {
                    tier_1: " ".to_string(),
                    ..Default::default()
                })
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("BILLDESK_REFRESH_INTERVAL_SECS", "120");
            std::env::set_var("BILLDESK_PROVIDER_MAX_RETRIES", "7");
            std::env::set_var("BILLDESK_DISCOUNT_INDEPENDENT", "indie");
        }

        let config = ConfigBuilder::new().from_env().build().unwrap();
        assert_eq!(config.refresh.interval_secs, 120);
        assert_eq!(config.provider.max_retries, 7);
        assert_eq!(config.discounts.independent, "indie");

        unsafe {
            std::env::remove_var("BILLDESK_REFRESH_INTERVAL_SECS");
            std::env::remove_var("BILLDESK_PROVIDER_MAX_RETRIES");
            std::env::remove_var("BILLDESK_DISCOUNT_INDEPENDENT");
        }
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{"refresh":{"interval_secs":300}}"#).unwrap();
        assert_eq!(config.refresh.interval_secs, 300);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.provider.max_retries, 3);
    }
}
