use std::env;
use std::net::IpAddr;
use tracing::{info, warn};

use crate::config::ConfigError;

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (must parse as an IP address)
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl AppConfig {
    /// Load listener configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DEVIS_HOST: bind address (defaults to 127.0.0.1)
    /// - DEVIS_PORT: bind port (defaults to 8080)
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading listener configuration from environment variables");

        let host = env::var("DEVIS_HOST").unwrap_or_else(|_| {
            warn!("DEVIS_HOST not set, defaulting to 127.0.0.1");
            "127.0.0.1".to_string()
        });

        let port = env::var("DEVIS_PORT")
            .unwrap_or_else(|_| {
                warn!("DEVIS_PORT not set, defaulting to 8080");
                "8080".to_string()
            })
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("Invalid DEVIS_PORT value".to_string()))?;

        let config = AppConfig { host, port };
        config.validate()?;
        info!("Listener configuration loaded: {}:{}", config.host, config.port);
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.host.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!("Invalid bind address: {}", self.host))
        })?;

        if self.port == 0 {
            return Err(ConfigError::ValidationError(
                "Bind port cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_hostname() {
        let config = AppConfig {
            host: "localhost".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_port() {
        let config = AppConfig {
            port: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
