pub mod app_conf;
pub mod email_conf;
pub mod minio_conf;
pub mod mongo_conf;

pub use app_conf::AppConfig;
pub use email_conf::EmailConfig;
pub use minio_conf::MinioConfig;
pub use mongo_conf::MongoConfig;

use std::env;
use tracing::error;

/// Common configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Read a required environment variable, logging the missing key.
pub(crate) fn required_env(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| {
        error!("{} environment variable not found", name);
        ConfigError::EnvVarNotFound(name.to_string())
    })
}
