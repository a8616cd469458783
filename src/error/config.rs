use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration load failed: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
