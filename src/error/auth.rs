//! Errors raised by the shared-secret gate.

use thiserror::Error;

/// The outcome of a rejected inbound authentication attempt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("API key was not provided")]
    ApiKeyMissing,

    #[error("The provided API key is invalid")]
    ApiKeyInvalid,

    #[error("No shared secret is configured on the proxy")]
    SharedSecretNotConfigured,
}
