use crate::core::redact::redact_known;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KgCwlError {
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<reqwest::Error> for KgCwlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            KgCwlError::MalformedRecord(err.to_string())
        } else {
            KgCwlError::Network(err.to_string())
        }
    }
}

impl KgCwlError {
    /// Remove a known secret, such as the bearer token, from the message.
    pub fn redacted(self, secret: &str) -> Self {
        let scrub = |m: String| redact_known(&m, secret);
        match self {
            KgCwlError::Authentication(m) => KgCwlError::Authentication(scrub(m)),
            KgCwlError::NotFound(m) => KgCwlError::NotFound(scrub(m)),
            KgCwlError::MalformedRecord(m) => KgCwlError::MalformedRecord(scrub(m)),
            KgCwlError::Network(m) => KgCwlError::Network(scrub(m)),
            KgCwlError::ValidationError(m) => KgCwlError::ValidationError(scrub(m)),
            KgCwlError::ConfigError(m) => KgCwlError::ConfigError(scrub(m)),
            other => other,
        }
    }
}
