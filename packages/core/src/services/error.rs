//! Error types for the upstream and transport capabilities

use thiserror::Error;

/// Errors from the upstream account provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Upstream returned HTTP {status}")]
    StatusError { status: u16 },

    #[error("Data format error: {message}")]
    FormatError { message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Errors from the downstream message transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid transport address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("Publish to '{topic}' failed: {message}")]
    PublishError { topic: String, message: String },

    #[error("Payload serialisation failed: {message}")]
    SerializeError { message: String },
}

impl ProviderError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::FormatError { message: message.into() }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthError { message: message.into() }
    }
}

impl TransportError {
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError { message: message.into() }
    }

    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublishError {
            topic: topic.into(),
            message: message.into(),
        }
    }
}
