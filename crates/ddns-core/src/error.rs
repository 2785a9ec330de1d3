//! Error types for the DDNS system
//!
//! The variants mirror how a reconciliation run treats a failure: bad input
//! is never retried, transport and provider failures end the current run (or,
//! for updates, only the current record) and are retried by the next tick.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad or missing input; the operator has to fix it
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure reaching an endpoint
    ///
    /// `context` names what was being reached ("ipv4", "ipv6", "zone lookup", ...).
    #[error("Network error ({context}): {message}")]
    Network {
        /// What the request was for
        context: String,
        /// Underlying cause
        message: String,
    },

    /// Non-success HTTP status from the DNS provider
    #[error("Provider HTTP error: status {status}: {message}")]
    ProviderHttp {
        /// HTTP status code
        status: u16,
        /// Request description and response excerpt
        message: String,
    },

    /// Response body could not be decoded as expected
    #[error("Decode error: {0}")]
    Decode(String),

    /// The provider has no zone (or record set) for the requested name
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// The provider rejected a record update
    #[error("Failed to update record {record}: status {status}: {message}")]
    UpdateFailed {
        /// Fully-qualified record name
        record: String,
        /// HTTP status code
        status: u16,
        /// Response excerpt
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error tagged with what was being reached
    pub fn network(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a provider HTTP error
    pub fn provider_http(status: u16, message: impl Into<String>) -> Self {
        Self::ProviderHttp {
            status,
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(msg: impl Into<String>) -> Self {
        Self::ZoneNotFound(msg.into())
    }

    /// Create an update failure
    pub fn update_failed(record: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::UpdateFailed {
            record: record.into(),
            status,
            message: message.into(),
        }
    }

    /// Whether retrying later can succeed without operator action
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Config(_) => false,
            Error::ProviderHttp { status, .. } | Error::UpdateFailed { status, .. } => {
                !matches!(status, 400 | 401 | 403)
            }
            _ => true,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
