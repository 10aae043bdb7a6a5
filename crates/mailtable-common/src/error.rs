//! Error types for mailtable

use thiserror::Error;

/// Main error type for mailtable backends
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Lookup aborted; the cause has already been logged
    #[error("Lookup failed")]
    Lookup,
}

/// Result type alias for mailtable
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Connect(_) => "CONNECT_ERROR",
            Error::Auth(_) => "AUTH_ERROR",
            Error::Protocol(_) => "PROTOCOL_ERROR",
            Error::LimitExceeded(_) => "LIMIT_EXCEEDED",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Lookup => "LOOKUP_FAILED",
        }
    }
}
