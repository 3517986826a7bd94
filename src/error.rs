//! Error types for oidc-web
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.
//!
//! Only caller-correctable mistakes ([`OidcWebError::Usage`]) are meant to
//! reach application code.  Errors caused by untrusted input (stored records,
//! response URIs, provider responses) are absorbed at the session resolution
//! boundary in [`crate::client::OidcWebClient::session_from_response`].

use thiserror::Error;

/// Main error type for oidc-web operations
#[derive(Error, Debug)]
pub enum OidcWebError {
    /// Invalid arguments supplied by the calling application
    #[error("Usage error: {0}")]
    Usage(String),

    /// No provider was recorded for the `state` echoed by an auth response
    #[error("Could not load provider uri from response state param: {state}")]
    MissingCorrelation {
        /// The `state` value carried by the response
        state: String,
    },

    /// The relying party rejected an authentication response
    #[error("Response validation error: {0}")]
    ResponseValidation(String),

    /// Dynamic client registration failed
    #[error("Client registration error: {0}")]
    Registration(String),

    /// Provider metadata could not be discovered
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// An authorization request URI could not be built
    #[error("Authorization request error: {0}")]
    AuthRequest(String),

    /// Storage medium failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A URI could not be parsed
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for oidc-web operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.  Callers that
/// need to branch on the failure kind downcast to [`OidcWebError`].
pub type Result<T> = anyhow::Result<T>;
