//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout dbwarden.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `Config`: Connection URL missing or unparsable
//! - `Validation`: Domain model fields absent or inconsistent (raised before any network call)
//! - `Client`: Any driver failure (connect, prepare, execute, fetch), always with its cause
//! - `Operation`: A failed command step, with the message shown to the user; wraps the
//!   client failure behind it, if any

use thiserror::Error;

/// Boxed driver-level cause carried by client errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for dbwarden operations
#[derive(Error, Debug)]
pub enum WardenError {
    /// Connection descriptor missing or unparsable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required fields absent or logically inconsistent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Underlying driver failure
    #[error("{message}")]
    Client {
        message: String,
        #[source]
        source: BoxError,
    },

    /// Terminal failure of a command step
    ///
    /// `source` is absent when the server answered without error but did not
    /// confirm the change.
    #[error("{message}")]
    Operation {
        message: String,
        #[source]
        source: Option<Box<WardenError>>,
    },
}

impl WardenError {
    /// Convert error to error code string for JSON output
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Client { .. } => "CLIENT_ERROR",
            Self::Operation { .. } => "OPERATION_FAILED",
        }
    }

    /// Human-readable message including the chain of causes
    ///
    /// Bound parameter values never appear here: statements are logged and
    /// reported by text only.
    #[must_use]
    pub fn message(&self) -> String {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        message
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a client error wrapping a driver failure
    pub fn client(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Client { message: message.into(), source: source.into() }
    }

    /// Wrap an error with an operation-specific message
    pub fn operation(message: impl Into<String>, source: WardenError) -> Self {
        Self::Operation { message: message.into(), source: Some(Box::new(source)) }
    }

    /// A step the server did not confirm, with no underlying failure
    pub fn unconfirmed(message: impl Into<String>) -> Self {
        Self::Operation { message: message.into(), source: None }
    }

    /// True for client errors, including those wrapped by an operation
    #[must_use]
    pub fn is_client(&self) -> bool {
        match self {
            Self::Client { .. } => true,
            Self::Operation { source, .. } => source.as_deref().is_some_and(Self::is_client),
            _ => false,
        }
    }
}

/// Result type alias for dbwarden operations
pub type Result<T> = std::result::Result<T, WardenError>;
