/*!
 * Error types for Cirrus
 */

use cirrus_core_interface::{StoreError, TransportError};
use cirrus_core_resilience::Retryable;
use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CloudError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Error, Debug)]
pub enum CloudError {
    /// Name or argument longer than the cloud accepts
    #[error("{field} exceeds {limit} byte limit ({actual} bytes)")]
    InputTooLong {
        field: &'static str,
        limit: usize,
        actual: usize,
    },

    /// Credential field does not have the fixed length the cloud issues
    #[error("{field} must be exactly {expected} characters (got {actual})")]
    CredentialLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Network link is down
    #[error("network not connected")]
    NotConnected,

    /// No usable credentials, and configuration did not produce any
    #[error("cloud credentials not configured")]
    NotConfigured,

    /// Admission control refused the call
    #[error("API throttle active for {endpoint}")]
    Throttled { endpoint: String },

    /// Round trip failed below HTTP
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Cloud answered with something other than 200
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// Response body lacked the expected field
    #[error("response parse error: {0}")]
    Parse(String),

    /// Credential persistence failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Background invocation ended without producing a result
    #[error("invocation abandoned before completion")]
    Abandoned,

    /// Interactive setup is already running
    #[error("interactive configuration already in progress")]
    ConfiguratorBusy,

    /// Console or file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bad configuration value
    #[error("configuration error: {0}")]
    Config(String),
}

impl CloudError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CloudError::Config(_) | CloudError::Store(_) => EXIT_FATAL,
            _ => EXIT_FAILURE,
        }
    }

    /// Whether the call was refused before any network I/O
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CloudError::InputTooLong { .. }
                | CloudError::CredentialLength { .. }
                | CloudError::NotConnected
                | CloudError::NotConfigured
                | CloudError::Throttled { .. }
                | CloudError::ConfiguratorBusy
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            CloudError::InputTooLong { .. } | CloudError::CredentialLength { .. } => {
                ErrorCategory::Validation
            }
            CloudError::NotConnected | CloudError::NotConfigured | CloudError::ConfiguratorBusy => {
                ErrorCategory::Precondition
            }
            CloudError::Throttled { .. } => ErrorCategory::Throttle,
            CloudError::Transport(e) if e.is_retryable() => ErrorCategory::Transient,
            CloudError::Transport(_) | CloudError::HttpStatus(_) | CloudError::Abandoned => {
                ErrorCategory::Transport
            }
            CloudError::Parse(_) => ErrorCategory::Parse,
            CloudError::Store(_) => ErrorCategory::Storage,
            CloudError::Io(_) => ErrorCategory::IoError,
            CloudError::Config(_) => ErrorCategory::Configuration,
        }
    }
}

impl Retryable for CloudError {
    /// Only a response timeout is worth another attempt
    fn is_retryable(&self) -> bool {
        matches!(self, CloudError::Transport(e) if e.is_retryable())
    }
}

impl From<url::ParseError> for CloudError {
    fn from(err: url::ParseError) -> Self {
        CloudError::Config(format!("invalid API URL: {}", err))
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Oversized input
    Validation,
    /// Connectivity or configuration missing
    Precondition,
    /// Admission control decision
    Throttle,
    /// Retryable transport failure
    Transient,
    /// Non-retryable transport failure or HTTP status
    Transport,
    /// Response field missing or malformed
    Parse,
    /// Persistent storage
    Storage,
    /// Console or file I/O
    IoError,
    /// Configuration errors
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Precondition => write!(f, "precondition"),
            ErrorCategory::Throttle => write!(f, "throttle"),
            ErrorCategory::Transient => write!(f, "transient"),
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Configuration => write!(f, "configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_read_timeout_is_retryable() {
        assert!(CloudError::Transport(TransportError::ReadTimeout).is_retryable());
        assert!(!CloudError::Transport(TransportError::ConnectTimeout).is_retryable());
        assert!(!CloudError::HttpStatus(504).is_retryable());
        assert!(!CloudError::HttpStatus(429).is_retryable());
        assert!(!CloudError::Parse("missing".into()).is_retryable());
        assert!(!CloudError::NotConnected.is_retryable());
    }

    #[test]
    fn test_rejections_happen_before_io() {
        assert!(CloudError::NotConnected.is_rejection());
        assert!(CloudError::Throttled {
            endpoint: "function:led".into()
        }
        .is_rejection());
        assert!(CloudError::InputTooLong {
            field: "function name",
            limit: 64,
            actual: 65
        }
        .is_rejection());
        assert!(!CloudError::HttpStatus(500).is_rejection());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            CloudError::Transport(TransportError::ReadTimeout).category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            CloudError::Transport(TransportError::ConnectTimeout).category(),
            ErrorCategory::Transport
        );
        assert_eq!(CloudError::HttpStatus(404).category(), ErrorCategory::Transport);
        assert_eq!(CloudError::NotConfigured.category(), ErrorCategory::Precondition);
        assert_eq!(ErrorCategory::Throttle.to_string(), "throttle");
    }

    #[test]
    fn test_error_display() {
        let err = CloudError::InputTooLong {
            field: "function argument",
            limit: 1024,
            actual: 2000,
        };
        assert_eq!(
            err.to_string(),
            "function argument exceeds 1024 byte limit (2000 bytes)"
        );
        assert_eq!(
            CloudError::HttpStatus(403).to_string(),
            "unexpected HTTP status 403"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CloudError::Config("bad".into()).exit_code(), EXIT_FATAL);
        assert_eq!(CloudError::HttpStatus(500).exit_code(), EXIT_FAILURE);
    }
}
