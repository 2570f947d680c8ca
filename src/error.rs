// Error types module

use std::time::Duration;
use thiserror::Error;

/// Result alias used by every storage operation
pub type Result<T> = std::result::Result<T, StorageError>;

/// Shared failure taxonomy for all storage backends
///
/// Backends translate their native failures (HTTP status codes, I/O errors)
/// into one of these variants at the service boundary, so callers never see
/// a backend-specific error type.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A required argument was missing
    #[error("Argument '{0}' is required")]
    ArgumentNull(&'static str),

    /// Path escapes the allowed root or breaks a backend naming rule
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Addressed file or directory does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials rejected or insufficient
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other failure reported by the backend
    #[error("{}", backend_message(.status, .message))]
    Backend {
        status: Option<u16>,
        message: String,
    },

    /// The backend cannot perform this operation
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Configuration is missing a required value or is malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// The adapter's default timeout expired
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

fn backend_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("Backend error: {} {}", status, message),
        None => format!("Backend error: {}", message),
    }
}

/// Discriminant of [`StorageError`], convenient for matching and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ArgumentNull,
    InvalidPath,
    NotFound,
    Unauthorized,
    Backend,
    NotSupported,
    Configuration,
    Cancelled,
    Timeout,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::ArgumentNull(_) => ErrorKind::ArgumentNull,
            StorageError::InvalidPath(_) => ErrorKind::InvalidPath,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::Unauthorized(_) => ErrorKind::Unauthorized,
            StorageError::Backend { .. } => ErrorKind::Backend,
            StorageError::NotSupported(_) => ErrorKind::NotSupported,
            StorageError::Configuration(_) => ErrorKind::Configuration,
            StorageError::Cancelled => ErrorKind::Cancelled,
            StorageError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Backend error without an HTTP status
    pub fn backend(message: impl Into<String>) -> Self {
        StorageError::Backend {
            status: None,
            message: message.into(),
        }
    }

    /// Maps a non-success HTTP status to the taxonomy
    ///
    /// 404 is `NotFound`, 401 is `Unauthorized`, everything else is a
    /// `Backend` error carrying the status code and reason phrase.
    pub fn from_status(status: u16, reason: &str) -> Self {
        match status {
            404 => StorageError::NotFound(reason.to_string()),
            401 => StorageError::Unauthorized(reason.to_string()),
            _ => StorageError::Backend {
                status: Some(status),
                message: reason.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => StorageError::Unauthorized(err.to_string()),
            _ => StorageError::backend(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_404_maps_to_not_found() {
        let err = StorageError::from_status(404, "The specified blob does not exist.");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_status_401_maps_to_unauthorized() {
        let err = StorageError::from_status(401, "Server failed to authenticate the request.");
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_other_status_keeps_code_and_reason() {
        let err = StorageError::from_status(409, "Conflict");
        match &err {
            StorageError::Backend { status, message } => {
                assert_eq!(*status, Some(409));
                assert_eq!(message, "Conflict");
            }
            other => panic!("Expected backend error, got {:?}", other),
        }
        assert_eq!(err.to_string(), "Backend error: 409 Conflict");
    }

    #[test]
    fn test_io_errors_are_translated() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(StorageError::from(not_found).kind(), ErrorKind::NotFound);

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(StorageError::from(denied).kind(), ErrorKind::Unauthorized);

        let other = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        assert_eq!(StorageError::from(other).kind(), ErrorKind::Backend);
    }

    #[test]
    fn test_argument_null_names_the_argument() {
        let err = StorageError::ArgumentNull("path");
        assert!(err.to_string().contains("path"));
    }
}
