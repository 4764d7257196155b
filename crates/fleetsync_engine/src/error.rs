//! Error types for the sync engine.

use fleetsync_model::ErrorKind;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, SyncError>;

/// Errors that can occur while talking to the source or destination API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Credentials were rejected. Fatal to the whole run.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote API asked the caller to slow down.
    #[error("throttled by remote API{}", retry_after_suffix(.retry_after))]
    Throttled {
        /// Server-provided wait, if any.
        retry_after: Option<Duration>,
    },

    /// The destination rejected the payload.
    #[error("validation failed: {message}")]
    Validation {
        /// Error message.
        message: String,
        /// Payload keys the destination does not accept.
        rejected_fields: Vec<String>,
    },

    /// Transient I/O failure.
    #[error("network error: {0}")]
    Network(String),

    /// The addressed record does not exist.
    #[error("{collection}/{id} not found")]
    NotFound {
        /// Collection addressed, as named in the API path.
        collection: String,
        /// Destination identifier.
        id: String,
    },

    /// A mutating call reached the transport while dry-run was active.
    #[error("dry-run active, refused {method} {url}")]
    DryRunBlocked {
        /// HTTP method.
        method: String,
        /// Target URL.
        url: String,
    },

    /// The remote answered with a body that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The run was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(wait) => format!(" (retry after {}s)", wait.as_secs()),
        None => String::new(),
    }
}

impl SyncError {
    /// Creates a validation error without rejected fields.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            rejected_fields: Vec::new(),
        }
    }

    /// Creates a throttling error.
    pub fn throttled(retry_after: Option<Duration>) -> Self {
        Self::Throttled { retry_after }
    }

    /// Creates a not-found error.
    pub fn not_found(collection: impl fmt::Display, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.into(),
        }
    }

    /// Serializable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Authentication(_) => ErrorKind::Authentication,
            SyncError::Throttled { .. } => ErrorKind::Throttled,
            SyncError::Validation { .. } => ErrorKind::Validation,
            SyncError::Network(_) => ErrorKind::Network,
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::DryRunBlocked { .. } => ErrorKind::DryRunBlocked,
            SyncError::Protocol(_) => ErrorKind::Protocol,
            SyncError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns true if this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Authentication(_))
    }

    /// Returns true if this is a throttling response, the only kind the
    /// executor retries.
    pub fn is_throttled(&self) -> bool {
        matches!(self, SyncError::Throttled { .. })
    }

    /// Server-provided wait carried by a throttling response.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SyncError::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_model::Endpoint;

    #[test]
    fn only_authentication_is_fatal() {
        assert!(SyncError::Authentication("token expired".into()).is_fatal());
        assert!(!SyncError::Network("reset".into()).is_fatal());
        assert!(!SyncError::validation("bad payload").is_fatal());
        assert!(!SyncError::throttled(None).is_fatal());
    }

    #[test]
    fn throttled_predicate() {
        let err = SyncError::throttled(Some(Duration::from_secs(30)));
        assert!(err.is_throttled());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert!(!SyncError::Cancelled.is_throttled());
    }

    #[test]
    fn kinds() {
        assert_eq!(
            SyncError::not_found(Endpoint::Servers, "7").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SyncError::DryRunBlocked {
                method: "POST".into(),
                url: "/x".into()
            }
            .kind(),
            ErrorKind::DryRunBlocked
        );
    }

    #[test]
    fn error_display() {
        let err = SyncError::throttled(Some(Duration::from_secs(12)));
        assert_eq!(err.to_string(), "throttled by remote API (retry after 12s)");

        let err = SyncError::not_found(Endpoint::Workstations, "42");
        assert_eq!(err.to_string(), "asset_workstations/42 not found");

        let err = SyncError::not_found("assets", "9");
        assert_eq!(err.to_string(), "assets/9 not found");
    }
}
