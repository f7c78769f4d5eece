//! Error classification shared by every module in this crate.

use serde::{Deserialize, Serialize};

/// How a caller should react to a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input or illegal state transition. Never retried.
    Validation,
    /// Lock or version conflict. The transaction was rolled back; retry with backoff.
    Conflict,
    /// The business event was already applied. Not retried.
    Duplicate,
    /// Unknown subject, account, entry or settlement.
    NotFound,
    /// Storage unavailable or failed. Retried at the transport layer.
    Persistence,
}

impl ErrorKind {
    /// Returns true if the operation may be retried as-is.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Conflict | Self::Persistence)
    }

    /// Returns the HTTP status code conventionally used for this kind.
    #[must_use]
    pub fn http_status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict | Self::Duplicate => 409,
            Self::Persistence => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Conflict.is_retryable());
        assert!(ErrorKind::Persistence.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Duplicate.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(ErrorKind::Validation.http_status_code(), 400);
        assert_eq!(ErrorKind::NotFound.http_status_code(), 404);
        assert_eq!(ErrorKind::Conflict.http_status_code(), 409);
        assert_eq!(ErrorKind::Duplicate.http_status_code(), 409);
        assert_eq!(ErrorKind::Persistence.http_status_code(), 500);
    }
}
