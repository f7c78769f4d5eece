//! Ledger error types.
//!
//! This module defines every error a posting can fail with, grouped by how
//! the caller is expected to react (see [`ErrorKind`]).

use settla_shared::AppError;
use settla_shared::types::AccountId;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry must have at least 2 lines.
    #[error("Journal entry must have at least 2 lines, got {0}")]
    InsufficientLines(usize),

    /// Line amount must be positive.
    #[error("Line {line} amount must be positive, got {amount}")]
    NonPositiveAmount {
        /// 1-based line number.
        line: usize,
        /// The offending amount.
        amount: i64,
    },

    /// Entry is not balanced (debits != credits).
    #[error("Journal entry is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Total debit amount.
        debit: i64,
        /// Total credit amount.
        credit: i64,
    },

    /// Line totals exceed the representable range.
    #[error("Journal entry totals overflow")]
    AmountOverflow,

    /// Entry has no transaction id.
    #[error("Journal entry must carry a transaction id")]
    MissingTransactionId,

    /// Applying the entry would overflow an account balance.
    #[error("Balance overflow on account {0}")]
    BalanceOverflow(AccountId),

    /// Malformed subject definition.
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// Two subjects share a code.
    #[error("Duplicate subject code: {0}")]
    DuplicateSubject(String),

    // ========== Not Found Errors ==========
    /// Subject not found.
    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    /// Account not found by id.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account not found by natural key.
    #[error("Account not found for subject {subject_code} and entity {entity_id}")]
    AccountKeyNotFound {
        /// Subject code.
        subject_code: String,
        /// Owning entity.
        entity_id: String,
    },

    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(String),

    // ========== Idempotency Errors ==========
    /// An entry was already posted for this transaction id.
    #[error("Transaction {0} has already been posted")]
    DuplicateTransaction(String),

    /// Entry number collided with an existing entry.
    #[error("Entry number {0} already exists")]
    DuplicateEntryNo(String),

    // ========== Concurrency Errors ==========

    /// Account lock could not be acquired in time.
    #[error("Timed out waiting for lock on account {0}, please retry")]
    LockTimeout(AccountId),

    /// Account version mismatch.
    #[error("Account version mismatch for account {account_id}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The account ID.
        account_id: AccountId,
        /// The version read before the update.
        expected: i64,
        /// The version found at write time.
        actual: i64,
    },

    /// Concurrent modification reported by storage (deadlock, serialization failure).
    #[error("Concurrent modification detected, please retry: {0}")]
    ConcurrentModification(String),

    // ========== Database Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientLines(_)
            | Self::NonPositiveAmount { .. }
            | Self::Unbalanced { .. }
            | Self::AmountOverflow
            | Self::MissingTransactionId
            | Self::BalanceOverflow(_)
            | Self::InvalidSubject(_)
            | Self::DuplicateSubject(_) => ErrorKind::Validation,

            Self::SubjectNotFound(_)
            | Self::AccountNotFound(_)
            | Self::AccountKeyNotFound { .. }
            | Self::EntryNotFound(_) => ErrorKind::NotFound,

            Self::DuplicateTransaction(_) | Self::DuplicateEntryNo(_) => ErrorKind::Duplicate,

            Self::LockTimeout(_)
            | Self::VersionMismatch { .. }
            | Self::ConcurrentModification(_) => ErrorKind::Conflict,

            Self::Database(_) | Self::Internal(_) => ErrorKind::Persistence,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientLines(_) => "INSUFFICIENT_LINES",
            Self::NonPositiveAmount { .. } => "NON_POSITIVE_AMOUNT",
            Self::Unbalanced { .. } => "UNBALANCED_ENTRY",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::MissingTransactionId => "MISSING_TRANSACTION_ID",
            Self::BalanceOverflow(_) => "BALANCE_OVERFLOW",
            Self::InvalidSubject(_) => "INVALID_SUBJECT",
            Self::DuplicateSubject(_) => "DUPLICATE_SUBJECT",
            Self::SubjectNotFound(_) => "SUBJECT_NOT_FOUND",
            Self::AccountNotFound(_) | Self::AccountKeyNotFound { .. } => "ACCOUNT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION",
            Self::DuplicateEntryNo(_) => "DUPLICATE_ENTRY_NO",
            Self::LockTimeout(_) => "LOCK_TIMEOUT",
            Self::VersionMismatch { .. } => "ACCOUNT_VERSION_MISMATCH",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Duplicate => Self::Duplicate(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::Persistence => Self::Database(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::InsufficientLines(1).error_code(),
            "INSUFFICIENT_LINES"
        );
        assert_eq!(
            LedgerError::Unbalanced {
                debit: 100,
                credit: 90
            }
            .error_code(),
            "UNBALANCED_ENTRY"
        );
        assert_eq!(
            LedgerError::DuplicateTransaction("T".into()).error_code(),
            "DUPLICATE_TRANSACTION"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            LedgerError::NonPositiveAmount { line: 1, amount: 0 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::AccountNotFound(AccountId::new()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::DuplicateTransaction("T".into()).kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            LedgerError::DuplicateEntryNo("JE1".into()).kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            LedgerError::LockTimeout(AccountId::new()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            LedgerError::Database("down".into()).kind(),
            ErrorKind::Persistence
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(
            LedgerError::VersionMismatch {
                account_id: AccountId::new(),
                expected: 1,
                actual: 2,
            }
            .is_retryable()
        );
        assert!(LedgerError::ConcurrentModification("deadlock".into()).is_retryable());
        assert!(!LedgerError::InsufficientLines(0).is_retryable());
        assert!(!LedgerError::DuplicateTransaction("T".into()).is_retryable());
        assert!(!LedgerError::DuplicateEntryNo("JE1".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::Unbalanced {
            debit: 100,
            credit: 90,
        };
        assert_eq!(
            err.to_string(),
            "Journal entry is not balanced. Debit: 100, Credit: 90"
        );
    }

    #[test]
    fn test_into_app_error() {
        let app: AppError = LedgerError::LockTimeout(AccountId::new()).into();
        assert!(matches!(app, AppError::Conflict(_)));
        assert!(app.is_retryable());

        let app: AppError = LedgerError::InsufficientLines(1).into();
        assert!(matches!(app, AppError::Validation(_)));
    }
}
