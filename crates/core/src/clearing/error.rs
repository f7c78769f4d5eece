//! Clearing error types.

use settla_shared::AppError;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::ledger::LedgerError;
use crate::settlement::SettlementError;

/// Errors that can occur while clearing a payment.
#[derive(Debug, Error)]
pub enum ClearingError {
    /// The payment event is malformed.
    #[error("Invalid payment: {0}")]
    InvalidPayment(String),

    /// Posting the clearing entry failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Resolving the merchant's fee rate failed.
    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

impl ClearingError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPayment(_) => ErrorKind::Validation,
            Self::Ledger(err) => err.kind(),
            Self::Settlement(err) => err.kind(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPayment(_) => "INVALID_PAYMENT",
            Self::Ledger(err) => err.error_code(),
            Self::Settlement(err) => err.error_code(),
        }
    }

    /// Returns true if the caller should retry the whole clearing call.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<ClearingError> for AppError {
    fn from(err: ClearingError) -> Self {
        match err {
            ClearingError::InvalidPayment(message) => Self::Validation(message),
            ClearingError::Ledger(err) => err.into(),
            ClearingError::Settlement(err) => err.into(),
        }
    }
}
