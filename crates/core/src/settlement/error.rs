//! Settlement error types.

use rust_decimal::Decimal;
use settla_shared::AppError;
use settla_shared::types::SettlementId;
use thiserror::Error;

use super::types::SettlementStatus;
use crate::error::ErrorKind;

/// Errors that can occur during settlement operations.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Fee rate outside `[0, 1]`.
    #[error("Fee rate must be a fraction between 0 and 1, got {0}")]
    InvalidFeeRate(Decimal),

    /// Order or payment amount must be positive.
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    /// Settlement period ends before it starts.
    #[error("Settlement period is invalid: {0}")]
    InvalidPeriod(String),

    /// Merchant id is blank.
    #[error("Merchant id must not be blank")]
    MissingMerchantId,

    /// Attempted an invalid status transition.
    #[error("Invalid settlement status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: SettlementStatus,
        /// The attempted target status.
        to: SettlementStatus,
    },

    /// Orders can only be added while the settlement is pending.
    #[error("Settlement is {status} and no longer accepts orders")]
    NotAcceptingOrders {
        /// The current status.
        status: SettlementStatus,
    },

    /// The order was already folded into the settlement.
    #[error("Order {order_id} is already part of settlement {settlement_id}")]
    DuplicateOrder {
        /// The settlement ID.
        settlement_id: SettlementId,
        /// The order ID.
        order_id: String,
    },

    /// Failing a settlement requires a reason.
    #[error("Fail reason is required")]
    FailReasonRequired,

    /// Settlement not found.
    #[error("Settlement not found: {0}")]
    SettlementNotFound(SettlementId),

    /// Merchant account not found.
    #[error("Merchant account not found: {0}")]
    MerchantAccountNotFound(String),

    /// Running totals exceed the representable range.
    #[error("Settlement totals overflow")]
    AmountOverflow,

    /// Row lock could not be acquired in time.
    #[error("Timed out waiting for lock on {0}, please retry")]
    LockTimeout(String),

    /// Row changed between read and write.
    #[error("Concurrent modification of {0}, please retry")]
    VersionMismatch(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFeeRate(_)
            | Self::NonPositiveAmount(_)
            | Self::InvalidPeriod(_)
            | Self::MissingMerchantId
            | Self::FailReasonRequired
            | Self::InvalidTransition { .. }
            | Self::NotAcceptingOrders { .. }
            | Self::AmountOverflow => ErrorKind::Validation,
            Self::DuplicateOrder { .. } => ErrorKind::Duplicate,
            Self::SettlementNotFound(_) | Self::MerchantAccountNotFound(_) => ErrorKind::NotFound,
            Self::LockTimeout(_) | Self::VersionMismatch(_) => ErrorKind::Conflict,
            Self::Database(_) | Self::Internal(_) => ErrorKind::Persistence,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidFeeRate(_) => "INVALID_FEE_RATE",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::InvalidPeriod(_) => "INVALID_PERIOD",
            Self::MissingMerchantId => "MISSING_MERCHANT_ID",
            Self::FailReasonRequired => "FAIL_REASON_REQUIRED",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::NotAcceptingOrders { .. } => "SETTLEMENT_NOT_PENDING",
            Self::DuplicateOrder { .. } => "DUPLICATE_ORDER",
            Self::SettlementNotFound(_) => "SETTLEMENT_NOT_FOUND",
            Self::MerchantAccountNotFound(_) => "MERCHANT_ACCOUNT_NOT_FOUND",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::LockTimeout(_) => "LOCK_TIMEOUT",
            Self::VersionMismatch(_) => "VERSION_MISMATCH",
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

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => match err {
                SettlementError::InvalidTransition { .. }
                | SettlementError::NotAcceptingOrders { .. } => Self::BusinessRule(message),
                _ => Self::Validation(message),
            },
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Duplicate => Self::Duplicate(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::Persistence => Self::Database(message),
        }
    }
}
