//! Classification of Postgres failures into domain errors.
//!
//! Lock timeouts, deadlocks and serialization failures become the retryable
//! conflict variants; unique violations are reported with the constraint
//! name so callers can map them onto duplicate errors.

use sea_orm::{DbErr, RuntimeErr};
use settla_core::ledger::LedgerError;
use settla_core::settlement::SettlementError;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";

/// Constraint guarding one journal entry per transaction id.
pub(crate) const UQ_ENTRY_TRANSACTION: &str = "uq_journal_entries_transaction_id";
/// Constraint guarding unique voucher numbers.
pub(crate) const UQ_ENTRY_NO: &str = "uq_journal_entries_entry_no";
/// Constraint guarding one settlement detail per order id.
pub(crate) const UQ_SETTLEMENT_ORDER: &str = "uq_settlement_details_order";

/// What went wrong at the database level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Failure {
    /// `lock_timeout` expired while waiting for a row lock.
    LockTimeout(String),
    /// Deadlock or serialization failure.
    Contention(String),
    /// A unique constraint rejected the write.
    UniqueViolation {
        constraint: Option<String>,
        message: String,
    },
    /// Anything else.
    Other(String),
}

impl Failure {
    /// Returns true if the failure is a violation of `name`.
    pub(crate) fn violates(&self, name: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint: Some(c), .. } if c == name)
    }
}

/// Classifies a `SeaORM` error by its SQLSTATE.
pub(crate) fn classify(err: &DbErr) -> Failure {
    let source = match err {
        DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e))
        | DbErr::Conn(RuntimeErr::SqlxError(e)) => e,
        _ => return Failure::Other(err.to_string()),
    };
    let sqlx::Error::Database(db_err) = source else {
        return Failure::Other(err.to_string());
    };
    classify_code(
        db_err.code().as_deref(),
        db_err.constraint(),
        db_err.message(),
    )
}

fn classify_code(code: Option<&str>, constraint: Option<&str>, message: &str) -> Failure {
    match code {
        Some(LOCK_NOT_AVAILABLE) => Failure::LockTimeout(message.to_string()),
        Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED) => Failure::Contention(message.to_string()),
        Some(UNIQUE_VIOLATION) => Failure::UniqueViolation {
            constraint: constraint.map(str::to_string),
            message: message.to_string(),
        },
        _ => Failure::Other(message.to_string()),
    }
}

/// Maps a database error onto the ledger's error type.
pub(crate) fn ledger_error(err: DbErr) -> LedgerError {
    match classify(&err) {
        Failure::LockTimeout(message) | Failure::Contention(message) => {
            LedgerError::ConcurrentModification(message)
        }
        Failure::UniqueViolation { message, .. } | Failure::Other(message) => {
            LedgerError::Database(message)
        }
    }
}

/// Maps a database error onto the settlement error type.
pub(crate) fn settlement_error(err: DbErr) -> SettlementError {
    match classify(&err) {
        Failure::LockTimeout(message) => SettlementError::LockTimeout(message),
        Failure::Contention(message) => SettlementError::VersionMismatch(message),
        Failure::UniqueViolation { message, .. } | Failure::Other(message) => {
            SettlementError::Database(message)
        }
    }
}
