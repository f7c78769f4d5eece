//! Double-entry bookkeeping logic.
//!
//! This module implements the ledger core:
//! - Journal entries (vouchers) and their debit/credit lines
//! - Structural validation (positive amounts, at least two lines, balanced)
//! - Balance staging under the subject sign convention
//! - The posting engine and the storage seam it posts through
//! - Reversing entries and account reconciliation

pub mod account;
pub mod balance;
pub mod entry_no;
pub mod error;
pub mod reversal;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod validation_props;

pub use account::{Account, AccountKey};
pub use balance::{BalanceChange, Reconciliation, stage_balance_changes};
pub use entry_no::EntryNoGenerator;
pub use error::LedgerError;
pub use reversal::build_reversal;
pub use service::{PostedEntry, PostingEngine};
pub use store::LedgerStore;
pub use types::{
    Direction, EntryLine, EntryTotals, EventType, JournalEntry, NewEntryLine, NewJournalEntry,
};
pub use validation::validate_entry;
