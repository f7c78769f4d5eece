//! Payment clearing.
//!
//! Folds a captured payment into one balanced journal entry that splits the
//! gross amount between the merchant payable and platform fee income.

pub mod entry;
pub mod error;
pub mod service;

pub use entry::{ClearingAccounts, PaymentSuccess, build_clearing_entry, merchant_entity_id};
pub use error::ClearingError;
pub use service::{ClearingReceipt, ClearingService};
