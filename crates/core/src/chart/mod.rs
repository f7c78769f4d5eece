//! Chart of accounts.
//!
//! Subjects are immutable reference data: each one names an accounting
//! category and fixes which side (debit or credit) increases its balance.

pub mod registry;
pub mod subject;

pub use registry::{
    CHANNEL_COST, CHANNEL_RECEIVABLE, ChartOfAccounts, MERCHANT_PAYABLE, PLATFORM_FEE_INCOME,
};
pub use subject::{Subject, SubjectType};
