//! Re-exports of every entity under its table name.

pub use super::accounts::Entity as Accounts;
pub use super::entry_lines::Entity as EntryLines;
pub use super::journal_entries::Entity as JournalEntries;
pub use super::merchant_accounts::Entity as MerchantAccounts;
pub use super::settlement_details::Entity as SettlementDetails;
pub use super::settlements::Entity as Settlements;
pub use super::subjects::Entity as Subjects;
