//! Storage seam of the posting engine.

use async_trait::async_trait;
use settla_shared::types::AccountId;

use super::account::{Account, AccountKey};
use super::balance::BalanceChange;
use super::error::LedgerError;
use super::types::{EntryLine, JournalEntry};
use crate::chart::Subject;

/// Persistence required by [`PostingEngine`](super::PostingEngine).
///
/// Lookups return `Ok(None)` for missing rows; the engine turns those into
/// not-found errors.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Loads a chart-of-accounts subject.
    async fn get_subject(&self, code: &str) -> Result<Option<Subject>, LedgerError>;

    /// Loads an account by its natural key.
    async fn get_account(
        &self,
        subject_code: &str,
        entity_id: &str,
    ) -> Result<Option<Account>, LedgerError>;

    /// Loads an account by id.
    async fn get_account_by_id(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;

    /// Returns the account for `key`, creating it with a zero balance if absent.
    ///
    /// Concurrent callers with the same key must all observe the same account.
    async fn get_or_create_account(
        &self,
        key: &AccountKey,
        currency: &str,
    ) -> Result<Account, LedgerError>;

    /// Persists a validated entry and applies its balance changes atomically.
    ///
    /// Implementations lock every touched account exclusively (in a
    /// deterministic order), stage the deltas with
    /// [`stage_balance_changes`](super::stage_balance_changes), then insert the
    /// entry and apply every change. Either all of it becomes visible or none.
    ///
    /// # Errors
    ///
    /// - `DuplicateTransaction` / `DuplicateEntryNo` when the entry's keys exist
    /// - `AccountNotFound` when a line references an unknown account
    /// - `LockTimeout`, `VersionMismatch` or `ConcurrentModification` on contention
    async fn create_journal_entry(
        &self,
        entry: &JournalEntry,
    ) -> Result<Vec<BalanceChange>, LedgerError>;

    /// Loads an entry with its lines by voucher number.
    async fn find_entry_by_no(&self, entry_no: &str) -> Result<Option<JournalEntry>, LedgerError>;

    /// Loads the entry posted for a transaction id, if any.
    async fn find_entry_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<JournalEntry>, LedgerError>;

    /// Every line ever posted to an account, in posting order.
    async fn lines_for_account(&self, account_id: AccountId)
    -> Result<Vec<EntryLine>, LedgerError>;
}
