//! Ledger posting engine.
//!
//! The engine owns everything about a posting that does not need storage:
//! validation, voucher numbering, line numbering and logging. The atomic
//! multi-account write is delegated to a [`LedgerStore`].

use std::sync::Arc;

use chrono::Utc;
use settla_shared::types::{AccountId, EntryLineId, JournalEntryId};
use tracing::{info, instrument, warn};

use super::account::{Account, AccountKey};
use super::balance::{BalanceChange, Reconciliation};
use super::entry_no::EntryNoGenerator;
use super::error::LedgerError;
use super::reversal::build_reversal;
use super::store::LedgerStore;
use super::types::{EntryLine, JournalEntry, NewJournalEntry};
use super::validation::validate_entry;
use crate::error::ErrorKind;

/// Writes attempted with freshly generated entry numbers before giving up.
const ENTRY_NO_ATTEMPTS: u32 = 3;

/// A committed journal entry and the balance changes it applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedEntry {
    /// The persisted entry.
    pub entry: JournalEntry,
    /// One change per touched account, ordered by account id.
    pub balances: Vec<BalanceChange>,
}

impl PostedEntry {
    /// The change applied to `account_id`, if the entry touched it.
    #[must_use]
    pub fn balance_of(&self, account_id: AccountId) -> Option<&BalanceChange> {
        self.balances.iter().find(|c| c.account_id == account_id)
    }
}

/// Validates and posts journal entries through a [`LedgerStore`].
pub struct PostingEngine<S: LedgerStore + ?Sized> {
    store: Arc<S>,
    numbers: Arc<EntryNoGenerator>,
    currency: String,
}

impl<S: LedgerStore + ?Sized> Clone for PostingEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            numbers: Arc::clone(&self.numbers),
            currency: self.currency.clone(),
        }
    }
}

impl<S: LedgerStore + ?Sized> PostingEngine<S> {
    /// Creates an engine that opens new accounts in `currency`.
    pub fn new(store: Arc<S>, currency: impl Into<String>) -> Self {
        Self::with_numbers(store, Arc::new(EntryNoGenerator::journal()), currency)
    }

    /// Creates an engine with a shared entry number generator.
    pub fn with_numbers(
        store: Arc<S>,
        numbers: Arc<EntryNoGenerator>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            store,
            numbers,
            currency: currency.into(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Currency of accounts created by this engine.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Validates and atomically posts a journal entry.
    ///
    /// Steps:
    /// 1. Structural validation (no account is touched on failure)
    /// 2. Assigns the entry number and posting date when absent
    /// 3. Hands the entry to the store, which locks the accounts, applies
    ///    every balance delta and persists the entry, all or nothing
    ///
    /// A generated entry number that collides is replaced and the write
    /// retried; a caller-supplied one is never replaced.
    ///
    /// # Errors
    ///
    /// - Validation errors from [`validate_entry`]
    /// - `DuplicateTransaction` if the transaction id was already posted
    /// - `DuplicateEntryNo` if a supplied entry number is taken
    /// - Conflict errors (retryable) if account locks or versions clash
    #[instrument(skip(self, input), fields(transaction_id = %input.transaction_id))]
    pub async fn post_entry(&self, input: NewJournalEntry) -> Result<PostedEntry, LedgerError> {
        let totals = validate_entry(&input)?;

        let supplied_no = input.entry_no.filter(|no| !no.trim().is_empty());
        let generated = supplied_no.is_none();
        let entry_no = supplied_no.unwrap_or_else(|| self.numbers.next_no());
        let posting_date = input
            .posting_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let id = JournalEntryId::new();

        let lines = input
            .lines
            .into_iter()
            .enumerate()
            .map(|(index, line)| {
                let line_no = i32::try_from(index + 1)
                    .map_err(|_| LedgerError::Internal("too many entry lines".to_string()))?;
                Ok(EntryLine {
                    id: EntryLineId::new(),
                    entry_id: id,
                    line_no,
                    account_id: line.account_id,
                    direction: line.direction,
                    amount: line.amount,
                    memo: line.memo,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        let mut entry = JournalEntry {
            id,
            entry_no,
            transaction_id: input.transaction_id,
            event_type: input.event_type,
            posting_date,
            description: input.description,
            lines,
            created_at: Utc::now(),
        };

        let mut attempt = 1;
        let result = loop {
            match self.store.create_journal_entry(&entry).await {
                Err(LedgerError::DuplicateEntryNo(taken))
                    if generated && attempt < ENTRY_NO_ATTEMPTS =>
                {
                    warn!(entry_no = %taken, attempt, "generated entry number taken, regenerating");
                    entry.entry_no = self.numbers.next_no();
                    attempt += 1;
                }
                other => break other,
            }
        };

        match result {
            Ok(balances) => {
                info!(
                    entry_no = %entry.entry_no,
                    event_type = %entry.event_type,
                    amount = totals.debit,
                    lines = entry.lines.len(),
                    "journal entry posted"
                );
                Ok(PostedEntry { entry, balances })
            }
            Err(err) => {
                if matches!(err.kind(), ErrorKind::Conflict | ErrorKind::Duplicate) {
                    warn!(entry_no = %entry.entry_no, error = %err, "journal entry rejected");
                }
                Err(err)
            }
        }
    }

    /// Returns the account for `(subject_code, entity_id)`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::SubjectNotFound` if the subject is not in the chart.
    #[instrument(skip(self))]
    pub async fn create_account(
        &self,
        subject_code: &str,
        entity_id: &str,
    ) -> Result<Account, LedgerError> {
        if self.store.get_subject(subject_code).await?.is_none() {
            return Err(LedgerError::SubjectNotFound(subject_code.to_string()));
        }
        self.store
            .get_or_create_account(&AccountKey::new(subject_code, entity_id), &self.currency)
            .await
    }

    /// Loads an account by natural key.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountKeyNotFound` if it does not exist.
    pub async fn get_account(
        &self,
        subject_code: &str,
        entity_id: &str,
    ) -> Result<Account, LedgerError> {
        self.store
            .get_account(subject_code, entity_id)
            .await?
            .ok_or_else(|| LedgerError::AccountKeyNotFound {
                subject_code: subject_code.to_string(),
                entity_id: entity_id.to_string(),
            })
    }

    /// Loads an account by id.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountNotFound` if it does not exist.
    pub async fn get_account_by_id(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .get_account_by_id(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Loads an entry by voucher number.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::EntryNotFound` if it does not exist.
    pub async fn get_entry(&self, entry_no: &str) -> Result<JournalEntry, LedgerError> {
        self.store
            .find_entry_by_no(entry_no)
            .await?
            .ok_or_else(|| LedgerError::EntryNotFound(entry_no.to_string()))
    }

    /// The entry posted for a business transaction, if any.
    pub async fn entry_for_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        self.store.find_entry_by_transaction(transaction_id).await
    }

    /// Posts the reversing entry of `entry_no`.
    ///
    /// # Errors
    ///
    /// - `LedgerError::EntryNotFound` if the original does not exist
    /// - `LedgerError::DuplicateTransaction` if it was already reversed
    #[instrument(skip(self))]
    pub async fn reverse_entry(
        &self,
        entry_no: &str,
        reason: &str,
    ) -> Result<PostedEntry, LedgerError> {
        let original = self.get_entry(entry_no).await?;
        self.post_entry(build_reversal(&original, reason)).await
    }

    /// Recomputes an account's balance from its lines.
    ///
    /// # Errors
    ///
    /// Returns not-found errors for an unknown account or subject.
    pub async fn reconcile_account(&self, id: AccountId) -> Result<Reconciliation, LedgerError> {
        let account = self.get_account_by_id(id).await?;
        let subject = self
            .store
            .get_subject(&account.subject_code)
            .await?
            .ok_or_else(|| LedgerError::SubjectNotFound(account.subject_code.clone()))?;
        let lines = self.store.lines_for_account(id).await?;
        let reconciliation = Reconciliation::compute(&account, subject.subject_type, &lines)?;
        if !reconciliation.is_balanced() {
            warn!(
                account_id = %id,
                stored = reconciliation.stored_balance,
                computed = reconciliation.computed_balance,
                "account balance does not match its entry lines"
            );
        }
        Ok(reconciliation)
    }
}
