//! Postgres implementation of the ledger store.
//!
//! Posting runs in one database transaction: every touched account row is
//! locked with `SELECT ... FOR UPDATE` in ascending id order, balances are
//! staged in memory, the entry and its lines are inserted, and each account
//! is written back with a version compare. A `lock_timeout` bounds how long a
//! posting waits behind another one.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use settla_core::chart::{Subject, SubjectType};
use settla_core::ledger::{
    Account, AccountKey, BalanceChange, EntryLine, JournalEntry, LedgerError, LedgerStore,
    stage_balance_changes,
};
use settla_shared::ClearingConfig;
use settla_shared::types::{AccountId, EntryLineId, JournalEntryId};
use tracing::debug;

use super::error::{Failure, UQ_ENTRY_NO, UQ_ENTRY_TRANSACTION, classify, ledger_error};
use crate::entities::{accounts, entry_lines, journal_entries, subjects};

/// Ledger store backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
    lock_timeout_ms: u64,
}

impl PgLedgerStore {
    /// Creates a new store.
    ///
    /// `lock_timeout_ms` bounds how long a posting waits for an account lock.
    #[must_use]
    pub const fn new(db: DatabaseConnection, lock_timeout_ms: u64) -> Self {
        Self {
            db,
            lock_timeout_ms,
        }
    }

    /// Creates a store using the configured lock timeout.
    #[must_use]
    pub fn from_config(db: DatabaseConnection, config: &ClearingConfig) -> Self {
        Self::new(db, config.lock_timeout_ms)
    }

    async fn begin(&self) -> Result<DatabaseTransaction, LedgerError> {
        let txn = self.db.begin().await.map_err(ledger_error)?;
        txn.execute_unprepared(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout_ms
        ))
        .await
        .map_err(ledger_error)?;
        Ok(txn)
    }

    /// Locks the accounts touched by `entry` in ascending id order and pairs
    /// each with its subject type.
    async fn lock_accounts(
        txn: &DatabaseTransaction,
        entry: &JournalEntry,
    ) -> Result<Vec<(Account, SubjectType)>, LedgerError> {
        let ids: BTreeSet<AccountId> = entry.lines.iter().map(|l| l.account_id).collect();

        let mut locked = Vec::with_capacity(ids.len());
        for id in ids {
            let model = accounts::Entity::find_by_id(id.into_inner())
                .lock_exclusive()
                .one(txn)
                .await
                .map_err(|e| lock_error(e, id))?
                .ok_or(LedgerError::AccountNotFound(id))?;
            locked.push(account_from_model(model));
        }

        let codes: BTreeSet<&str> = locked.iter().map(|a| a.subject_code.as_str()).collect();
        let types: HashMap<String, SubjectType> = subjects::Entity::find()
            .filter(subjects::Column::Code.is_in(codes))
            .all(txn)
            .await
            .map_err(ledger_error)?
            .into_iter()
            .map(|s| (s.code, s.subject_type.into()))
            .collect();

        locked
            .into_iter()
            .map(|account| {
                let kind = types
                    .get(&account.subject_code)
                    .copied()
                    .ok_or_else(|| LedgerError::SubjectNotFound(account.subject_code.clone()))?;
                Ok((account, kind))
            })
            .collect()
    }

    async fn insert_entry(
        txn: &DatabaseTransaction,
        entry: &JournalEntry,
    ) -> Result<(), LedgerError> {
        let header = journal_entries::ActiveModel {
            id: Set(entry.id.into_inner()),
            entry_no: Set(entry.entry_no.clone()),
            transaction_id: Set(entry.transaction_id.clone()),
            event_type: Set(entry.event_type.into()),
            posting_date: Set(entry.posting_date),
            description: Set(entry.description.clone()),
            created_at: Set(entry.created_at.into()),
        };
        journal_entries::Entity::insert(header)
            .exec_without_returning(txn)
            .await
            .map_err(|err| {
                let failure = classify(&err);
                if failure.violates(UQ_ENTRY_TRANSACTION) {
                    LedgerError::DuplicateTransaction(entry.transaction_id.clone())
                } else if failure.violates(UQ_ENTRY_NO) {
                    LedgerError::DuplicateEntryNo(entry.entry_no.clone())
                } else {
                    ledger_error(err)
                }
            })?;

        let lines = entry.lines.iter().map(|line| entry_lines::ActiveModel {
            id: Set(line.id.into_inner()),
            entry_id: Set(entry.id.into_inner()),
            line_no: Set(line.line_no),
            account_id: Set(line.account_id.into_inner()),
            direction: Set(line.direction.into()),
            amount: Set(line.amount),
            memo: Set(line.memo.clone()),
        });
        entry_lines::Entity::insert_many(lines)
            .exec_without_returning(txn)
            .await
            .map_err(ledger_error)?;
        Ok(())
    }

    /// Writes a staged balance back, guarded by the version it was read at.
    async fn apply_change(
        txn: &DatabaseTransaction,
        change: &BalanceChange,
    ) -> Result<(), LedgerError> {
        let id = change.account_id.into_inner();
        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::Balance, Expr::value(change.current_balance))
            .col_expr(accounts::Column::Version, Expr::value(change.version))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(accounts::Column::Id.eq(id))
            .filter(accounts::Column::Version.eq(change.expected_version()))
            .exec(txn)
            .await
            .map_err(ledger_error)?;

        if result.rows_affected == 0 {
            let actual = accounts::Entity::find_by_id(id)
                .one(txn)
                .await
                .map_err(ledger_error)?
                .map_or(-1, |m| m.version);
            return Err(LedgerError::VersionMismatch {
                account_id: change.account_id,
                expected: change.expected_version(),
                actual,
            });
        }
        Ok(())
    }

    async fn load_lines(&self, entry: journal_entries::Model) -> Result<JournalEntry, LedgerError> {
        let lines = entry_lines::Entity::find()
            .filter(entry_lines::Column::EntryId.eq(entry.id))
            .order_by_asc(entry_lines::Column::LineNo)
            .all(&self.db)
            .await
            .map_err(ledger_error)?;
        Ok(entry_from_models(entry, lines))
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get_subject(&self, code: &str) -> Result<Option<Subject>, LedgerError> {
        let model = subjects::Entity::find_by_id(code.to_string())
            .one(&self.db)
            .await
            .map_err(ledger_error)?;
        Ok(model.map(|m| Subject::new(m.code, m.name, m.subject_type.into(), m.description)))
    }

    async fn get_account(
        &self,
        subject_code: &str,
        entity_id: &str,
    ) -> Result<Option<Account>, LedgerError> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::SubjectCode.eq(subject_code))
            .filter(accounts::Column::EntityId.eq(entity_id))
            .one(&self.db)
            .await
            .map_err(ledger_error)?;
        Ok(model.map(account_from_model))
    }

    async fn get_account_by_id(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        let model = accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(ledger_error)?;
        Ok(model.map(account_from_model))
    }

    async fn get_or_create_account(
        &self,
        key: &AccountKey,
        currency: &str,
    ) -> Result<Account, LedgerError> {
        let account = Account::open(key.clone(), currency);
        let model = accounts::ActiveModel {
            id: Set(account.id.into_inner()),
            subject_code: Set(account.subject_code.clone()),
            entity_id: Set(account.entity_id.clone()),
            balance: Set(account.balance),
            currency: Set(account.currency.clone()),
            version: Set(account.version),
            created_at: Set(account.created_at.into()),
            updated_at: Set(account.updated_at.into()),
        };

        // The losing writer of a concurrent create reads the winner's row.
        accounts::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([accounts::Column::SubjectCode, accounts::Column::EntityId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(ledger_error)?;

        self.get_account(&key.subject_code, &key.entity_id)
            .await?
            .ok_or_else(|| LedgerError::AccountKeyNotFound {
                subject_code: key.subject_code.clone(),
                entity_id: key.entity_id.clone(),
            })
    }

    async fn create_journal_entry(
        &self,
        entry: &JournalEntry,
    ) -> Result<Vec<BalanceChange>, LedgerError> {
        let txn = self.begin().await?;

        let accounts = Self::lock_accounts(&txn, entry).await?;
        let changes = stage_balance_changes(&entry.lines, &accounts)?;

        Self::insert_entry(&txn, entry).await?;
        for change in &changes {
            Self::apply_change(&txn, change).await?;
        }

        txn.commit().await.map_err(ledger_error)?;
        debug!(
            entry_no = %entry.entry_no,
            accounts = changes.len(),
            "Journal entry committed"
        );
        Ok(changes)
    }

    async fn find_entry_by_no(&self, entry_no: &str) -> Result<Option<JournalEntry>, LedgerError> {
        let header = journal_entries::Entity::find()
            .filter(journal_entries::Column::EntryNo.eq(entry_no))
            .one(&self.db)
            .await
            .map_err(ledger_error)?;
        match header {
            Some(model) => Ok(Some(self.load_lines(model).await?)),
            None => Ok(None),
        }
    }

    async fn find_entry_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        let header = journal_entries::Entity::find()
            .filter(journal_entries::Column::TransactionId.eq(transaction_id))
            .one(&self.db)
            .await
            .map_err(ledger_error)?;
        match header {
            Some(model) => Ok(Some(self.load_lines(model).await?)),
            None => Ok(None),
        }
    }

    async fn lines_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<EntryLine>, LedgerError> {
        let models = entry_lines::Entity::find()
            .filter(entry_lines::Column::AccountId.eq(account_id.into_inner()))
            .order_by_asc(entry_lines::Column::EntryId)
            .order_by_asc(entry_lines::Column::LineNo)
            .all(&self.db)
            .await
            .map_err(ledger_error)?;
        Ok(models.into_iter().map(line_from_model).collect())
    }
}

/// A lock timeout while locking `id` names the account in the error.
fn lock_error(err: sea_orm::DbErr, id: AccountId) -> LedgerError {
    match classify(&err) {
        Failure::LockTimeout(_) => LedgerError::LockTimeout(id),
        _ => ledger_error(err),
    }
}

fn account_from_model(model: accounts::Model) -> Account {
    Account {
        id: AccountId::from_uuid(model.id),
        subject_code: model.subject_code,
        entity_id: model.entity_id,
        balance: model.balance,
        currency: model.currency,
        version: model.version,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn line_from_model(model: entry_lines::Model) -> EntryLine {
    EntryLine {
        id: EntryLineId::from_uuid(model.id),
        entry_id: JournalEntryId::from_uuid(model.entry_id),
        line_no: model.line_no,
        account_id: AccountId::from_uuid(model.account_id),
        direction: model.direction.into(),
        amount: model.amount,
        memo: model.memo,
    }
}

fn entry_from_models(header: journal_entries::Model, lines: Vec<entry_lines::Model>) -> JournalEntry {
    JournalEntry {
        id: JournalEntryId::from_uuid(header.id),
        entry_no: header.entry_no,
        transaction_id: header.transaction_id,
        event_type: header.event_type.into(),
        posting_date: header.posting_date,
        description: header.description,
        lines: lines.into_iter().map(line_from_model).collect(),
        created_at: header.created_at.with_timezone(&Utc),
    }
}
