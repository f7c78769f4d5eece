//! In-memory implementation of the storage traits.
//!
//! Used by the test suites and by embedded deployments without Postgres.
//! Every account, settlement and merchant account is its own
//! `tokio::sync::Mutex`, held in `dashmap` tables; a posting locks its
//! accounts in sorted id order, stages every delta, and only then applies
//! them, so disjoint postings run in parallel and a failed posting leaves
//! nothing behind. An order id maps to at most one settlement for the
//! lifetime of the store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use settla_shared::ClearingConfig;
use settla_shared::types::{AccountId, PageRequest, PageResponse, SettlementId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::chart::{ChartOfAccounts, Subject, SubjectType};
use crate::ledger::{
    Account, AccountKey, BalanceChange, EntryLine, JournalEntry, LedgerError, LedgerStore,
    stage_balance_changes,
};
use crate::settlement::{
    FeeRate, MerchantAccount, Settlement, SettlementDetail, SettlementError, SettlementFilter,
    SettlementStore, SettlementTransition,
};

/// Default time a writer waits for a row lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct JournalTables {
    entries: Vec<JournalEntry>,
    by_no: HashMap<String, usize>,
    by_txn: HashMap<String, usize>,
}

#[derive(Debug)]
struct SettlementRecord {
    seq: u64,
    settlement: Settlement,
    details: Vec<SettlementDetail>,
}

/// Ledger and settlement storage held in process memory.
#[derive(Debug)]
pub struct InMemoryStore {
    chart: ChartOfAccounts,
    accounts: DashMap<AccountId, Arc<Mutex<Account>>>,
    account_keys: DashMap<AccountKey, AccountId>,
    journal: Mutex<JournalTables>,
    settlements: DashMap<SettlementId, Arc<Mutex<SettlementRecord>>>,
    settlement_seq: AtomicU64,
    orders: DashMap<String, SettlementId>,
    merchants: DashMap<String, Arc<Mutex<MerchantAccount>>>,
    lock_timeout: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// A store seeded with the standard chart of accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::with_chart(ChartOfAccounts::standard())
    }

    /// A store seeded with `chart`.
    #[must_use]
    pub fn with_chart(chart: ChartOfAccounts) -> Self {
        Self {
            chart,
            accounts: DashMap::new(),
            account_keys: DashMap::new(),
            journal: Mutex::new(JournalTables::default()),
            settlements: DashMap::new(),
            settlement_seq: AtomicU64::new(0),
            orders: DashMap::new(),
            merchants: DashMap::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// A store with the standard chart and the configured lock timeout.
    #[must_use]
    pub fn from_config(config: &ClearingConfig) -> Self {
        Self::new().with_lock_timeout(Duration::from_millis(config.lock_timeout_ms))
    }

    /// Sets how long writers wait for a row lock before failing with a conflict.
    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    fn account_cell(&self, id: AccountId) -> Option<Arc<Mutex<Account>>> {
        self.accounts.get(&id).map(|cell| Arc::clone(cell.value()))
    }

    fn settlement_cell(&self, id: SettlementId) -> Option<Arc<Mutex<SettlementRecord>>> {
        self.settlements.get(&id).map(|cell| Arc::clone(cell.value()))
    }

    fn merchant_cell(&self, merchant_id: &str) -> Option<Arc<Mutex<MerchantAccount>>> {
        self.merchants
            .get(merchant_id)
            .map(|cell| Arc::clone(cell.value()))
    }

    fn merchant_cell_or_open(
        &self,
        merchant_id: &str,
        fee_rate: FeeRate,
    ) -> Arc<Mutex<MerchantAccount>> {
        let cell = self
            .merchants
            .entry(merchant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(MerchantAccount::open(merchant_id, fee_rate))));
        Arc::clone(cell.value())
    }

    async fn lock_account(
        &self,
        id: AccountId,
    ) -> Result<OwnedMutexGuard<Account>, LedgerError> {
        let cell = self
            .account_cell(id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| LedgerError::LockTimeout(id))
    }

    async fn lock_settlement(
        &self,
        id: SettlementId,
    ) -> Result<OwnedMutexGuard<SettlementRecord>, SettlementError> {
        let cell = self
            .settlement_cell(id)
            .ok_or(SettlementError::SettlementNotFound(id))?;
        tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| SettlementError::LockTimeout(format!("settlement {id}")))
    }

    async fn lock_merchant(
        &self,
        cell: Arc<Mutex<MerchantAccount>>,
        merchant_id: &str,
    ) -> Result<OwnedMutexGuard<MerchantAccount>, SettlementError> {
        tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| SettlementError::LockTimeout(format!("merchant account {merchant_id}")))
    }

    fn subject_type_of(&self, account: &Account) -> Result<SubjectType, LedgerError> {
        self.chart
            .get(&account.subject_code)
            .map(|subject| subject.subject_type)
            .ok_or_else(|| LedgerError::SubjectNotFound(account.subject_code.clone()))
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn get_subject(&self, code: &str) -> Result<Option<Subject>, LedgerError> {
        Ok(self.chart.get(code).cloned())
    }

    async fn get_account(
        &self,
        subject_code: &str,
        entity_id: &str,
    ) -> Result<Option<Account>, LedgerError> {
        let id = self
            .account_keys
            .get(&AccountKey::new(subject_code, entity_id))
            .map(|id| *id.value());
        match id {
            Some(id) => self.get_account_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn get_account_by_id(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        match self.account_cell(id) {
            Some(cell) => Ok(Some(cell.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn get_or_create_account(
        &self,
        key: &AccountKey,
        currency: &str,
    ) -> Result<Account, LedgerError> {
        let id = *self
            .account_keys
            .entry(key.clone())
            .or_insert_with(|| {
                let account = Account::open(key.clone(), currency);
                let id = account.id;
                self.accounts.insert(id, Arc::new(Mutex::new(account)));
                debug!(account_id = %id, subject_code = %key.subject_code, entity_id = %key.entity_id, "account opened");
                id
            })
            .value();

        self.get_account_by_id(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn create_journal_entry(
        &self,
        entry: &JournalEntry,
    ) -> Result<Vec<BalanceChange>, LedgerError> {
        let ids: BTreeSet<AccountId> = entry.lines.iter().map(|l| l.account_id).collect();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock_account(id).await?);
        }

        let accounts = guards
            .iter()
            .map(|guard| Ok(((**guard).clone(), self.subject_type_of(guard)?)))
            .collect::<Result<Vec<_>, LedgerError>>()?;
        let changes = stage_balance_changes(&entry.lines, &accounts)?;

        let mut journal = self.journal.lock().await;
        if journal.by_txn.contains_key(&entry.transaction_id) {
            return Err(LedgerError::DuplicateTransaction(
                entry.transaction_id.clone(),
            ));
        }
        if journal.by_no.contains_key(&entry.entry_no) {
            return Err(LedgerError::DuplicateEntryNo(entry.entry_no.clone()));
        }

        let index = journal.entries.len();
        journal.entries.push(entry.clone());
        journal.by_no.insert(entry.entry_no.clone(), index);
        journal.by_txn.insert(entry.transaction_id.clone(), index);

        let now = Utc::now();
        for guard in &mut guards {
            if let Some(change) = changes.iter().find(|c| c.account_id == guard.id) {
                guard.balance = change.current_balance;
                guard.version = change.version;
                guard.updated_at = now;
            }
        }

        Ok(changes)
    }

    async fn find_entry_by_no(&self, entry_no: &str) -> Result<Option<JournalEntry>, LedgerError> {
        let journal = self.journal.lock().await;
        Ok(journal
            .by_no
            .get(entry_no)
            .and_then(|&i| journal.entries.get(i))
            .cloned())
    }

    async fn find_entry_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<JournalEntry>, LedgerError> {
        let journal = self.journal.lock().await;
        Ok(journal
            .by_txn
            .get(transaction_id)
            .and_then(|&i| journal.entries.get(i))
            .cloned())
    }

    async fn lines_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<EntryLine>, LedgerError> {
        let journal = self.journal.lock().await;
        Ok(journal
            .entries
            .iter()
            .flat_map(|e| e.lines.iter())
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SettlementStore for InMemoryStore {
    async fn insert_settlement(&self, settlement: &Settlement) -> Result<(), SettlementError> {
        let seq = self.settlement_seq.fetch_add(1, Ordering::SeqCst);
        self.settlements.insert(
            settlement.id,
            Arc::new(Mutex::new(SettlementRecord {
                seq,
                settlement: settlement.clone(),
                details: Vec::new(),
            })),
        );
        Ok(())
    }

    async fn get_settlement(
        &self,
        id: SettlementId,
    ) -> Result<Option<Settlement>, SettlementError> {
        match self.settlement_cell(id) {
            Some(cell) => Ok(Some(cell.lock().await.settlement.clone())),
            None => Ok(None),
        }
    }

    async fn list_settlements(
        &self,
        filter: &SettlementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<Settlement>, SettlementError> {
        let cells: Vec<_> = self
            .settlements
            .iter()
            .map(|cell| Arc::clone(cell.value()))
            .collect();

        let mut matching = Vec::new();
        for cell in cells {
            let record = cell.lock().await;
            if filter.matches(&record.settlement) {
                matching.push((record.seq, record.settlement.clone()));
            }
        }
        matching.sort_by(|a, b| b.0.cmp(&a.0));

        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        let data = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, settlement)| settlement)
            .collect();

        Ok(PageResponse::new(data, page, total))
    }

    async fn list_details(
        &self,
        settlement_id: SettlementId,
    ) -> Result<Vec<SettlementDetail>, SettlementError> {
        match self.settlement_cell(settlement_id) {
            Some(cell) => Ok(cell.lock().await.details.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn append_detail(
        &self,
        detail: &SettlementDetail,
    ) -> Result<Settlement, SettlementError> {
        let mut record = self.lock_settlement(detail.settlement_id).await?;

        let mut updated = record.settlement.clone();
        match self.orders.entry(detail.order_id.clone()) {
            Entry::Occupied(owner) => {
                return Err(SettlementError::DuplicateOrder {
                    settlement_id: *owner.get(),
                    order_id: detail.order_id.clone(),
                });
            }
            Entry::Vacant(slot) => {
                updated.apply_detail(detail)?;
                slot.insert(detail.settlement_id);
            }
        }

        record.settlement = updated.clone();
        record.details.push(detail.clone());
        Ok(updated)
    }

    async fn transition(
        &self,
        id: SettlementId,
        transition: &SettlementTransition,
    ) -> Result<Settlement, SettlementError> {
        let mut record = self.lock_settlement(id).await?;
        let mut updated = record.settlement.clone();
        transition.apply(&mut updated)?;
        record.settlement = updated.clone();
        Ok(updated)
    }

    async fn complete_and_credit(
        &self,
        id: SettlementId,
        transition: &SettlementTransition,
        default_rate: FeeRate,
    ) -> Result<(Settlement, MerchantAccount), SettlementError> {
        let mut record = self.lock_settlement(id).await?;
        let mut settlement = record.settlement.clone();
        transition.apply(&mut settlement)?;

        let cell = self.merchant_cell_or_open(&settlement.merchant_id, default_rate);
        let mut merchant = self.lock_merchant(cell, &settlement.merchant_id).await?;
        let mut account = merchant.clone();
        account.credit_settlement(settlement.settlement_amount)?;

        record.settlement = settlement.clone();
        *merchant = account.clone();
        Ok((settlement, account))
    }

    async fn get_merchant_account(
        &self,
        merchant_id: &str,
    ) -> Result<Option<MerchantAccount>, SettlementError> {
        match self.merchant_cell(merchant_id) {
            Some(cell) => Ok(Some(cell.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn get_or_create_merchant_account(
        &self,
        merchant_id: &str,
        fee_rate: FeeRate,
    ) -> Result<MerchantAccount, SettlementError> {
        let cell = self.merchant_cell_or_open(merchant_id, fee_rate);
        Ok(cell.lock().await.clone())
    }
}
