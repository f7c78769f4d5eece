//! Balance staging and reconciliation.
//!
//! A posting never writes balances directly. The engine first stages one
//! [`BalanceChange`] per touched account from the entry's lines and the
//! accounts' subject types, and the store applies the staged changes in the
//! same atomic unit that inserts the entry.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use settla_shared::types::AccountId;

use super::account::Account;
use super::error::LedgerError;
use super::types::EntryLine;
use crate::chart::SubjectType;

/// Balance transition of one account caused by one journal entry.
///
/// - `current_balance = previous_balance + sum(deltas of lines on this account)`
/// - `version` is the account version after the posting (read version + 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// The account ID.
    pub account_id: AccountId,
    /// Balance before the entry.
    pub previous_balance: i64,
    /// Balance after the entry.
    pub current_balance: i64,
    /// Account version after the entry.
    pub version: i64,
}

impl BalanceChange {
    /// The signed amount this entry moved the balance by.
    #[must_use]
    pub fn delta(&self) -> i64 {
        self.current_balance - self.previous_balance
    }

    /// The version the account must still have for the change to apply.
    #[must_use]
    pub fn expected_version(&self) -> i64 {
        self.version - 1
    }
}

/// Stages the balance changes an entry's lines make to the given accounts.
///
/// Lines hitting the same account are aggregated, so each account gets
/// exactly one change and one version bump per entry. Changes are returned
/// ordered by account id.
///
/// # Errors
///
/// Returns `LedgerError::AccountNotFound` if a line references an account
/// that was not supplied, and `LedgerError::BalanceOverflow` if a resulting
/// balance does not fit in an `i64`.
pub fn stage_balance_changes(
    lines: &[EntryLine],
    accounts: &[(Account, SubjectType)],
) -> Result<Vec<BalanceChange>, LedgerError> {
    let by_id: HashMap<AccountId, &(Account, SubjectType)> =
        accounts.iter().map(|pair| (pair.0.id, pair)).collect();

    let mut deltas: BTreeMap<AccountId, i64> = BTreeMap::new();
    for line in lines {
        let (_, subject_type) = by_id
            .get(&line.account_id)
            .ok_or(LedgerError::AccountNotFound(line.account_id))?;
        let delta = subject_type.balance_delta(line.direction, line.amount);
        let total = deltas.entry(line.account_id).or_insert(0);
        *total = total
            .checked_add(delta)
            .ok_or(LedgerError::BalanceOverflow(line.account_id))?;
    }

    deltas
        .into_iter()
        .map(|(account_id, delta)| {
            let (account, _) = by_id
                .get(&account_id)
                .ok_or(LedgerError::AccountNotFound(account_id))?;
            let current_balance = account
                .balance
                .checked_add(delta)
                .ok_or(LedgerError::BalanceOverflow(account_id))?;
            Ok(BalanceChange {
                account_id,
                previous_balance: account.balance,
                current_balance,
                version: account.version + 1,
            })
        })
        .collect()
}

/// Result of recomputing an account's balance from its posted lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// The account ID.
    pub account_id: AccountId,
    /// Balance stored on the account.
    pub stored_balance: i64,
    /// Balance recomputed from every line posted to the account.
    pub computed_balance: i64,
    /// Number of lines considered.
    pub line_count: usize,
}

impl Reconciliation {
    /// Recomputes the balance of `account` from `lines`.
    ///
    /// Lines for other accounts are ignored.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::BalanceOverflow` if the running sum overflows.
    pub fn compute(
        account: &Account,
        subject_type: SubjectType,
        lines: &[EntryLine],
    ) -> Result<Self, LedgerError> {
        let mut computed_balance = 0i64;
        let mut line_count = 0;
        for line in lines.iter().filter(|l| l.account_id == account.id) {
            computed_balance = computed_balance
                .checked_add(subject_type.balance_delta(line.direction, line.amount))
                .ok_or(LedgerError::BalanceOverflow(account.id))?;
            line_count += 1;
        }
        Ok(Self {
            account_id: account.id,
            stored_balance: account.balance,
            computed_balance,
            line_count,
        })
    }

    /// Returns true if the stored balance matches the posted lines.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.stored_balance == self.computed_balance
    }
}
