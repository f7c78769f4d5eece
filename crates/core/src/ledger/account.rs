//! Concrete ledger accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settla_shared::types::AccountId;

/// Natural key of an account: one account per subject and owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountKey {
    /// Chart-of-accounts subject code.
    pub subject_code: String,
    /// Owner of the account, e.g. `"MERCH_1001"` or `"PLATFORM_MAIN"`.
    pub entity_id: String,
}

impl AccountKey {
    /// Creates an account key.
    #[must_use]
    pub fn new(subject_code: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            subject_code: subject_code.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// A ledger balance for one subject and one owning entity.
///
/// Created lazily with a zero balance, mutated only by postings, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Chart-of-accounts subject code.
    pub subject_code: String,
    /// Owning entity.
    pub entity_id: String,
    /// Signed balance in minor currency units, in the subject's normal sign.
    pub balance: i64,
    /// Currency code.
    pub currency: String,
    /// Optimistic-concurrency counter, incremented by every posting.
    pub version: i64,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Opens a zero-balance account.
    #[must_use]
    pub fn open(key: AccountKey, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            subject_code: key.subject_code,
            entity_id: key.entity_id,
            balance: 0,
            currency: currency.into(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The account's natural key.
    #[must_use]
    pub fn key(&self) -> AccountKey {
        AccountKey::new(self.subject_code.clone(), self.entity_id.clone())
    }
}
