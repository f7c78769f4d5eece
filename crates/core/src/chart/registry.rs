//! Immutable chart-of-accounts registry.

use std::collections::BTreeMap;

use super::subject::{Subject, SubjectType};
use crate::ledger::LedgerError;

/// Receivable from the payment channel for captured payments.
pub const CHANNEL_RECEIVABLE: &str = "1122";
/// Amount owed to merchants for cleared orders.
pub const MERCHANT_PAYABLE: &str = "2202";
/// Platform commission earned on cleared orders.
pub const PLATFORM_FEE_INCOME: &str = "6001";
/// Fees charged by the payment channel.
///
/// Clearing never posts here; channel fees are booked as adjustments when the
/// channel's statement arrives, against the channel receivable.
pub const CHANNEL_COST: &str = "6601";

/// Chart of accounts keyed by subject code.
#[derive(Debug, Clone, Default)]
pub struct ChartOfAccounts {
    subjects: BTreeMap<String, Subject>,
}

impl ChartOfAccounts {
    /// Builds a chart from a list of subjects.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidSubject` for a blank code and
    /// `LedgerError::DuplicateSubject` if two subjects share a code.
    pub fn new(subjects: impl IntoIterator<Item = Subject>) -> Result<Self, LedgerError> {
        let mut map = BTreeMap::new();
        for subject in subjects {
            if subject.code.trim().is_empty() {
                return Err(LedgerError::InvalidSubject(
                    "subject code must not be blank".to_string(),
                ));
            }
            if map.contains_key(&subject.code) {
                return Err(LedgerError::DuplicateSubject(subject.code));
            }
            map.insert(subject.code.clone(), subject);
        }
        Ok(Self { subjects: map })
    }

    /// The subjects the clearing service posts to, plus the channel-cost
    /// expense used to book channel statements.
    #[must_use]
    pub fn standard() -> Self {
        let subjects = [
            Subject::new(
                CHANNEL_RECEIVABLE,
                "Receivable - Payment Channel",
                SubjectType::Asset,
                "Gross payments captured by the channel and not yet received",
            ),
            Subject::new(
                MERCHANT_PAYABLE,
                "Accounts Payable - Merchant",
                SubjectType::Liability,
                "Cleared order amounts owed to merchants",
            ),
            Subject::new(
                PLATFORM_FEE_INCOME,
                "Income - Platform Fees",
                SubjectType::Income,
                "Commission retained by the platform",
            ),
            Subject::new(
                CHANNEL_COST,
                "Expense - Channel Fees",
                SubjectType::Expense,
                "Fees charged by payment channels",
            ),
        ];
        Self {
            subjects: subjects
                .into_iter()
                .map(|s| (s.code.clone(), s))
                .collect(),
        }
    }

    /// Looks up a subject by code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Subject> {
        self.subjects.get(code)
    }

    /// Iterates subjects in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    /// Number of subjects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// Returns true if the chart has no subjects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}
