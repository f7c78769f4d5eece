//! String-backed enum columns.
//!
//! Each column is a `VARCHAR` guarded by a `CHECK` constraint in the
//! migration, and each enum converts to and from its domain counterpart.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use settla_core::chart;
use settla_core::ledger;
use settla_core::settlement;

/// Accounting type of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum SubjectType {
    /// Asset.
    #[sea_orm(string_value = "asset")]
    Asset,
    /// Liability.
    #[sea_orm(string_value = "liability")]
    Liability,
    /// Equity.
    #[sea_orm(string_value = "equity")]
    Equity,
    /// Income.
    #[sea_orm(string_value = "income")]
    Income,
    /// Expense.
    #[sea_orm(string_value = "expense")]
    Expense,
}

impl From<chart::SubjectType> for SubjectType {
    fn from(value: chart::SubjectType) -> Self {
        match value {
            chart::SubjectType::Asset => Self::Asset,
            chart::SubjectType::Liability => Self::Liability,
            chart::SubjectType::Equity => Self::Equity,
            chart::SubjectType::Income => Self::Income,
            chart::SubjectType::Expense => Self::Expense,
        }
    }
}

impl From<SubjectType> for chart::SubjectType {
    fn from(value: SubjectType) -> Self {
        match value {
            SubjectType::Asset => Self::Asset,
            SubjectType::Liability => Self::Liability,
            SubjectType::Equity => Self::Equity,
            SubjectType::Income => Self::Income,
            SubjectType::Expense => Self::Expense,
        }
    }
}

/// Side of an entry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum EntryDirection {
    /// Debit.
    #[sea_orm(string_value = "debit")]
    Debit,
    /// Credit.
    #[sea_orm(string_value = "credit")]
    Credit,
}

impl From<ledger::Direction> for EntryDirection {
    fn from(value: ledger::Direction) -> Self {
        match value {
            ledger::Direction::Debit => Self::Debit,
            ledger::Direction::Credit => Self::Credit,
        }
    }
}

impl From<EntryDirection> for ledger::Direction {
    fn from(value: EntryDirection) -> Self {
        match value {
            EntryDirection::Debit => Self::Debit,
            EntryDirection::Credit => Self::Credit,
        }
    }
}

/// Business event behind a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum JournalEventType {
    /// Cleared order payment.
    #[sea_orm(string_value = "payment_success")]
    PaymentSuccess,
    /// Reversing entry.
    #[sea_orm(string_value = "reversal")]
    Reversal,
    /// Adjustment.
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    /// Operator entry.
    #[sea_orm(string_value = "manual")]
    Manual,
}

impl From<ledger::EventType> for JournalEventType {
    fn from(value: ledger::EventType) -> Self {
        match value {
            ledger::EventType::PaymentSuccess => Self::PaymentSuccess,
            ledger::EventType::Reversal => Self::Reversal,
            ledger::EventType::Adjustment => Self::Adjustment,
            ledger::EventType::Manual => Self::Manual,
        }
    }
}

impl From<JournalEventType> for ledger::EventType {
    fn from(value: JournalEventType) -> Self {
        match value {
            JournalEventType::PaymentSuccess => Self::PaymentSuccess,
            JournalEventType::Reversal => Self::Reversal,
            JournalEventType::Adjustment => Self::Adjustment,
            JournalEventType::Manual => Self::Manual,
        }
    }
}

/// Settlement lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum SettlementStatus {
    /// Accepting orders.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Closed for orders.
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Paid out.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Abandoned.
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl From<settlement::SettlementStatus> for SettlementStatus {
    fn from(value: settlement::SettlementStatus) -> Self {
        match value {
            settlement::SettlementStatus::Pending => Self::Pending,
            settlement::SettlementStatus::Processing => Self::Processing,
            settlement::SettlementStatus::Completed => Self::Completed,
            settlement::SettlementStatus::Failed => Self::Failed,
        }
    }
}

impl From<SettlementStatus> for settlement::SettlementStatus {
    fn from(value: SettlementStatus) -> Self {
        match value {
            SettlementStatus::Pending => Self::Pending,
            SettlementStatus::Processing => Self::Processing,
            SettlementStatus::Completed => Self::Completed,
            SettlementStatus::Failed => Self::Failed,
        }
    }
}

/// Settlement billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum SettlementCycle {
    /// Daily.
    #[sea_orm(string_value = "daily")]
    Daily,
    /// Weekly.
    #[sea_orm(string_value = "weekly")]
    Weekly,
    /// Monthly.
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

impl From<settlement::SettlementCycle> for SettlementCycle {
    fn from(value: settlement::SettlementCycle) -> Self {
        match value {
            settlement::SettlementCycle::Daily => Self::Daily,
            settlement::SettlementCycle::Weekly => Self::Weekly,
            settlement::SettlementCycle::Monthly => Self::Monthly,
        }
    }
}

impl From<SettlementCycle> for settlement::SettlementCycle {
    fn from(value: SettlementCycle) -> Self {
        match value {
            SettlementCycle::Daily => Self::Daily,
            SettlementCycle::Weekly => Self::Weekly,
            SettlementCycle::Monthly => Self::Monthly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveEnum, Iterable};

    #[test]
    fn test_string_values_match_domain_names() {
        for status in SettlementStatus::iter() {
            let domain: settlement::SettlementStatus = status.into();
            assert_eq!(status.to_value(), domain.as_str());
        }
        for kind in SubjectType::iter() {
            let domain: chart::SubjectType = kind.into();
            assert_eq!(kind.to_value(), domain.as_str());
        }
        for event in JournalEventType::iter() {
            let domain: ledger::EventType = event.into();
            assert_eq!(event.to_value(), domain.as_str());
        }
        for cycle in SettlementCycle::iter() {
            let domain: settlement::SettlementCycle = cycle.into();
            assert_eq!(cycle.to_value(), domain.as_str());
        }
        for direction in EntryDirection::iter() {
            let domain: ledger::Direction = direction.into();
            assert_eq!(direction.to_value(), domain.as_str());
        }
    }
}
