//! Settlement domain types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use settla_shared::types::{MerchantAccountId, SettlementDetailId, SettlementId};
use std::fmt;

use super::error::SettlementError;
use super::fee::{FeeRate, FeeSplit};

/// Settlement lifecycle status.
///
/// State machine:
/// ```text
/// Pending ──process──► Processing ──complete──► Completed
///    │                     │
///    └──────fail──────┬────┘
///                     ▼
///                   Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Accepting orders.
    Pending,
    /// Closed for orders, payout in progress.
    Processing,
    /// Paid out and credited to the merchant account (terminal).
    Completed,
    /// Abandoned (terminal).
    Failed,
}

impl SettlementStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true if `self → next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Failed)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    /// Returns true if no transition leaves this status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing cycle of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementCycle {
    /// T+1 daily settlement.
    Daily,
    /// Weekly settlement.
    Weekly,
    /// Monthly settlement.
    Monthly,
}

impl SettlementCycle {
    /// Returns the string representation of the cycle.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Parses a cycle from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

impl fmt::Display for SettlementCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSettlement {
    /// The merchant being settled.
    pub merchant_id: String,
    /// Billing cycle.
    pub cycle: SettlementCycle,
    /// First day of the period (inclusive).
    pub start_date: NaiveDate,
    /// Last day of the period (inclusive).
    pub end_date: NaiveDate,
}

impl NewSettlement {
    /// Checks the merchant id and period.
    ///
    /// # Errors
    ///
    /// - `SettlementError::MissingMerchantId` for a blank merchant id
    /// - `SettlementError::InvalidPeriod` if the period ends before it starts
    pub fn validate(&self) -> Result<(), SettlementError> {
        if self.merchant_id.trim().is_empty() {
            return Err(SettlementError::MissingMerchantId);
        }
        if self.end_date < self.start_date {
            return Err(SettlementError::InvalidPeriod(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            )));
        }
        Ok(())
    }
}

/// An order to fold into a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInput {
    /// Order identifier; unique within a settlement.
    pub order_id: String,
    /// Human-readable order number.
    pub order_no: String,
    /// Gross order amount in minor units.
    pub amount: i64,
}

/// Periodic payout aggregate for one merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Unique identifier.
    pub id: SettlementId,
    /// Human-readable settlement number.
    pub settlement_no: String,
    /// The merchant being settled.
    pub merchant_id: String,
    /// Billing cycle.
    pub cycle: SettlementCycle,
    /// First day of the period.
    pub start_date: NaiveDate,
    /// Last day of the period.
    pub end_date: NaiveDate,
    /// Number of orders folded in.
    pub order_count: i64,
    /// Sum of gross order amounts.
    pub total_amount: i64,
    /// Sum of platform fees.
    pub platform_fee: i64,
    /// Sum of merchant receivables.
    pub settlement_amount: i64,
    /// Lifecycle status.
    pub status: SettlementStatus,
    /// Reason recorded when the settlement failed.
    pub fail_reason: Option<String>,
    /// When the settlement completed.
    pub settled_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter.
    pub version: i64,
    /// When the settlement was created.
    pub created_at: DateTime<Utc>,
    /// When the settlement last changed.
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// Creates an empty pending settlement.
    #[must_use]
    pub fn new(input: NewSettlement, settlement_no: String) -> Self {
        let now = Utc::now();
        Self {
            id: SettlementId::new(),
            settlement_no,
            merchant_id: input.merchant_id,
            cycle: input.cycle,
            start_date: input.start_date,
            end_date: input.end_date,
            order_count: 0,
            total_amount: 0,
            platform_fee: 0,
            settlement_amount: 0,
            status: SettlementStatus::Pending,
            fail_reason: None,
            settled_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Folds one order detail into the running totals.
    ///
    /// # Errors
    ///
    /// - `SettlementError::NotAcceptingOrders` unless the settlement is pending
    /// - `SettlementError::AmountOverflow` if a total would overflow
    pub fn apply_detail(&mut self, detail: &SettlementDetail) -> Result<(), SettlementError> {
        if self.status != SettlementStatus::Pending {
            return Err(SettlementError::NotAcceptingOrders {
                status: self.status,
            });
        }

        let order_count = self
            .order_count
            .checked_add(1)
            .ok_or(SettlementError::AmountOverflow)?;
        let total_amount = self
            .total_amount
            .checked_add(detail.order_amount)
            .ok_or(SettlementError::AmountOverflow)?;
        let platform_fee = self
            .platform_fee
            .checked_add(detail.platform_fee)
            .ok_or(SettlementError::AmountOverflow)?;
        let settlement_amount = self
            .settlement_amount
            .checked_add(detail.settlement_amount)
            .ok_or(SettlementError::AmountOverflow)?;

        self.order_count = order_count;
        self.total_amount = total_amount;
        self.platform_fee = platform_fee;
        self.settlement_amount = settlement_amount;
        self.version += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns true if `settlement_amount + platform_fee == total_amount`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.settlement_amount
            .checked_add(self.platform_fee)
            .is_some_and(|sum| sum == self.total_amount)
    }
}

/// One order folded into a settlement. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementDetail {
    /// Unique identifier.
    pub id: SettlementDetailId,
    /// Owning settlement.
    pub settlement_id: SettlementId,
    /// Order identifier.
    pub order_id: String,
    /// Order number.
    pub order_no: String,
    /// Gross order amount.
    pub order_amount: i64,
    /// Platform fee on this order.
    pub platform_fee: i64,
    /// Merchant receivable on this order.
    pub settlement_amount: i64,
    /// When the order was folded in.
    pub created_at: DateTime<Utc>,
}

impl SettlementDetail {
    /// Builds the detail for `order` from its fee split.
    #[must_use]
    pub fn new(settlement_id: SettlementId, order: OrderInput, split: FeeSplit) -> Self {
        Self {
            id: SettlementDetailId::new(),
            settlement_id,
            order_id: order.order_id,
            order_no: order.order_no,
            order_amount: split.gross,
            platform_fee: split.platform_fee,
            settlement_amount: split.merchant_receivable,
            created_at: Utc::now(),
        }
    }
}

/// Merchant-facing wallet, credited when a settlement completes.
///
/// Separate from the internal ledger accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantAccount {
    /// Unique identifier.
    pub id: MerchantAccountId,
    /// The merchant.
    pub merchant_id: String,
    /// Withdrawable balance.
    pub balance: i64,
    /// Balance held back from withdrawal.
    pub frozen_balance: i64,
    /// Lifetime settled income.
    pub total_income: i64,
    /// Lifetime withdrawals.
    pub total_withdraw: i64,
    /// Platform fee rate charged to this merchant.
    pub fee_rate: FeeRate,
    /// Optimistic-concurrency counter.
    pub version: i64,
    /// When the account was opened.
    pub created_at: DateTime<Utc>,
    /// When the account last changed.
    pub updated_at: DateTime<Utc>,
}

impl MerchantAccount {
    /// Opens an empty merchant account.
    #[must_use]
    pub fn open(merchant_id: impl Into<String>, fee_rate: FeeRate) -> Self {
        let now = Utc::now();
        Self {
            id: MerchantAccountId::new(),
            merchant_id: merchant_id.into(),
            balance: 0,
            frozen_balance: 0,
            total_income: 0,
            total_withdraw: 0,
            fee_rate,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Credits a completed settlement's payout to the balance and income.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::AmountOverflow` if either total overflows.
    pub fn credit_settlement(&mut self, amount: i64) -> Result<(), SettlementError> {
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(SettlementError::AmountOverflow)?;
        let total_income = self
            .total_income
            .checked_add(amount)
            .ok_or(SettlementError::AmountOverflow)?;
        self.balance = balance;
        self.total_income = total_income;
        self.version += 1;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Filter for listing settlements. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementFilter {
    /// Only settlements of this merchant.
    pub merchant_id: Option<String>,
    /// Only settlements in this status.
    pub status: Option<SettlementStatus>,
}

impl SettlementFilter {
    /// Returns true if `settlement` passes the filter.
    #[must_use]
    pub fn matches(&self, settlement: &Settlement) -> bool {
        self.merchant_id
            .as_deref()
            .is_none_or(|m| m == settlement.merchant_id)
            && self.status.is_none_or(|s| s == settlement.status)
    }
}
