//! Storage seam of the settlement service.

use async_trait::async_trait;
use settla_shared::types::{PageRequest, PageResponse, SettlementId};

use super::error::SettlementError;
use super::fee::FeeRate;
use super::state::SettlementTransition;
use super::types::{MerchantAccount, Settlement, SettlementDetail, SettlementFilter};

/// Persistence required by [`SettlementService`](super::SettlementService).
///
/// Every mutating call runs under the settlement's row lock, so writers to
/// the same settlement are serialized and different settlements are
/// independent.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Inserts a new settlement.
    async fn insert_settlement(&self, settlement: &Settlement) -> Result<(), SettlementError>;

    /// Loads a settlement.
    async fn get_settlement(&self, id: SettlementId)
    -> Result<Option<Settlement>, SettlementError>;

    /// Lists settlements matching `filter`, newest first.
    async fn list_settlements(
        &self,
        filter: &SettlementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<Settlement>, SettlementError>;

    /// Details of a settlement in insertion order.
    async fn list_details(
        &self,
        settlement_id: SettlementId,
    ) -> Result<Vec<SettlementDetail>, SettlementError>;

    /// Appends a detail and folds it into the settlement's totals atomically.
    ///
    /// # Errors
    ///
    /// - `SettlementNotFound` for an unknown settlement
    /// - `DuplicateOrder` if the order is already part of any settlement
    /// - `NotAcceptingOrders` unless the locked settlement is pending
    async fn append_detail(&self, detail: &SettlementDetail)
    -> Result<Settlement, SettlementError>;

    /// Applies a status transition as a compare-and-set on the locked row.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the row is no longer in `transition.from`.
    async fn transition(
        &self,
        id: SettlementId,
        transition: &SettlementTransition,
    ) -> Result<Settlement, SettlementError>;

    /// Completes a settlement and credits its payout to the merchant account
    /// in one atomic step. The merchant account is opened with `default_rate`
    /// if it does not exist yet.
    async fn complete_and_credit(
        &self,
        id: SettlementId,
        transition: &SettlementTransition,
        default_rate: FeeRate,
    ) -> Result<(Settlement, MerchantAccount), SettlementError>;

    /// Loads a merchant account.
    async fn get_merchant_account(
        &self,
        merchant_id: &str,
    ) -> Result<Option<MerchantAccount>, SettlementError>;

    /// Returns the merchant account, opening it with `fee_rate` if absent.
    async fn get_or_create_merchant_account(
        &self,
        merchant_id: &str,
        fee_rate: FeeRate,
    ) -> Result<MerchantAccount, SettlementError>;
}
