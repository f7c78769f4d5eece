//! Settlement service.
//!
//! Drives the settlement aggregate through its lifecycle and keeps the
//! merchant wallet in step with completed payouts.

use std::sync::Arc;

use settla_shared::types::{PageRequest, PageResponse, SettlementId};
use tracing::{info, instrument, warn};

use super::error::SettlementError;
use super::fee::FeeRate;
use super::state::SettlementWorkflow;
use super::store::SettlementStore;
use super::types::{
    MerchantAccount, NewSettlement, OrderInput, Settlement, SettlementDetail, SettlementFilter,
    SettlementStatus,
};
use crate::ledger::EntryNoGenerator;

/// Settlement lifecycle and merchant account operations.
pub struct SettlementService<S: SettlementStore + ?Sized> {
    store: Arc<S>,
    numbers: Arc<EntryNoGenerator>,
    default_fee_rate: FeeRate,
}

impl<S: SettlementStore + ?Sized> Clone for SettlementService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            numbers: Arc::clone(&self.numbers),
            default_fee_rate: self.default_fee_rate,
        }
    }
}

impl<S: SettlementStore + ?Sized> SettlementService<S> {
    /// Creates a service; `default_fee_rate` applies to merchants without an account.
    pub fn new(store: Arc<S>, default_fee_rate: FeeRate) -> Self {
        Self {
            store,
            numbers: Arc::new(EntryNoGenerator::settlement()),
            default_fee_rate,
        }
    }

    /// The platform default fee rate.
    pub fn default_fee_rate(&self) -> FeeRate {
        self.default_fee_rate
    }

    /// Opens a merchant account, or returns the existing one unchanged.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::MissingMerchantId` for a blank merchant id.
    #[instrument(skip(self))]
    pub async fn open_merchant_account(
        &self,
        merchant_id: &str,
        fee_rate: FeeRate,
    ) -> Result<MerchantAccount, SettlementError> {
        if merchant_id.trim().is_empty() {
            return Err(SettlementError::MissingMerchantId);
        }
        self.store
            .get_or_create_merchant_account(merchant_id, fee_rate)
            .await
    }

    /// Loads a merchant account.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::MerchantAccountNotFound` if none exists.
    pub async fn get_merchant_account(
        &self,
        merchant_id: &str,
    ) -> Result<MerchantAccount, SettlementError> {
        self.store
            .get_merchant_account(merchant_id)
            .await?
            .ok_or_else(|| SettlementError::MerchantAccountNotFound(merchant_id.to_string()))
    }

    /// The merchant's fee rate, or the platform default if the merchant has
    /// no account yet.
    pub async fn fee_rate_for(&self, merchant_id: &str) -> Result<FeeRate, SettlementError> {
        Ok(self
            .store
            .get_merchant_account(merchant_id)
            .await?
            .map_or(self.default_fee_rate, |account| account.fee_rate))
    }

    /// Creates a pending settlement for one billing period.
    ///
    /// # Errors
    ///
    /// Returns validation errors for a blank merchant or an inverted period.
    #[instrument(skip(self, input), fields(merchant_id = %input.merchant_id))]
    pub async fn create_settlement(
        &self,
        input: NewSettlement,
    ) -> Result<Settlement, SettlementError> {
        input.validate()?;
        let settlement = Settlement::new(input, self.numbers.next_no());
        self.store.insert_settlement(&settlement).await?;
        info!(
            settlement_no = %settlement.settlement_no,
            cycle = %settlement.cycle,
            "settlement created"
        );
        Ok(settlement)
    }

    /// Folds one order into a pending settlement.
    ///
    /// The fee is computed from the merchant's fee rate. Re-adding an order is
    /// rejected with `DuplicateOrder` and leaves the totals untouched.
    ///
    /// # Errors
    ///
    /// - `NonPositiveAmount` for `amount <= 0`
    /// - `SettlementNotFound`, `NotAcceptingOrders`, `DuplicateOrder`
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn add_order_to_settlement(
        &self,
        settlement_id: SettlementId,
        order: OrderInput,
    ) -> Result<Settlement, SettlementError> {
        if order.amount <= 0 {
            return Err(SettlementError::NonPositiveAmount(order.amount));
        }

        let settlement = self.get_settlement(settlement_id).await?;
        if settlement.status != SettlementStatus::Pending {
            return Err(SettlementError::NotAcceptingOrders {
                status: settlement.status,
            });
        }

        let rate = self.fee_rate_for(&settlement.merchant_id).await?;
        let split = rate.split(order.amount)?;
        let detail = SettlementDetail::new(settlement_id, order, split);

        match self.store.append_detail(&detail).await {
            Ok(updated) => {
                info!(
                    settlement_no = %updated.settlement_no,
                    order_amount = detail.order_amount,
                    platform_fee = detail.platform_fee,
                    order_count = updated.order_count,
                    "order added to settlement"
                );
                Ok(updated)
            }
            Err(err) => {
                warn!(settlement_id = %settlement_id, error = %err, "order not added to settlement");
                Err(err)
            }
        }
    }

    /// `Pending → Processing`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the settlement is pending.
    #[instrument(skip(self))]
    pub async fn process_settlement(&self, id: SettlementId) -> Result<Settlement, SettlementError> {
        let current = self.get_settlement(id).await?;
        let transition = SettlementWorkflow::process(current.status)?;
        let settlement = self.store.transition(id, &transition).await?;
        info!(settlement_no = %settlement.settlement_no, "settlement processing");
        Ok(settlement)
    }

    /// `Processing → Completed`, crediting the merchant account with the
    /// settlement amount in the same atomic step.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the settlement is processing; the
    /// merchant account is untouched in that case.
    #[instrument(skip(self))]
    pub async fn complete_settlement(
        &self,
        id: SettlementId,
    ) -> Result<(Settlement, MerchantAccount), SettlementError> {
        let current = self.get_settlement(id).await?;
        let transition = SettlementWorkflow::complete(current.status)?;
        let (settlement, account) = self
            .store
            .complete_and_credit(id, &transition, self.default_fee_rate)
            .await?;
        info!(
            settlement_no = %settlement.settlement_no,
            merchant_id = %settlement.merchant_id,
            settlement_amount = settlement.settlement_amount,
            balance = account.balance,
            "settlement completed"
        );
        Ok((settlement, account))
    }

    /// `Pending | Processing → Failed`.
    ///
    /// # Errors
    ///
    /// Returns `FailReasonRequired` for a blank reason and `InvalidTransition`
    /// from a terminal status.
    #[instrument(skip(self))]
    pub async fn fail_settlement(
        &self,
        id: SettlementId,
        reason: &str,
    ) -> Result<Settlement, SettlementError> {
        let current = self.get_settlement(id).await?;
        let transition = SettlementWorkflow::fail(current.status, reason.to_string())?;
        let settlement = self.store.transition(id, &transition).await?;
        warn!(settlement_no = %settlement.settlement_no, reason, "settlement failed");
        Ok(settlement)
    }

    /// Loads a settlement.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::SettlementNotFound` if it does not exist.
    pub async fn get_settlement(&self, id: SettlementId) -> Result<Settlement, SettlementError> {
        self.store
            .get_settlement(id)
            .await?
            .ok_or(SettlementError::SettlementNotFound(id))
    }

    /// Lists settlements, newest first.
    pub async fn list_settlements(
        &self,
        filter: &SettlementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<Settlement>, SettlementError> {
        self.store.list_settlements(filter, page).await
    }

    /// The orders folded into a settlement.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::SettlementNotFound` if it does not exist.
    pub async fn settlement_details(
        &self,
        id: SettlementId,
    ) -> Result<Vec<SettlementDetail>, SettlementError> {
        self.get_settlement(id).await?;
        self.store.list_details(id).await
    }
}
