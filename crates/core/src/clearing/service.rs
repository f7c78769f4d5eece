//! Clearing service.

use std::sync::Arc;

use serde::Serialize;
use settla_shared::ClearingConfig;
use tracing::{info, instrument, warn};

use super::entry::{ClearingAccounts, PaymentSuccess, build_clearing_entry, merchant_entity_id};
use super::error::ClearingError;
use crate::chart::{CHANNEL_RECEIVABLE, MERCHANT_PAYABLE, PLATFORM_FEE_INCOME};
use crate::ledger::{JournalEntry, LedgerStore, PostingEngine};
use crate::settlement::{FeeRate, FeeSplit, SettlementStore};
use crate::sync::{DepositNotification, SyncHandle};

/// Outcome of clearing one payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearingReceipt {
    /// The committed journal entry.
    pub entry: JournalEntry,
    /// How the gross amount was split.
    pub split: FeeSplit,
    /// The fee rate applied.
    pub fee_rate: FeeRate,
    /// Channel fee reported with the payment. Not posted to the ledger.
    pub channel_cost: i64,
}

/// Clears captured payments into the ledger.
pub struct ClearingService<L, M>
where
    L: LedgerStore + ?Sized,
    M: SettlementStore + ?Sized,
{
    engine: PostingEngine<L>,
    merchants: Arc<M>,
    default_fee_rate: FeeRate,
    channel_entity_id: String,
    platform_entity_id: String,
    sync: Option<SyncHandle>,
}

impl<L, M> ClearingService<L, M>
where
    L: LedgerStore + ?Sized,
    M: SettlementStore + ?Sized,
{
    /// Creates a clearing service.
    ///
    /// # Errors
    ///
    /// Returns `ClearingError::Settlement` if the configured default fee rate
    /// is not a fraction in `[0, 1]`.
    pub fn new(
        engine: PostingEngine<L>,
        merchants: Arc<M>,
        config: &ClearingConfig,
    ) -> Result<Self, ClearingError> {
        Ok(Self {
            engine,
            merchants,
            default_fee_rate: FeeRate::new(config.default_fee_rate)?,
            channel_entity_id: config.channel_entity_id.clone(),
            platform_entity_id: config.platform_entity_id.clone(),
            sync: None,
        })
    }

    /// Sends a deposit notification through `handle` after every clearing.
    #[must_use]
    pub fn with_sync(mut self, handle: SyncHandle) -> Self {
        self.sync = Some(handle);
        self
    }

    /// The posting engine used for clearing entries.
    pub fn engine(&self) -> &PostingEngine<L> {
        &self.engine
    }

    /// Clears a captured payment.
    ///
    /// Steps:
    /// 1. Validates the payment
    /// 2. Resolves the merchant's fee rate (platform default without an account)
    /// 3. Resolves or opens the channel, merchant and platform accounts
    /// 4. Posts the balanced clearing entry, once per order
    /// 5. Enqueues a best-effort deposit notification
    ///
    /// # Errors
    ///
    /// - `InvalidPayment` for a malformed event (not retryable)
    /// - `Ledger(DuplicateTransaction)` if the order was already cleared
    /// - Conflict-kind errors, which the caller retries with backoff
    #[instrument(
        skip(self, payment),
        fields(order_id = %payment.order_id, merchant_id = %payment.merchant_id)
    )]
    pub async fn record_payment_success(
        &self,
        payment: PaymentSuccess,
    ) -> Result<ClearingReceipt, ClearingError> {
        Self::validate(&payment)?;

        let fee_rate = self
            .merchants
            .get_merchant_account(&payment.merchant_id)
            .await?
            .map_or(self.default_fee_rate, |account| account.fee_rate);
        let split = fee_rate.split(payment.amount)?;

        let accounts = ClearingAccounts {
            channel: self
                .engine
                .create_account(CHANNEL_RECEIVABLE, &self.channel_entity_id)
                .await?
                .id,
            merchant: self
                .engine
                .create_account(MERCHANT_PAYABLE, &merchant_entity_id(&payment.merchant_id))
                .await?
                .id,
            platform: self
                .engine
                .create_account(PLATFORM_FEE_INCOME, &self.platform_entity_id)
                .await?
                .id,
        };

        let posted = self
            .engine
            .post_entry(build_clearing_entry(&payment, accounts, split))
            .await?;

        info!(
            entry_no = %posted.entry.entry_no,
            amount = split.gross,
            platform_fee = split.platform_fee,
            merchant_receivable = split.merchant_receivable,
            fee_rate = %fee_rate,
            "payment cleared"
        );

        if let Some(sync) = &self.sync {
            let queued = sync.enqueue(DepositNotification {
                merchant_id: payment.merchant_id.clone(),
                order_id: payment.order_id.clone(),
                order_no: payment.order_no.clone(),
                entry_no: posted.entry.entry_no.clone(),
                gross_amount: split.gross,
                merchant_amount: split.merchant_receivable,
                platform_fee: split.platform_fee,
                channel_cost: payment.channel_cost,
            });
            if !queued {
                warn!(entry_no = %posted.entry.entry_no, "deposit notification not queued");
            }
        }

        Ok(ClearingReceipt {
            entry: posted.entry,
            split,
            fee_rate,
            channel_cost: payment.channel_cost,
        })
    }

    fn validate(payment: &PaymentSuccess) -> Result<(), ClearingError> {
        if payment.order_id.trim().is_empty() {
            return Err(ClearingError::InvalidPayment(
                "order id must not be blank".to_string(),
            ));
        }
        if payment.merchant_id.trim().is_empty() {
            return Err(ClearingError::InvalidPayment(
                "merchant id must not be blank".to_string(),
            ));
        }
        if payment.amount <= 0 {
            return Err(ClearingError::InvalidPayment(format!(
                "amount must be positive, got {}",
                payment.amount
            )));
        }
        if payment.channel_cost < 0 || payment.channel_cost > payment.amount {
            return Err(ClearingError::InvalidPayment(format!(
                "channel cost {} must be between 0 and the amount {}",
                payment.channel_cost, payment.amount
            )));
        }
        Ok(())
    }
}
