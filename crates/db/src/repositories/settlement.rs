//! Postgres implementation of the settlement store.
//!
//! Every mutation locks the settlement row first. Completion additionally
//! locks the merchant account row, always after the settlement, and writes
//! both back in the same transaction.
//!
//! Two settlements racing for the same order lock different rows; the unique
//! index on `settlement_details(order_id)` makes the later insert fail, and
//! that violation is reported as `DuplicateOrder`.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use settla_core::settlement::{
    FeeRate, MerchantAccount, Settlement, SettlementDetail, SettlementError, SettlementFilter,
    SettlementStore, SettlementTransition,
};
use settla_shared::ClearingConfig;
use settla_shared::types::{
    MerchantAccountId, PageRequest, PageResponse, SettlementDetailId, SettlementId,
};
use tracing::debug;

use super::error::{Failure, UQ_SETTLEMENT_ORDER, classify, settlement_error};
use crate::entities::sea_orm_active_enums::SettlementStatus;
use crate::entities::{merchant_accounts, settlement_details, settlements};

/// Settlement store backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgSettlementStore {
    db: DatabaseConnection,
    lock_timeout_ms: u64,
}

impl PgSettlementStore {
    /// Creates a new store.
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

    async fn begin(&self) -> Result<DatabaseTransaction, SettlementError> {
        let txn = self.db.begin().await.map_err(settlement_error)?;
        txn.execute_unprepared(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout_ms
        ))
        .await
        .map_err(settlement_error)?;
        Ok(txn)
    }

    async fn lock_settlement(
        txn: &DatabaseTransaction,
        id: SettlementId,
    ) -> Result<Settlement, SettlementError> {
        settlements::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(|err| lock_error(err, format!("settlement {id}")))?
            .map(settlement_from_model)
            .ok_or(SettlementError::SettlementNotFound(id))
    }

    /// Writes a settlement back, guarded by the version it was locked at.
    async fn save_settlement(
        txn: &DatabaseTransaction,
        settlement: &Settlement,
        expected_version: i64,
    ) -> Result<(), SettlementError> {
        let changes = settlements::ActiveModel {
            order_count: Set(settlement.order_count),
            total_amount: Set(settlement.total_amount),
            platform_fee: Set(settlement.platform_fee),
            settlement_amount: Set(settlement.settlement_amount),
            status: Set(settlement.status.into()),
            fail_reason: Set(settlement.fail_reason.clone()),
            settled_at: Set(settlement.settled_at.map(Into::into)),
            version: Set(settlement.version),
            updated_at: Set(settlement.updated_at.into()),
            ..Default::default()
        };
        let result = settlements::Entity::update_many()
            .set(changes)
            .filter(settlements::Column::Id.eq(settlement.id.into_inner()))
            .filter(settlements::Column::Version.eq(expected_version))
            .exec(txn)
            .await
            .map_err(settlement_error)?;

        if result.rows_affected == 0 {
            return Err(SettlementError::VersionMismatch(format!(
                "settlement {}",
                settlement.id
            )));
        }
        Ok(())
    }

    async fn insert_merchant_if_absent<C: ConnectionTrait>(
        conn: &C,
        merchant_id: &str,
        fee_rate: FeeRate,
    ) -> Result<(), SettlementError> {
        let account = MerchantAccount::open(merchant_id, fee_rate);
        merchant_accounts::Entity::insert(merchant_to_active(&account))
            .on_conflict(
                OnConflict::column(merchant_accounts::Column::MerchantId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(settlement_error)?;
        Ok(())
    }
}

#[async_trait]
impl SettlementStore for PgSettlementStore {
    async fn insert_settlement(&self, settlement: &Settlement) -> Result<(), SettlementError> {
        let model = settlements::ActiveModel {
            id: Set(settlement.id.into_inner()),
            settlement_no: Set(settlement.settlement_no.clone()),
            merchant_id: Set(settlement.merchant_id.clone()),
            cycle: Set(settlement.cycle.into()),
            start_date: Set(settlement.start_date),
            end_date: Set(settlement.end_date),
            order_count: Set(settlement.order_count),
            total_amount: Set(settlement.total_amount),
            platform_fee: Set(settlement.platform_fee),
            settlement_amount: Set(settlement.settlement_amount),
            status: Set(settlement.status.into()),
            fail_reason: Set(settlement.fail_reason.clone()),
            settled_at: Set(settlement.settled_at.map(Into::into)),
            version: Set(settlement.version),
            created_at: Set(settlement.created_at.into()),
            updated_at: Set(settlement.updated_at.into()),
        };
        settlements::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(settlement_error)?;
        Ok(())
    }

    async fn get_settlement(
        &self,
        id: SettlementId,
    ) -> Result<Option<Settlement>, SettlementError> {
        let model = settlements::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(settlement_error)?;
        Ok(model.map(settlement_from_model))
    }

    async fn list_settlements(
        &self,
        filter: &SettlementFilter,
        page: PageRequest,
    ) -> Result<PageResponse<Settlement>, SettlementError> {
        let mut condition = Condition::all();
        if let Some(merchant_id) = &filter.merchant_id {
            condition = condition.add(settlements::Column::MerchantId.eq(merchant_id.as_str()));
        }
        if let Some(status) = filter.status {
            condition = condition.add(settlements::Column::Status.eq(SettlementStatus::from(status)));
        }

        let paginator = settlements::Entity::find()
            .filter(condition)
            .order_by_desc(settlements::Column::CreatedAt)
            .order_by_desc(settlements::Column::Id)
            .paginate(&self.db, page.limit());
        let total = paginator.num_items().await.map_err(settlement_error)?;
        let models = paginator
            .fetch_page(u64::from(page.page.saturating_sub(1)))
            .await
            .map_err(settlement_error)?;

        Ok(PageResponse::new(
            models.into_iter().map(settlement_from_model).collect(),
            page,
            total,
        ))
    }

    async fn list_details(
        &self,
        settlement_id: SettlementId,
    ) -> Result<Vec<SettlementDetail>, SettlementError> {
        let models = settlement_details::Entity::find()
            .filter(settlement_details::Column::SettlementId.eq(settlement_id.into_inner()))
            .order_by_asc(settlement_details::Column::CreatedAt)
            .order_by_asc(settlement_details::Column::Id)
            .all(&self.db)
            .await
            .map_err(settlement_error)?;
        Ok(models.into_iter().map(detail_from_model).collect())
    }

    async fn append_detail(
        &self,
        detail: &SettlementDetail,
    ) -> Result<Settlement, SettlementError> {
        let txn = self.begin().await?;
        let mut settlement = Self::lock_settlement(&txn, detail.settlement_id).await?;

        let existing = settlement_details::Entity::find()
            .filter(settlement_details::Column::OrderId.eq(detail.order_id.as_str()))
            .one(&txn)
            .await
            .map_err(settlement_error)?;
        if let Some(owner) = existing {
            return Err(SettlementError::DuplicateOrder {
                settlement_id: SettlementId::from_uuid(owner.settlement_id),
                order_id: detail.order_id.clone(),
            });
        }

        let expected_version = settlement.version;
        settlement.apply_detail(detail)?;

        let model = settlement_details::ActiveModel {
            id: Set(detail.id.into_inner()),
            settlement_id: Set(detail.settlement_id.into_inner()),
            order_id: Set(detail.order_id.clone()),
            order_no: Set(detail.order_no.clone()),
            order_amount: Set(detail.order_amount),
            platform_fee: Set(detail.platform_fee),
            settlement_amount: Set(detail.settlement_amount),
            created_at: Set(detail.created_at.into()),
        };
        settlement_details::Entity::insert(model)
            .exec_without_returning(&txn)
            .await
            .map_err(|err| {
                if classify(&err).violates(UQ_SETTLEMENT_ORDER) {
                    SettlementError::DuplicateOrder {
                        settlement_id: detail.settlement_id,
                        order_id: detail.order_id.clone(),
                    }
                } else {
                    settlement_error(err)
                }
            })?;

        Self::save_settlement(&txn, &settlement, expected_version).await?;
        txn.commit().await.map_err(settlement_error)?;

        debug!(
            settlement_id = %settlement.id,
            order_id = %detail.order_id,
            order_count = settlement.order_count,
            "Settlement detail committed"
        );
        Ok(settlement)
    }

    async fn transition(
        &self,
        id: SettlementId,
        transition: &SettlementTransition,
    ) -> Result<Settlement, SettlementError> {
        let txn = self.begin().await?;
        let mut settlement = Self::lock_settlement(&txn, id).await?;
        let expected_version = settlement.version;
        transition.apply(&mut settlement)?;
        Self::save_settlement(&txn, &settlement, expected_version).await?;
        txn.commit().await.map_err(settlement_error)?;
        Ok(settlement)
    }

    async fn complete_and_credit(
        &self,
        id: SettlementId,
        transition: &SettlementTransition,
        default_rate: FeeRate,
    ) -> Result<(Settlement, MerchantAccount), SettlementError> {
        let txn = self.begin().await?;
        let mut settlement = Self::lock_settlement(&txn, id).await?;
        let expected_settlement_version = settlement.version;
        transition.apply(&mut settlement)?;

        Self::insert_merchant_if_absent(&txn, &settlement.merchant_id, default_rate).await?;
        let mut account = merchant_accounts::Entity::find()
            .filter(merchant_accounts::Column::MerchantId.eq(settlement.merchant_id.as_str()))
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|err| lock_error(err, format!("merchant {}", settlement.merchant_id)))?
            .map(merchant_from_model)
            .transpose()?
            .ok_or_else(|| SettlementError::MerchantAccountNotFound(settlement.merchant_id.clone()))?;
        let expected_account_version = account.version;
        account.credit_settlement(settlement.settlement_amount)?;

        Self::save_settlement(&txn, &settlement, expected_settlement_version).await?;
        let changes = merchant_accounts::ActiveModel {
            balance: Set(account.balance),
            total_income: Set(account.total_income),
            version: Set(account.version),
            updated_at: Set(account.updated_at.into()),
            ..Default::default()
        };
        let result = merchant_accounts::Entity::update_many()
            .set(changes)
            .filter(merchant_accounts::Column::Id.eq(account.id.into_inner()))
            .filter(merchant_accounts::Column::Version.eq(expected_account_version))
            .exec(&txn)
            .await
            .map_err(settlement_error)?;
        if result.rows_affected == 0 {
            return Err(SettlementError::VersionMismatch(format!(
                "merchant {}",
                account.merchant_id
            )));
        }

        txn.commit().await.map_err(settlement_error)?;
        Ok((settlement, account))
    }

    async fn get_merchant_account(
        &self,
        merchant_id: &str,
    ) -> Result<Option<MerchantAccount>, SettlementError> {
        merchant_accounts::Entity::find()
            .filter(merchant_accounts::Column::MerchantId.eq(merchant_id))
            .one(&self.db)
            .await
            .map_err(settlement_error)?
            .map(merchant_from_model)
            .transpose()
    }

    async fn get_or_create_merchant_account(
        &self,
        merchant_id: &str,
        fee_rate: FeeRate,
    ) -> Result<MerchantAccount, SettlementError> {
        Self::insert_merchant_if_absent(&self.db, merchant_id, fee_rate).await?;
        self.get_merchant_account(merchant_id)
            .await?
            .ok_or_else(|| SettlementError::MerchantAccountNotFound(merchant_id.to_string()))
    }
}

fn lock_error(err: sea_orm::DbErr, what: String) -> SettlementError {
    match classify(&err) {
        Failure::LockTimeout(_) => SettlementError::LockTimeout(what),
        _ => settlement_error(err),
    }
}

fn settlement_from_model(model: settlements::Model) -> Settlement {
    Settlement {
        id: SettlementId::from_uuid(model.id),
        settlement_no: model.settlement_no,
        merchant_id: model.merchant_id,
        cycle: model.cycle.into(),
        start_date: model.start_date,
        end_date: model.end_date,
        order_count: model.order_count,
        total_amount: model.total_amount,
        platform_fee: model.platform_fee,
        settlement_amount: model.settlement_amount,
        status: model.status.into(),
        fail_reason: model.fail_reason,
        settled_at: model.settled_at.map(|at| at.with_timezone(&Utc)),
        version: model.version,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn detail_from_model(model: settlement_details::Model) -> SettlementDetail {
    SettlementDetail {
        id: SettlementDetailId::from_uuid(model.id),
        settlement_id: SettlementId::from_uuid(model.settlement_id),
        order_id: model.order_id,
        order_no: model.order_no,
        order_amount: model.order_amount,
        platform_fee: model.platform_fee,
        settlement_amount: model.settlement_amount,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

/// The stored rate is range-checked by the table; a bad row is still an error.
fn merchant_from_model(model: merchant_accounts::Model) -> Result<MerchantAccount, SettlementError> {
    Ok(MerchantAccount {
        id: MerchantAccountId::from_uuid(model.id),
        merchant_id: model.merchant_id,
        balance: model.balance,
        frozen_balance: model.frozen_balance,
        total_income: model.total_income,
        total_withdraw: model.total_withdraw,
        fee_rate: FeeRate::new(model.fee_rate)?,
        version: model.version,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn merchant_to_active(account: &MerchantAccount) -> merchant_accounts::ActiveModel {
    merchant_accounts::ActiveModel {
        id: Set(account.id.into_inner()),
        merchant_id: Set(account.merchant_id.clone()),
        balance: Set(account.balance),
        frozen_balance: Set(account.frozen_balance),
        total_income: Set(account.total_income),
        total_withdraw: Set(account.total_withdraw),
        fee_rate: Set(account.fee_rate.value()),
        version: Set(account.version),
        created_at: Set(account.created_at.into()),
        updated_at: Set(account.updated_at.into()),
    }
}
