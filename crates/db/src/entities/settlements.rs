//! `SeaORM` Entity for merchant settlements.

use super::sea_orm_active_enums::{SettlementCycle, SettlementStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub settlement_no: String,
    pub merchant_id: String,
    pub cycle: SettlementCycle,
    pub start_date: Date,
    pub end_date: Date,
    pub order_count: i64,
    pub total_amount: i64,
    pub platform_fee: i64,
    pub settlement_amount: i64,
    pub status: SettlementStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub fail_reason: Option<String>,
    pub settled_at: Option<DateTimeWithTimeZone>,
    pub version: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::settlement_details::Entity")]
    SettlementDetails,
}

impl Related<super::settlement_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SettlementDetails.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
