//! `SeaORM` Entity for journal entries (vouchers).

use super::sea_orm_active_enums::JournalEventType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub entry_no: String,
    #[sea_orm(unique)]
    pub transaction_id: String,
    pub event_type: JournalEventType,
    pub posting_date: Date,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entry_lines::Entity")]
    EntryLines,
}

impl Related<super::entry_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EntryLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
