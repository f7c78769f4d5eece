//! `SeaORM` Entity for ledger accounts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub subject_code: String,
    pub entity_id: String,
    pub balance: i64,
    pub currency: String,
    pub version: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subjects::Entity",
        from = "Column::SubjectCode",
        to = "super::subjects::Column::Code",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Subjects,
    #[sea_orm(has_many = "super::entry_lines::Entity")]
    EntryLines,
}

impl Related<super::subjects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subjects.def()
    }
}

impl Related<super::entry_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EntryLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
