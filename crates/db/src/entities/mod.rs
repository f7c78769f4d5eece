//! `SeaORM` entity definitions.

#![allow(missing_docs)]

pub mod prelude;

pub mod accounts;
pub mod entry_lines;
pub mod journal_entries;
pub mod merchant_accounts;
pub mod sea_orm_active_enums;
pub mod settlement_details;
pub mod settlements;
pub mod subjects;
