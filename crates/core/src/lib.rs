//! Core business logic for Settla.
//!
//! This crate contains the double-entry ledger and the settlement clearing
//! engine. Persistence is reached only through the storage traits
//! ([`ledger::LedgerStore`], [`settlement::SettlementStore`]); the database
//! crate implements them, and [`memory::InMemoryStore`] implements them for
//! tests and embedded use.
//!
//! # Modules
//!
//! - `chart` - Chart-of-accounts subjects and their balance rules
//! - `ledger` - Journal entries, validation and the posting engine
//! - `settlement` - Fee rates, the settlement aggregate and its lifecycle
//! - `clearing` - Folding payment events into balanced journal entries
//! - `sync` - Best-effort post-commit notifications to external systems
//! - `memory` - In-memory implementation of the storage traits

pub mod chart;
pub mod clearing;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod settlement;
pub mod sync;

pub use error::ErrorKind;
