//! Repository implementations of the core storage traits.
//!
//! Both stores hide the `SeaORM` details from the services in `settla-core`:
//! the posting engine talks to [`PgLedgerStore`], the settlement service to
//! [`PgSettlementStore`].

mod error;
pub mod ledger;
pub mod settlement;

pub use ledger::PgLedgerStore;
pub use settlement::PgSettlementStore;
