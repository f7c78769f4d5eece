//! Merchant settlement.
//!
//! This module implements the settlement side of clearing:
//! - Fee rates and the platform-fee / merchant-receivable split
//! - The settlement aggregate and its per-order details
//! - The Pending → Processing → Completed lifecycle (with Failed exits)
//! - The merchant-facing wallet credited on completion

pub mod error;
pub mod fee;
pub mod service;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod fee_props;
#[cfg(test)]
mod service_props;

pub use error::SettlementError;
pub use fee::{FeeRate, FeeSplit};
pub use service::SettlementService;
pub use state::{SettlementTransition, SettlementWorkflow};
pub use store::SettlementStore;
pub use types::{
    MerchantAccount, NewSettlement, OrderInput, Settlement, SettlementCycle, SettlementDetail,
    SettlementFilter, SettlementStatus,
};
