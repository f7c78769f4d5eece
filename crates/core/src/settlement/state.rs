//! Settlement lifecycle transitions.
//!
//! Transitions are computed here, from the current status alone, and
//! applied by the store under the settlement's row lock. The store re-checks
//! `from` against the locked row, so two racing callers cannot both move the
//! same settlement.

use chrono::{DateTime, Utc};

use super::error::SettlementError;
use super::types::{Settlement, SettlementStatus};

/// A validated status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementTransition {
    /// Status the settlement must still be in.
    pub from: SettlementStatus,
    /// Status after the transition.
    pub to: SettlementStatus,
    /// When the transition was decided.
    pub at: DateTime<Utc>,
    /// Reason, for transitions into `Failed`.
    pub fail_reason: Option<String>,
}

impl SettlementTransition {
    /// Applies the transition to a locked settlement.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::InvalidTransition` if the settlement is no
    /// longer in `from`.
    pub fn apply(&self, settlement: &mut Settlement) -> Result<(), SettlementError> {
        if settlement.status != self.from {
            return Err(SettlementError::InvalidTransition {
                from: settlement.status,
                to: self.to,
            });
        }
        settlement.status = self.to;
        if self.to == SettlementStatus::Completed {
            settlement.settled_at = Some(self.at);
        }
        if self.fail_reason.is_some() {
            settlement.fail_reason.clone_from(&self.fail_reason);
        }
        settlement.version += 1;
        settlement.updated_at = self.at;
        Ok(())
    }
}

/// Stateless settlement state machine.
pub struct SettlementWorkflow;

impl SettlementWorkflow {
    /// Close a pending settlement for processing.
    ///
    /// # Returns
    /// * `Ok(SettlementTransition)` for `Pending → Processing`
    /// * `Err(SettlementError::InvalidTransition)` from any other status
    pub fn process(current: SettlementStatus) -> Result<SettlementTransition, SettlementError> {
        Self::transition(current, SettlementStatus::Processing, None)
    }

    /// Complete a processing settlement.
    ///
    /// # Returns
    /// * `Ok(SettlementTransition)` for `Processing → Completed`
    /// * `Err(SettlementError::InvalidTransition)` from any other status
    pub fn complete(current: SettlementStatus) -> Result<SettlementTransition, SettlementError> {
        Self::transition(current, SettlementStatus::Completed, None)
    }

    /// Fail a pending or processing settlement.
    ///
    /// # Returns
    /// * `Ok(SettlementTransition)` for `Pending | Processing → Failed`
    /// * `Err(SettlementError::FailReasonRequired)` if the reason is blank
    /// * `Err(SettlementError::InvalidTransition)` from a terminal status
    pub fn fail(
        current: SettlementStatus,
        reason: String,
    ) -> Result<SettlementTransition, SettlementError> {
        if reason.trim().is_empty() {
            return Err(SettlementError::FailReasonRequired);
        }
        Self::transition(current, SettlementStatus::Failed, Some(reason))
    }

    fn transition(
        from: SettlementStatus,
        to: SettlementStatus,
        fail_reason: Option<String>,
    ) -> Result<SettlementTransition, SettlementError> {
        if !from.can_transition_to(to) {
            return Err(SettlementError::InvalidTransition { from, to });
        }
        Ok(SettlementTransition {
            from,
            to,
            at: Utc::now(),
            fail_reason,
        })
    }
}
