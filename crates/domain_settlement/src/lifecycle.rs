//! Receipt lifecycle state machine
//!
//! ```text
//! draft ──► approved ──► sent_for_settlement ──► settled
//!              ▲                 │    ▲             │
//!              └─────────────────┘    └─────────────┘
//!            return to active          return to settlement
//! ```
//!
//! Backward movement is always a single step. Every caller that undoes
//! settlement state (transaction reversal, the explicit return actions) goes
//! through [`plan_step_back`] so the cascade depth cannot diverge between
//! entry points.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SettlementError;
use crate::ledger::LedgerEntry;
use crate::receipt::{ActiveReceipt, ReceiptStatus, SettlementType};

impl ReceiptStatus {
    /// Checks whether a status change is a legal edge of the lifecycle
    pub fn can_transition_to(self, target: ReceiptStatus) -> bool {
        use ReceiptStatus::*;
        matches!(
            (self, target),
            (Draft, Approved)
                | (Approved, SentForSettlement)
                | (SentForSettlement, Settled)
                | (Settled, SentForSettlement)
                | (SentForSettlement, Approved)
        )
    }
}

/// One backward move of a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackwardStep {
    /// settled → sent_for_settlement
    SettledToSettlement,
    /// sent_for_settlement → approved, linked orders go back to work
    SettlementToApproved,
}

impl BackwardStep {
    pub fn from_status(&self) -> ReceiptStatus {
        match self {
            BackwardStep::SettledToSettlement => ReceiptStatus::Settled,
            BackwardStep::SettlementToApproved => ReceiptStatus::SentForSettlement,
        }
    }

    pub fn to_status(&self) -> ReceiptStatus {
        match self {
            BackwardStep::SettledToSettlement => ReceiptStatus::SentForSettlement,
            BackwardStep::SettlementToApproved => ReceiptStatus::Approved,
        }
    }

    /// Whether linked orders must be reset to an active status
    pub fn resets_orders(&self) -> bool {
        matches!(self, BackwardStep::SettlementToApproved)
    }

    /// Whether a linked ledger entry is undone by this step
    ///
    /// Undoing a settlement reverses the accruals it generated. Returning a
    /// receipt to approved reverses everything still live against it.
    pub fn reverses(&self, entry: &LedgerEntry) -> bool {
        if entry.is_reversed() {
            return false;
        }
        match self {
            BackwardStep::SettledToSettlement => entry.is_accrual(),
            BackwardStep::SettlementToApproved => true,
        }
    }
}

/// Decides the single backward step available from `status`
pub fn plan_step_back(status: ReceiptStatus) -> Result<BackwardStep, SettlementError> {
    match status {
        ReceiptStatus::Settled => Ok(BackwardStep::SettledToSettlement),
        ReceiptStatus::SentForSettlement => Ok(BackwardStep::SettlementToApproved),
        ReceiptStatus::Approved | ReceiptStatus::Draft => Err(SettlementError::invalid_transition(
            status,
            "a previous status",
        )),
    }
}

impl ActiveReceipt {
    fn transition(&mut self, target: ReceiptStatus, at: DateTime<Utc>) -> Result<(), SettlementError> {
        if !self.status.can_transition_to(target) {
            return Err(SettlementError::invalid_transition(self.status, target));
        }
        self.status = target;
        self.updated_at = at;
        Ok(())
    }

    /// approved → sent_for_settlement
    ///
    /// Normally performed outside the reconciliation core; exposed so the
    /// full lifecycle can be driven in one place.
    pub fn send_for_settlement(&mut self, on: NaiveDate, at: DateTime<Utc>) -> Result<(), SettlementError> {
        self.transition(ReceiptStatus::SentForSettlement, at)?;
        self.settlement_date = Some(on);
        Ok(())
    }

    /// sent_for_settlement → settled
    pub fn mark_settled(
        &mut self,
        settlement_type: SettlementType,
        on: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        self.transition(ReceiptStatus::Settled, at)?;
        self.settled_date = Some(on);
        self.settlement_type = Some(settlement_type);
        Ok(())
    }

    /// Moves the receipt exactly one step back and clears the fields that
    /// step invalidates. `settlement_type` is cleared on every backward move.
    pub fn step_back(&mut self, at: DateTime<Utc>) -> Result<BackwardStep, SettlementError> {
        let step = plan_step_back(self.status)?;
        self.transition(step.to_status(), at)?;
        self.settlement_type = None;
        match step {
            BackwardStep::SettledToSettlement => self.settled_date = None,
            BackwardStep::SettlementToApproved => {
                self.settled_date = None;
                self.settlement_date = None;
            }
        }
        Ok(step)
    }
}
