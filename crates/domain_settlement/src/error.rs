//! Settlement domain errors

use thiserror::Error;

use core_kernel::{PortError, ReceiptId, TransactionId};

/// Errors raised by the reconciliation core
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Input rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Transaction already reversed: {0}")]
    AlreadyReversed(TransactionId),

    #[error("Invalid receipt status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Another operator changed the receipt between read and write
    #[error("Receipt {0} was modified concurrently")]
    ConcurrentModification(ReceiptId),

    #[error("Store error: {0}")]
    Store(#[from] PortError),

    /// A write failed after earlier writes of the same action succeeded
    #[error("Step '{step}' failed after writing {completed:?}: {source}")]
    PartialFailure {
        step: &'static str,
        completed: Vec<String>,
        #[source]
        source: PortError,
    },
}

impl SettlementError {
    pub fn validation(message: impl Into<String>) -> Self {
        SettlementError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        SettlementError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        SettlementError::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Maps a failed point lookup, keeping store failures distinct from absence
    pub(crate) fn from_lookup(error: PortError, entity: &'static str, id: impl std::fmt::Display) -> Self {
        if error.is_not_found() {
            SettlementError::not_found(entity, id)
        } else {
            SettlementError::Store(error)
        }
    }

    /// True when no write of the failed action reached the store
    pub fn left_state_untouched(&self) -> bool {
        !matches!(self, SettlementError::PartialFailure { .. })
    }
}
