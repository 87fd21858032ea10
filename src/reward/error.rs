//! Error types for reward calculation and distribution.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::Amount;
use crate::ledger::LedgerError;

/// The calculation-store operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationOperation {
    Approve,
    Distribute,
    Recalculate,
    Adjust,
}

/// Error raised by the reward engine. All variants are caller-visible; the
/// engine never swallows a failure.
#[derive(Debug, Error)]
pub enum RewardError {
    #[error("{name} factor must be positive, got {value}")]
    InvalidFactor { name: &'static str, value: Decimal },

    #[error("reward {amount} outside configured bounds [{min}, {max}]")]
    RewardOutOfBounds {
        amount: Amount,
        min: Amount,
        max: Amount,
    },

    #[error("calculation {0} is already distributed")]
    AlreadyDistributed(Uuid),

    #[error("calculation {0} has not been approved")]
    CalculationNotApproved(Uuid),

    #[error("calculation {0} not found")]
    NotFound(Uuid),

    #[error("contribution {0} already has a calculation")]
    DuplicateContribution(Uuid),

    #[error("{0:?}: calculation {1} is not in expected state")]
    InvalidState(CalculationOperation, Uuid),

    #[error("reward arithmetic overflow")]
    Overflow,

    #[error("distribution rejected by ledger: {0}")]
    Ledger(#[from] LedgerError),
}
