//! Error types for ledger operations.

use thiserror::Error;

use crate::Amount;
use crate::model::{ScopeId, TransactionType, UserId};

/// Error returned by mutating ledger operations. Every failure leaves the
/// ledger exactly as it was.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid amount {0}: must be positive")]
    InvalidAmount(Amount),

    #[error("insufficient balance for user {user} scope {scope}: available {available}, requested {requested}")]
    InsufficientBalance {
        user: UserId,
        scope: ScopeId,
        available: Amount,
        requested: Amount,
    },

    #[error("account (user {user}, scope {scope}) is frozen")]
    AccountFrozen { user: UserId, scope: ScopeId },

    #[error("transfer from user {0} to itself")]
    SameAccount(UserId),

    #[error("account (user {user}, scope {scope}) not found")]
    NotFound { user: UserId, scope: ScopeId },

    #[error("{txn_type:?} is not a {expected} type")]
    WrongDirection {
        txn_type: TransactionType,
        expected: &'static str,
    },
}
