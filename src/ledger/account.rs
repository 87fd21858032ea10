use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;
use crate::model::{ScopeId, TransactionType, UserId};

/// Materialized balance of one account.
///
/// The ledger entries are the source of truth; this projection is kept in
/// lock-step with them so that `current` always equals
/// `earned + purchased - spent - collected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub user: UserId,
    pub scope: ScopeId,
    pub current: Amount,
    pub total_earned: Amount,
    pub total_purchased: Amount,
    pub total_spent: Amount,
    pub total_collected: Amount,
    pub frozen: bool,
    /// Exempt from the platform fee when selling.
    pub fee_exempt: bool,
    pub last_update: DateTime<Utc>,
}

impl Balance {
    /// Fresh account with zero starting balance.
    pub fn new(user: UserId, scope: ScopeId) -> Self {
        Self {
            user,
            scope,
            current: Amount::zero(),
            total_earned: Amount::zero(),
            total_purchased: Amount::zero(),
            total_spent: Amount::zero(),
            total_collected: Amount::zero(),
            frozen: false,
            fee_exempt: false,
            last_update: Utc::now(),
        }
    }

    /// Apply a credit to the running balance and its tally.
    pub fn apply_credit(&mut self, txn_type: TransactionType, amount: Amount, at: DateTime<Utc>) {
        self.current += amount;
        match txn_type {
            TransactionType::Earn => self.total_earned += amount,
            TransactionType::TransferIn => self.total_purchased += amount,
            // Debit types never reach here; the ledger validates direction first.
            TransactionType::Spend
            | TransactionType::Collect
            | TransactionType::Burn
            | TransactionType::TransferOut => unreachable!("credit with debit type"),
        }
        self.last_update = at;
    }

    /// Apply a debit to the running balance and its tally. The caller has
    /// already checked sufficiency.
    pub fn apply_debit(&mut self, txn_type: TransactionType, amount: Amount, at: DateTime<Utc>) {
        self.current -= amount;
        match txn_type {
            TransactionType::Spend | TransactionType::TransferOut => self.total_spent += amount,
            TransactionType::Collect | TransactionType::Burn => self.total_collected += amount,
            TransactionType::Earn | TransactionType::TransferIn => {
                unreachable!("debit with credit type")
            }
        }
        self.last_update = at;
    }

    /// Recompute the balance from its tallies; used to assert reconciliation.
    pub fn reconciled(&self) -> Amount {
        self.total_earned + self.total_purchased - self.total_spent - self.total_collected
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn set_fee_exempt(&mut self, exempt: bool) {
        self.fee_exempt = exempt;
    }
}
