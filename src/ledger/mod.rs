//! The balance ledger.
//!
//! Authoritative store of per-user-per-scope balances. Every mutation
//! appends an immutable history entry and updates the materialized balance
//! under the same per-account lock, so the two can never diverge.
//! Also supports an async stream of ledger operations for replay.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio_stream::{Stream, StreamExt};
use tracing::info;
use uuid::Uuid;

use crate::Amount;
use crate::model::{
    AccountKey, Direction, LedgerEntry, LedgerOp, ScopeId, TransactionType, UserId,
};

mod account;
pub use account::Balance;

mod error;
pub use error::LedgerError;

/// Balance and history of one account, mutated as a unit.
#[derive(Debug)]
struct AccountState {
    balance: Balance,
    history: Vec<LedgerEntry>,
}

impl AccountState {
    fn new(key: AccountKey) -> Self {
        Self {
            balance: Balance::new(key.user, key.scope),
            history: Vec::new(),
        }
    }
}

/// The balance ledger.
///
/// Mutations on one account are serialized by its mutex; operations on
/// different accounts proceed concurrently. A transfer locks both endpoints
/// in [`AccountKey`] order, so concurrent opposite-direction transfers
/// cannot deadlock.
pub struct Ledger {
    accounts: RwLock<HashMap<AccountKey, Arc<Mutex<AccountState>>>>,
    next_entry_id: AtomicU64,
}

/// Public API
impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_entry_id: AtomicU64::new(1),
        }
    }

    /// Run the ledger against the given operation stream. Per-op failures
    /// are logged and do not stop the stream.
    pub async fn run(&self, mut stream: impl Stream<Item = LedgerOp> + Unpin) {
        while let Some(op) = stream.next().await {
            let _ = self.apply(op);
        }
    }

    /// Apply a single operation on top of the current ledger state.
    pub fn apply(&self, op: LedgerOp) -> Result<(), LedgerError> {
        match op {
            LedgerOp::Credit {
                user,
                scope,
                amount,
                txn_type,
                reason,
            } => {
                let result = self.credit(user, scope, amount, txn_type, &reason, None);
                Self::log_result("credit", user, scope, Some(amount), &result);
                result?;
            }
            LedgerOp::Debit {
                user,
                scope,
                amount,
                txn_type,
                reason,
            } => {
                let result = self.debit(user, scope, amount, txn_type, &reason, None);
                Self::log_result("debit", user, scope, Some(amount), &result);
                result?;
            }
            LedgerOp::Transfer {
                from,
                to,
                scope,
                amount,
                message,
            } => {
                let result = self.transfer(from, to, scope, amount, message.as_deref());
                Self::log_result("transfer", from, scope, Some(amount), &result);
                result?;
            }
            LedgerOp::Freeze { user, scope } => {
                let result = self.freeze(user, scope);
                Self::log_result("freeze", user, scope, None, &result);
                result?;
            }
            LedgerOp::Unfreeze { user, scope } => {
                let result = self.unfreeze(user, scope);
                Self::log_result("unfreeze", user, scope, None, &result);
                result?;
            }
        }
        Ok(())
    }

    /// Credit `amount` to an account, creating it on first touch.
    ///
    /// Credits are permitted on frozen accounts: inbound rewards still accrue.
    pub fn credit(
        &self,
        user: UserId,
        scope: ScopeId,
        amount: Amount,
        txn_type: TransactionType,
        reason: &str,
        reference: Option<Uuid>,
    ) -> Result<LedgerEntry, LedgerError> {
        Self::require_positive(amount)?;
        Self::require_direction(txn_type, Direction::Credit)?;

        let handle = self.account(AccountKey::new(user, scope));
        let mut state = handle.lock();
        Ok(self.append_credit(&mut state, amount, txn_type, reason, reference))
    }

    /// Debit `amount` from an account, creating it on first touch (in which
    /// case the debit fails against a zero balance).
    pub fn debit(
        &self,
        user: UserId,
        scope: ScopeId,
        amount: Amount,
        txn_type: TransactionType,
        reason: &str,
        reference: Option<Uuid>,
    ) -> Result<LedgerEntry, LedgerError> {
        Self::require_positive(amount)?;
        Self::require_direction(txn_type, Direction::Debit)?;

        let handle = self.account(AccountKey::new(user, scope));
        let mut state = handle.lock();

        if state.balance.frozen {
            return Err(LedgerError::AccountFrozen { user, scope });
        }
        if state.balance.current < amount {
            return Err(LedgerError::InsufficientBalance {
                user,
                scope,
                available: state.balance.current,
                requested: amount,
            });
        }

        Ok(self.append_debit(&mut state, amount, txn_type, reason, reference))
    }

    /// Move `amount` between two users within one scope.
    ///
    /// Both endpoint locks are taken in key order and held for the whole
    /// operation; every failure mode is checked before either side mutates,
    /// so a partial transfer is never observable. The two entries share one
    /// fresh reference id.
    pub fn transfer(
        &self,
        from: UserId,
        to: UserId,
        scope: ScopeId,
        amount: Amount,
        message: Option<&str>,
    ) -> Result<(LedgerEntry, LedgerEntry), LedgerError> {
        if from == to {
            return Err(LedgerError::SameAccount(from));
        }
        Self::require_positive(amount)?;

        let from_key = AccountKey::new(from, scope);
        let to_key = AccountKey::new(to, scope);
        let from_handle = self.account(from_key);
        let to_handle = self.account(to_key);

        // Fixed global lock order prevents deadlock against a concurrent
        // transfer in the opposite direction.
        let (mut from_state, mut to_state) = if from_key < to_key {
            let f = from_handle.lock();
            let t = to_handle.lock();
            (f, t)
        } else {
            let t = to_handle.lock();
            let f = from_handle.lock();
            (f, t)
        };

        if from_state.balance.frozen {
            return Err(LedgerError::AccountFrozen { user: from, scope });
        }
        if from_state.balance.current < amount {
            return Err(LedgerError::InsufficientBalance {
                user: from,
                scope,
                available: from_state.balance.current,
                requested: amount,
            });
        }

        let reference = Uuid::new_v4();
        let reason = message.unwrap_or("transfer").to_string();

        let out_entry = self.append_debit(
            &mut from_state,
            amount,
            TransactionType::TransferOut,
            &reason,
            Some(reference),
        );
        let in_entry = self.append_credit(
            &mut to_state,
            amount,
            TransactionType::TransferIn,
            &reason,
            Some(reference),
        );

        Ok((out_entry, in_entry))
    }

    /// Block debits and outbound transfers for an account.
    pub fn freeze(&self, user: UserId, scope: ScopeId) -> Result<(), LedgerError> {
        let handle = self
            .existing_account(AccountKey::new(user, scope))
            .ok_or(LedgerError::NotFound { user, scope })?;
        handle.lock().balance.freeze();
        Ok(())
    }

    pub fn unfreeze(&self, user: UserId, scope: ScopeId) -> Result<(), LedgerError> {
        let handle = self
            .existing_account(AccountKey::new(user, scope))
            .ok_or(LedgerError::NotFound { user, scope })?;
        handle.lock().balance.unfreeze();
        Ok(())
    }

    /// Mark an account as exempt from the platform fee when selling.
    pub fn set_fee_exempt(
        &self,
        user: UserId,
        scope: ScopeId,
        exempt: bool,
    ) -> Result<(), LedgerError> {
        let handle = self
            .existing_account(AccountKey::new(user, scope))
            .ok_or(LedgerError::NotFound { user, scope })?;
        handle.lock().balance.set_fee_exempt(exempt);
        Ok(())
    }

    /// Snapshot of one account's balance.
    pub fn get_balance(&self, user: UserId, scope: ScopeId) -> Option<Balance> {
        self.existing_account(AccountKey::new(user, scope))
            .map(|handle| handle.lock().balance.clone())
    }

    /// One page of an account's history, newest entries first. Page numbers
    /// start at 0; an unknown account or out-of-range page yields an empty page.
    pub fn get_history(
        &self,
        user: UserId,
        scope: ScopeId,
        page: usize,
        page_size: usize,
    ) -> Vec<LedgerEntry> {
        let Some(handle) = self.existing_account(AccountKey::new(user, scope)) else {
            return Vec::new();
        };
        let state = handle.lock();
        state
            .history
            .iter()
            .rev()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect()
    }

    /// Number of history entries for one account.
    pub fn entry_count(&self, user: UserId, scope: ScopeId) -> usize {
        self.existing_account(AccountKey::new(user, scope))
            .map(|handle| handle.lock().history.len())
            .unwrap_or(0)
    }

    /// Sum of current balances across a scope; transfers keep this constant.
    pub fn scope_total(&self, scope: ScopeId) -> Amount {
        let handles: Vec<_> = self
            .accounts
            .read()
            .iter()
            .filter(|(key, _)| key.scope == scope)
            .map(|(_, handle)| handle.clone())
            .collect();

        let mut total = Amount::zero();
        for handle in handles {
            total += handle.lock().balance.current;
        }
        total
    }

    /// Balances of every account, in no particular order.
    pub fn balances(&self) -> Vec<Balance> {
        let handles: Vec<_> = self.accounts.read().values().cloned().collect();
        handles
            .into_iter()
            .map(|handle| handle.lock().balance.clone())
            .collect()
    }
}

/// Private API
impl Ledger {
    /// Small helper to log `apply` results
    fn log_result<E: std::fmt::Display, T>(
        op: &str,
        user: UserId,
        scope: ScopeId,
        amount: Option<Amount>,
        result: &Result<T, E>,
    ) {
        match (result, amount) {
            (Ok(_), Some(amt)) => {
                info!(user = %user, scope = %scope, amount = %amt, "{op} applied");
            }
            (Ok(_), None) => {
                info!(user = %user, scope = %scope, "{op} applied");
            }
            (Err(e), Some(amt)) => {
                info!(user = %user, scope = %scope, amount = %amt, reason = %e, "{op} skipped");
            }
            (Err(e), None) => {
                info!(user = %user, scope = %scope, reason = %e, "{op} skipped");
            }
        }
    }

    fn require_positive(amount: Amount) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }
        Ok(())
    }

    fn require_direction(
        txn_type: TransactionType,
        expected: Direction,
    ) -> Result<(), LedgerError> {
        if txn_type.direction() != expected {
            return Err(LedgerError::WrongDirection {
                txn_type,
                expected: match expected {
                    Direction::Credit => "credit",
                    Direction::Debit => "debit",
                },
            });
        }
        Ok(())
    }

    /// Get or create the shared handle for one account.
    fn account(&self, key: AccountKey) -> Arc<Mutex<AccountState>> {
        if let Some(existing) = self.accounts.read().get(&key) {
            return existing.clone();
        }
        self.accounts
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(AccountState::new(key))))
            .clone()
    }

    fn existing_account(&self, key: AccountKey) -> Option<Arc<Mutex<AccountState>>> {
        self.accounts.read().get(&key).cloned()
    }

    /// Append a validated credit entry and update the balance in lock-step.
    /// The caller holds the account lock.
    fn append_credit(
        &self,
        state: &mut AccountState,
        amount: Amount,
        txn_type: TransactionType,
        reason: &str,
        reference: Option<Uuid>,
    ) -> LedgerEntry {
        let now = Utc::now();
        let before = state.balance.current;
        state.balance.apply_credit(txn_type, amount, now);

        let entry = LedgerEntry {
            id: self.next_entry_id.fetch_add(1, Ordering::Relaxed),
            user: state.balance.user,
            scope: state.balance.scope,
            txn_type,
            amount,
            balance_before: before,
            balance_after: state.balance.current,
            reason: reason.to_string(),
            reference,
            created_at: now,
        };
        state.history.push(entry.clone());
        entry
    }

    /// Append a validated debit entry and update the balance in lock-step.
    /// The caller holds the account lock and has checked sufficiency.
    fn append_debit(
        &self,
        state: &mut AccountState,
        amount: Amount,
        txn_type: TransactionType,
        reason: &str,
        reference: Option<Uuid>,
    ) -> LedgerEntry {
        let now = Utc::now();
        let before = state.balance.current;
        state.balance.apply_debit(txn_type, amount, now);

        let entry = LedgerEntry {
            id: self.next_entry_id.fetch_add(1, Ordering::Relaxed),
            user: state.balance.user,
            scope: state.balance.scope,
            txn_type,
            amount,
            balance_before: before,
            balance_after: state.balance.current,
            reason: reason.to_string(),
            reference,
            created_at: now,
        };
        state.history.push(entry.clone());
        entry
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
