//! Marketplace purchase orchestration.
//!
//! Debits the buyer, credits the seller net of the platform fee, then
//! triggers the secondary-token split. The debit and credit form the atomic
//! core: a failure there leaves the ledger as if no purchase occurred. The
//! secondary distribution is best-effort — its failure is surfaced on the
//! result for the caller to observe and retry, never unwinding the
//! already-settled payment.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::Amount;
use crate::config::{EngineConfig, SecondaryRewardConfig};
use crate::events::{EngineEvent, EventBus};
use crate::ledger::{Ledger, LedgerError};
use crate::model::{EntryId, LedgerEntry, ScopeId, TransactionType, UserId};

/// Error raised while settling a purchase.
#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("purchase amount overflow")]
    Overflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Secondary-token amounts issued for one purchase. Amounts that truncate
/// to zero produce no ledger entry.
#[derive(Debug, Clone)]
pub struct SecondaryReward {
    pub purchase_id: Uuid,
    pub total: Amount,
    pub buyer_amount: Amount,
    pub seller_amount: Amount,
    pub buyer_entry: Option<EntryId>,
    pub seller_entry: Option<EntryId>,
}

/// Splits the secondary-token reward of a purchase between its
/// counterparties and credits them on the secondary ledger.
pub struct SecondaryRewardDistributor {
    ledger: Arc<Ledger>,
    config: SecondaryRewardConfig,
}

impl SecondaryRewardDistributor {
    pub fn new(ledger: Arc<Ledger>, config: SecondaryRewardConfig) -> Self {
        Self { ledger, config }
    }

    /// The secondary-unit ledger the rewards land on.
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Issue the secondary reward for a purchase. Idempotence is the
    /// caller's concern: retry only after a reported failure.
    pub fn distribute(
        &self,
        purchase_id: Uuid,
        buyer: UserId,
        seller: UserId,
        scope: ScopeId,
        total_price: Amount,
    ) -> Result<SecondaryReward, PurchaseError> {
        let total = total_price
            .checked_mul(self.config.reward_rate)
            .ok_or(PurchaseError::Overflow)?;
        let buyer_amount = total
            .checked_mul(self.config.buyer_share)
            .ok_or(PurchaseError::Overflow)?;
        // Remainder to the seller: the split never creates or destroys value.
        let seller_amount = total - buyer_amount;

        let buyer_entry = if buyer_amount.is_positive() {
            Some(
                self.ledger
                    .credit(
                        buyer,
                        scope,
                        buyer_amount,
                        TransactionType::Earn,
                        "purchase reward",
                        Some(purchase_id),
                    )?
                    .id,
            )
        } else {
            None
        };
        let seller_entry = if seller_amount.is_positive() {
            Some(
                self.ledger
                    .credit(
                        seller,
                        scope,
                        seller_amount,
                        TransactionType::Earn,
                        "sale reward",
                        Some(purchase_id),
                    )?
                    .id,
            )
        } else {
            None
        };

        info!(
            purchase = %purchase_id,
            %buyer_amount,
            %seller_amount,
            "secondary reward distributed"
        );
        Ok(SecondaryReward {
            purchase_id,
            total,
            buyer_amount,
            seller_amount,
            buyer_entry,
            seller_entry,
        })
    }
}

/// Outcome of a settled purchase. `secondary` carries the best-effort
/// distribution result so callers can observe and retry a failed split.
#[derive(Debug)]
pub struct PurchaseResult {
    pub purchase_id: Uuid,
    pub buyer_entry: LedgerEntry,
    pub seller_entry: LedgerEntry,
    pub fee: Amount,
    /// Present when a platform account is configured to receive the fee.
    pub fee_entry: Option<LedgerEntry>,
    pub secondary: Result<SecondaryReward, PurchaseError>,
}

/// Coordinates a marketplace purchase across the primary ledger and the
/// secondary reward distributor.
pub struct PurchaseOrchestrator {
    ledger: Arc<Ledger>,
    secondary: SecondaryRewardDistributor,
    config: EngineConfig,
    events: EventBus,
}

impl PurchaseOrchestrator {
    pub fn new(
        ledger: Arc<Ledger>,
        secondary_ledger: Arc<Ledger>,
        config: EngineConfig,
        events: EventBus,
    ) -> Self {
        Self {
            secondary: SecondaryRewardDistributor::new(secondary_ledger, config.secondary.clone()),
            ledger,
            config,
            events,
        }
    }

    /// The distributor, exposed so a failed secondary split can be retried
    /// with the same purchase id.
    pub fn secondary(&self) -> &SecondaryRewardDistributor {
        &self.secondary
    }

    /// Settle a purchase of `total_price` from buyer to seller.
    pub fn process_purchase(
        &self,
        buyer: UserId,
        seller: UserId,
        scope: ScopeId,
        total_price: Amount,
    ) -> Result<PurchaseResult, PurchaseError> {
        if buyer == seller {
            return Err(LedgerError::SameAccount(buyer).into());
        }
        if !total_price.is_positive() {
            return Err(LedgerError::InvalidAmount(total_price).into());
        }

        // Fail fast on an obviously underfunded buyer before any mutation.
        let available = self
            .ledger
            .get_balance(buyer, scope)
            .map(|balance| balance.current)
            .unwrap_or_default();
        if available < total_price {
            return Err(LedgerError::InsufficientBalance {
                user: buyer,
                scope,
                available,
                requested: total_price,
            }
            .into());
        }

        let seller_exempt = self
            .ledger
            .get_balance(seller, scope)
            .map(|balance| balance.fee_exempt)
            .unwrap_or(false);
        let fee = if seller_exempt {
            Amount::zero()
        } else {
            total_price
                .checked_mul(self.config.fee_rate)
                .ok_or(PurchaseError::Overflow)?
        };
        let seller_net = total_price - fee;
        let purchase_id = Uuid::new_v4();

        let buyer_entry = self.ledger.debit(
            buyer,
            scope,
            total_price,
            TransactionType::Spend,
            "marketplace purchase",
            Some(purchase_id),
        )?;

        let seller_entry = match self.ledger.credit(
            seller,
            scope,
            seller_net,
            TransactionType::Earn,
            "marketplace sale",
            Some(purchase_id),
        ) {
            Ok(entry) => entry,
            Err(e) => {
                self.refund_buyer(buyer, scope, total_price, purchase_id);
                return Err(e.into());
            }
        };

        let fee_entry = match self.config.platform_account {
            Some(platform) if fee.is_positive() => {
                match self.ledger.credit(
                    platform,
                    scope,
                    fee,
                    TransactionType::Earn,
                    "platform fee",
                    Some(purchase_id),
                ) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        // Unwind both settled legs before surfacing.
                        if let Err(rollback) = self.ledger.debit(
                            seller,
                            scope,
                            seller_net,
                            TransactionType::Spend,
                            "purchase reversal",
                            Some(purchase_id),
                        ) {
                            error!(purchase = %purchase_id, %rollback, "seller rollback failed");
                        }
                        self.refund_buyer(buyer, scope, total_price, purchase_id);
                        return Err(e.into());
                    }
                }
            }
            _ => None,
        };

        // Best-effort: a reward-system hiccup never reverses settled payment.
        let secondary =
            self.secondary
                .distribute(purchase_id, buyer, seller, scope, total_price);
        if let Err(e) = &secondary {
            warn!(purchase = %purchase_id, reason = %e, "secondary reward distribution failed");
        }

        info!(
            purchase = %purchase_id,
            buyer = %buyer,
            seller = %seller,
            amount = %total_price,
            %fee,
            "purchase completed"
        );
        self.events.emit(EngineEvent::PurchaseCompleted {
            purchase_id,
            buyer,
            seller,
            scope,
            total_price,
            fee,
            completed_at: Utc::now(),
        });

        Ok(PurchaseResult {
            purchase_id,
            buyer_entry,
            seller_entry,
            fee,
            fee_entry,
            secondary,
        })
    }

    /// Compensate a settled debit after a failed downstream step.
    fn refund_buyer(&self, buyer: UserId, scope: ScopeId, amount: Amount, purchase_id: Uuid) {
        if let Err(e) = self.ledger.credit(
            buyer,
            scope,
            amount,
            TransactionType::Earn,
            "purchase reversal",
            Some(purchase_id),
        ) {
            error!(purchase = %purchase_id, reason = %e, "buyer refund failed");
        }
    }
}
