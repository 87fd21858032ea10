//! Core domain types for the point/token economy engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Amount;

/// User identifier.
pub type UserId = u64;

/// Scope identifier. A scope is an isolation boundary (tenant/community)
/// within which a user's balance is tracked independently.
pub type ScopeId = u32;

/// Ledger entry identifier, assigned from a monotonic sequence.
pub type EntryId = u64;

/// Unique key of one account: a user's balance within one scope.
///
/// `Ord` is derived so that operations touching two accounts can take their
/// locks in a stable global order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    pub user: UserId,
    pub scope: ScopeId,
}

impl AccountKey {
    pub fn new(user: UserId, scope: ScopeId) -> Self {
        Self { user, scope }
    }
}

/// Whether a transaction type adds to or removes from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

/// The kind of balance mutation recorded in a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Reward issuance or marketplace proceeds.
    Earn,
    /// Outbound payment.
    Spend,
    /// Collected by the platform.
    Collect,
    /// Removed from circulation.
    Burn,
    /// Inbound side of a user-to-user transfer.
    TransferIn,
    /// Outbound side of a user-to-user transfer.
    TransferOut,
}

impl TransactionType {
    pub fn direction(&self) -> Direction {
        match self {
            TransactionType::Earn | TransactionType::TransferIn => Direction::Credit,
            TransactionType::Spend
            | TransactionType::Collect
            | TransactionType::Burn
            | TransactionType::TransferOut => Direction::Debit,
        }
    }
}

/// Immutable record of a single balance mutation. Append-only: once written
/// an entry is never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user: UserId,
    pub scope: ScopeId,
    pub txn_type: TransactionType,
    /// Always positive; the sign is carried by `txn_type`.
    pub amount: Amount,
    pub balance_before: Amount,
    pub balance_after: Amount,
    pub reason: String,
    /// Correlates paired entries (both halves of a transfer, purchase legs).
    pub reference: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// An operation to apply against the ledger, the input of the replay stream.
#[derive(Debug, Clone)]
pub enum LedgerOp {
    Credit {
        user: UserId,
        scope: ScopeId,
        amount: Amount,
        txn_type: TransactionType,
        reason: String,
    },
    Debit {
        user: UserId,
        scope: ScopeId,
        amount: Amount,
        txn_type: TransactionType,
        reason: String,
    },
    Transfer {
        from: UserId,
        to: UserId,
        scope: ScopeId,
        amount: Amount,
        message: Option<String>,
    },
    Freeze {
        user: UserId,
        scope: ScopeId,
    },
    Unfreeze {
        user: UserId,
        scope: ScopeId,
    },
}

/// Category of rewardable activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionType {
    Development,
    Liquidity,
    Governance,
    Education,
    Commerce,
    Ux,
}

impl ContributionType {
    pub const ALL: [ContributionType; 6] = [
        ContributionType::Development,
        ContributionType::Liquidity,
        ContributionType::Governance,
        ContributionType::Education,
        ContributionType::Commerce,
        ContributionType::Ux,
    ];
}

/// One unit of rewardable activity, produced by external activity trackers.
/// Read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub id: Uuid,
    pub user: UserId,
    pub scope: ScopeId,
    pub contribution_type: ContributionType,
    /// Caller-supplied magnitude of the activity.
    pub score: Decimal,
    pub activity_date: DateTime<Utc>,
    pub reference: Option<Uuid>,
}

impl ContributionRecord {
    pub fn new(
        user: UserId,
        scope: ScopeId,
        contribution_type: ContributionType,
        score: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            scope,
            contribution_type,
            score,
            activity_date: Utc::now(),
            reference: None,
        }
    }
}

/// Lifecycle of a reward calculation.
///
/// `Distributed` and `Failed` are terminal; a failed calculation is only
/// retried by creating a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationStatus {
    Pending,
    Calculated,
    Approved,
    Distributed,
    Failed,
}

/// The outcome of running the reward formula for one contribution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardCalculation {
    pub id: Uuid,
    pub contribution_id: Uuid,
    pub user: UserId,
    pub scope: ScopeId,
    pub base_factor: Decimal,
    pub score: Decimal,
    pub market_factor: Decimal,
    pub holding_factor: Decimal,
    /// `base × score × market × holding`, truncated to 8 fractional digits.
    pub calculated_amount: Amount,
    /// The amount actually credited on distribution; starts equal to
    /// `calculated_amount` and may be adjusted before approval.
    pub final_amount: Amount,
    pub status: CalculationStatus,
    pub market_price_at_calculation: Decimal,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approval_comment: Option<String>,
    /// Ledger entry created by distribution, once distributed.
    pub distribution_entry: Option<EntryId>,
    /// Validation error message for `Failed` calculations.
    pub failure: Option<String>,
    /// Bumped by recalculation; the row is superseded in place, never duplicated.
    pub revision: u32,
    pub created_at: DateTime<Utc>,
}

/// One price observation feeding the market factor. Append-only time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPriceSample {
    pub price: Decimal,
    pub source: String,
    pub volume: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub observed_at: DateTime<Utc>,
}

/// Point-in-time holding data for one user, pushed by collaborators and used
/// to derive the holding factor on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingIncentiveSnapshot {
    pub user: UserId,
    pub holding_days: i64,
    pub avg_holding_price: Decimal,
    pub staking_months: u32,
    pub payment_usage_count: u32,
    pub taken_at: DateTime<Utc>,
}

/// Price movement classification over an analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}
