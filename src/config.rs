//! Engine configuration.
//!
//! Every limit, rate, and threshold the engine uses is carried here and
//! injected at construction. Nothing reads ambient/global state, so tests
//! can run against deterministic values.

use rust_decimal::Decimal;

use crate::Amount;
use crate::model::{ContributionType, UserId};

/// Top-level configuration for the ledger, reward, and purchase components.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rewards below this are rejected, not clamped.
    pub min_reward: Amount,
    /// Rewards above this are rejected, not clamped.
    pub max_reward: Amount,
    /// Platform fee taken from the seller's proceeds on a purchase.
    pub fee_rate: Decimal,
    /// When set, the platform fee is credited to this account instead of
    /// being implicitly retained.
    pub platform_account: Option<UserId>,
    /// Whether `distribute` requires a prior `approve`.
    pub require_approval: bool,
    /// Whether an existing approval survives a recalculation. When false the
    /// calculation drops back to `Calculated` and must be re-approved.
    pub preserve_approval_on_recalculate: bool,
    pub base: BaseFactorConfig,
    pub market: MarketFactorConfig,
    pub holding: HoldingFactorConfig,
    pub secondary: SecondaryRewardConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_reward: Amount::new(Decimal::new(1, 8)), // 0.00000001
            max_reward: Amount::new(Decimal::from(10_000)),
            fee_rate: Decimal::new(5, 2), // 5%
            platform_account: None,
            require_approval: true,
            preserve_approval_on_recalculate: false,
            base: BaseFactorConfig::default(),
            market: MarketFactorConfig::default(),
            holding: HoldingFactorConfig::default(),
            secondary: SecondaryRewardConfig::default(),
        }
    }
}

/// Seed factors and volume-adjustment parameters for the base factor.
#[derive(Debug, Clone)]
pub struct BaseFactorConfig {
    /// Initial factor per contribution category.
    pub seed_factors: Vec<(ContributionType, Decimal)>,
    /// Activity volume at or above which the factor is discounted.
    pub high_volume_threshold: u64,
    /// Activity volume at or below which the factor earns a premium.
    pub low_volume_threshold: u64,
    pub high_volume_discount: Decimal,
    pub low_volume_premium: Decimal,
}

impl Default for BaseFactorConfig {
    fn default() -> Self {
        Self {
            seed_factors: vec![
                (ContributionType::Development, Decimal::new(14, 1)), // 1.4
                (ContributionType::Liquidity, Decimal::new(13, 1)),
                (ContributionType::Governance, Decimal::new(12, 1)),
                (ContributionType::Education, Decimal::new(11, 1)),
                (ContributionType::Commerce, Decimal::ONE),
                (ContributionType::Ux, Decimal::ONE),
            ],
            high_volume_threshold: 1_000,
            low_volume_threshold: 100,
            high_volume_discount: Decimal::new(9, 1),  // ×0.9
            low_volume_premium: Decimal::new(11, 1),   // ×1.1
        }
    }
}

/// One step of the market factor function: applies while
/// `current_price / target_price <= max_ratio`.
#[derive(Debug, Clone, Copy)]
pub struct MarketBand {
    pub max_ratio: Decimal,
    pub factor: Decimal,
}

/// Target price and the descending step function around it.
#[derive(Debug, Clone)]
pub struct MarketFactorConfig {
    pub target_price: Decimal,
    /// Sorted by `max_ratio` ascending; factors must decrease as the ratio
    /// grows (issuance is throttled when the price runs above target).
    pub bands: Vec<MarketBand>,
    /// Factor once the ratio exceeds every band.
    pub floor_factor: Decimal,
    /// Percentage change within which a trend is classified `Stable`.
    pub trend_deadband_pct: Decimal,
}

impl Default for MarketFactorConfig {
    fn default() -> Self {
        Self {
            target_price: Decimal::ONE,
            bands: vec![
                MarketBand {
                    max_ratio: Decimal::new(5, 1), // ≤ 0.5 of target
                    factor: Decimal::new(15, 1),   // 1.5
                },
                MarketBand {
                    max_ratio: Decimal::new(8, 1),
                    factor: Decimal::new(12, 1),
                },
                MarketBand {
                    max_ratio: Decimal::new(12, 1), // within ±20% of target
                    factor: Decimal::ONE,
                },
                MarketBand {
                    max_ratio: Decimal::new(15, 1),
                    factor: Decimal::new(8, 1),
                },
            ],
            floor_factor: Decimal::new(5, 1),
            trend_deadband_pct: Decimal::TWO,
        }
    }
}

/// Coefficients for the holding factor formula:
/// `1 + α·log10(days) + β·(avg price / current price) + staking + payment`.
#[derive(Debug, Clone)]
pub struct HoldingFactorConfig {
    pub alpha: Decimal,
    pub beta: Decimal,
    /// `(minimum staking months, bonus)` steps, ascending by months.
    pub staking_tiers: Vec<(u32, Decimal)>,
    /// Flat bonus when the user has paid with the token at least once.
    pub payment_usage_bonus: Decimal,
    pub min_factor: Decimal,
    pub max_factor: Decimal,
}

impl Default for HoldingFactorConfig {
    fn default() -> Self {
        Self {
            alpha: Decimal::new(1, 1),  // 0.1
            beta: Decimal::new(5, 2),   // 0.05
            staking_tiers: vec![
                (3, Decimal::new(5, 2)),
                (6, Decimal::new(10, 2)),
                (12, Decimal::new(20, 2)),
            ],
            payment_usage_bonus: Decimal::new(5, 2),
            min_factor: Decimal::new(5, 1),
            max_factor: Decimal::TWO,
        }
    }
}

/// Secondary-token reward split on marketplace purchases.
#[derive(Debug, Clone)]
pub struct SecondaryRewardConfig {
    /// Secondary tokens issued per unit of purchase price.
    pub reward_rate: Decimal,
    /// Buyer's share of the issued reward; the remainder goes to the seller.
    pub buyer_share: Decimal,
}

impl Default for SecondaryRewardConfig {
    fn default() -> Self {
        Self {
            reward_rate: Decimal::new(1, 2),  // 1% of the purchase price
            buyer_share: Decimal::new(5, 1),  // split evenly
        }
    }
}

impl BaseFactorConfig {
    pub fn seed_factor(&self, contribution_type: ContributionType) -> Option<Decimal> {
        self.seed_factors
            .iter()
            .find(|(t, _)| *t == contribution_type)
            .map(|(_, f)| *f)
    }
}
