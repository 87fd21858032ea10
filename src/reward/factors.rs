//! Factor providers feeding the reward formula.
//!
//! Three independent lookups, each producing a dimensionless multiplier:
//! base (by contribution category), market (current vs. target price) and
//! holding (duration, staking, payment usage, price support). None of them
//! mutate ledger state; the providers only read their own append-only stores.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::{BaseFactorConfig, HoldingFactorConfig, MarketFactorConfig};
use crate::model::{ContributionType, HoldingIncentiveSnapshot, MarketPriceSample, Trend};

/// One effective-dated value of a base factor. Replacing a factor closes the
/// open record instead of mutating it, so historical calculations stay
/// reproducible.
#[derive(Debug, Clone)]
pub struct BaseFactorRecord {
    pub factor: Decimal,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
}

/// Per-category reward weights with effective dating and an append-only
/// activity log for volume-based adjustment.
pub struct BaseFactorProvider {
    records: RwLock<HashMap<ContributionType, Vec<BaseFactorRecord>>>,
    activity: RwLock<Vec<(ContributionType, DateTime<Utc>)>>,
    config: BaseFactorConfig,
}

impl BaseFactorProvider {
    pub fn new(config: BaseFactorConfig) -> Self {
        let mut records: HashMap<ContributionType, Vec<BaseFactorRecord>> = HashMap::new();
        for (contribution_type, factor) in &config.seed_factors {
            records.insert(
                *contribution_type,
                vec![BaseFactorRecord {
                    factor: *factor,
                    effective_from: DateTime::<Utc>::MIN_UTC,
                    effective_to: None,
                }],
            );
        }
        Self {
            records: RwLock::new(records),
            activity: RwLock::new(Vec::new()),
            config,
        }
    }

    /// The factor effective right now for a category.
    pub fn current_factor(&self, contribution_type: ContributionType) -> Option<Decimal> {
        self.factor_at(contribution_type, Utc::now())
    }

    /// The factor that was effective at `when`.
    pub fn factor_at(
        &self,
        contribution_type: ContributionType,
        when: DateTime<Utc>,
    ) -> Option<Decimal> {
        let records = self.records.read();
        records.get(&contribution_type)?.iter().find_map(|record| {
            let started = record.effective_from <= when;
            let not_ended = record.effective_to.is_none_or(|end| when < end);
            (started && not_ended).then_some(record.factor)
        })
    }

    /// Replace a category's factor from `effective_from` onward. The open
    /// record is closed at the boundary; history is never rewritten.
    pub fn replace(
        &self,
        contribution_type: ContributionType,
        factor: Decimal,
        effective_from: DateTime<Utc>,
    ) {
        let mut records = self.records.write();
        let history = records.entry(contribution_type).or_default();
        if let Some(open) = history.iter_mut().find(|r| r.effective_to.is_none()) {
            open.effective_to = Some(effective_from);
        }
        history.push(BaseFactorRecord {
            factor,
            effective_from,
            effective_to: None,
        });
        info!(?contribution_type, %factor, "base factor replaced");
    }

    /// Append one activity observation for a category.
    pub fn record_activity(&self, contribution_type: ContributionType, at: DateTime<Utc>) {
        self.activity.write().push((contribution_type, at));
    }

    /// Activity volume for a category since `since`, counted from the
    /// append-only log.
    pub fn activity_volume(&self, contribution_type: ContributionType, since: DateTime<Utc>) -> u64 {
        self.activity
            .read()
            .iter()
            .filter(|(t, at)| *t == contribution_type && *at >= since)
            .count() as u64
    }

    /// Volume adjustment: high activity discounts the factor, low activity
    /// earns a premium, anything between is unchanged. Pure function of its
    /// inputs.
    pub fn adjust_for_volume(factor: Decimal, volume: u64, config: &BaseFactorConfig) -> Decimal {
        if volume >= config.high_volume_threshold {
            factor * config.high_volume_discount
        } else if volume <= config.low_volume_threshold {
            factor * config.low_volume_premium
        } else {
            factor
        }
    }

    /// Current factor with the volume adjustment applied over the trailing
    /// window.
    pub fn current_factor_adjusted(
        &self,
        contribution_type: ContributionType,
        window: Duration,
    ) -> Option<Decimal> {
        let factor = self.current_factor(contribution_type)?;
        let volume = self.activity_volume(contribution_type, Utc::now() - window);
        Some(Self::adjust_for_volume(factor, volume, &self.config))
    }
}

/// Market factor from the price series: factor > 1 while the price sits
/// below target (incentivize participation), < 1 above it (throttle
/// issuance).
pub struct MarketFactorProvider {
    samples: RwLock<Vec<MarketPriceSample>>,
    config: MarketFactorConfig,
}

impl MarketFactorProvider {
    pub fn new(config: MarketFactorConfig) -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Append a price observation and return the recomputed factor.
    /// Non-positive prices are dropped.
    pub fn update_price(
        &self,
        price: Decimal,
        source: &str,
        volume: Option<Decimal>,
        market_cap: Option<Decimal>,
    ) -> Decimal {
        if price <= Decimal::ZERO {
            warn!(%price, source, "ignoring non-positive price sample");
            return self.current_factor();
        }

        self.samples.write().push(MarketPriceSample {
            price,
            source: source.to_string(),
            volume,
            market_cap,
            observed_at: Utc::now(),
        });

        let factor = self.factor_for_price(price);
        info!(%price, source, %factor, "market price updated");
        factor
    }

    /// Latest observed price; the target price until the first sample lands.
    pub fn latest_price(&self) -> Decimal {
        self.samples
            .read()
            .last()
            .map(|sample| sample.price)
            .unwrap_or(self.config.target_price)
    }

    /// Factor for the latest observed price; neutral while the series is empty.
    pub fn current_factor(&self) -> Decimal {
        match self.samples.read().last() {
            Some(sample) => self.factor_for_price(sample.price),
            None => Decimal::ONE,
        }
    }

    /// Step function over `price / target`, monotonically decreasing.
    pub fn factor_for_price(&self, price: Decimal) -> Decimal {
        let ratio = price / self.config.target_price;
        self.config
            .bands
            .iter()
            .find(|band| ratio <= band.max_ratio)
            .map(|band| band.factor)
            .unwrap_or(self.config.floor_factor)
    }

    /// Classify price movement across the trailing window. Changes within
    /// the deadband are `Stable`, as are windows with fewer than two samples.
    pub fn analyze_trend(&self, period_days: i64) -> Trend {
        let since = Utc::now() - Duration::days(period_days);
        let samples = self.samples.read();
        let in_window: Vec<&MarketPriceSample> = samples
            .iter()
            .filter(|sample| sample.observed_at >= since)
            .collect();

        let (Some(first), Some(last)) = (in_window.first(), in_window.last()) else {
            return Trend::Stable;
        };
        if in_window.len() < 2 || first.price == Decimal::ZERO {
            return Trend::Stable;
        }

        let change_pct = (last.price - first.price) / first.price * Decimal::ONE_HUNDRED;
        if change_pct > self.config.trend_deadband_pct {
            Trend::Up
        } else if change_pct < -self.config.trend_deadband_pct {
            Trend::Down
        } else {
            Trend::Stable
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.read().len()
    }
}

/// Every sub-term of a holding factor computation, for auditability.
#[derive(Debug, Clone)]
pub struct HoldingFactorBreakdown {
    pub duration_term: Decimal,
    pub price_support_term: Decimal,
    pub staking_bonus: Decimal,
    pub payment_usage_bonus: Decimal,
    /// `1 + duration + price support + staking + payment`, before clamping.
    pub raw: Decimal,
    pub clamped: Decimal,
}

/// Holding factor:
/// `1 + α·log10(days) + β·(avg holding price / current price) + bonuses`,
/// clamped to the configured range. Pure computation over a snapshot.
pub struct HoldingFactorProvider {
    config: HoldingFactorConfig,
}

impl HoldingFactorProvider {
    pub fn new(config: HoldingFactorConfig) -> Self {
        Self { config }
    }

    pub fn compute(
        &self,
        snapshot: &HoldingIncentiveSnapshot,
        current_price: Decimal,
    ) -> HoldingFactorBreakdown {
        // holding_days <= 0 means "just acquired": no duration credit, not an error.
        let duration_term = if snapshot.holding_days > 0 {
            let log10 = (snapshot.holding_days as f64).log10();
            (self.config.alpha * Decimal::from_f64(log10).unwrap_or_default()).round_dp(8)
        } else {
            Decimal::ZERO
        };

        let price_support_term = if current_price > Decimal::ZERO {
            (self.config.beta * (snapshot.avg_holding_price / current_price)).round_dp(8)
        } else {
            Decimal::ZERO
        };

        let staking_bonus = self
            .config
            .staking_tiers
            .iter()
            .rev()
            .find(|(months, _)| snapshot.staking_months >= *months)
            .map(|(_, bonus)| *bonus)
            .unwrap_or(Decimal::ZERO);

        let payment_usage_bonus = if snapshot.payment_usage_count > 0 {
            self.config.payment_usage_bonus
        } else {
            Decimal::ZERO
        };

        let raw =
            Decimal::ONE + duration_term + price_support_term + staking_bonus + payment_usage_bonus;
        let clamped = raw.clamp(self.config.min_factor, self.config.max_factor);

        HoldingFactorBreakdown {
            duration_term,
            price_support_term,
            staking_bonus,
            payment_usage_bonus,
            raw,
            clamped,
        }
    }
}
