//! Reward calculation and distribution.
//!
//! Combines the factor providers with a contribution score into a reward
//! amount, tracks each calculation through its lifecycle
//! (`Pending → Calculated → Approved → Distributed`, `Failed` terminal),
//! and credits the ledger exactly once per distributed calculation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::Amount;
use crate::config::EngineConfig;
use crate::events::{EngineEvent, EventBus};
use crate::ledger::Ledger;
use crate::model::{
    CalculationStatus, ContributionRecord, EntryId, HoldingIncentiveSnapshot, LedgerEntry,
    RewardCalculation, TransactionType, UserId,
};

pub mod factors;
pub use factors::{
    BaseFactorProvider, BaseFactorRecord, HoldingFactorBreakdown, HoldingFactorProvider,
    MarketFactorProvider,
};

mod error;
pub use error::{CalculationOperation, RewardError};

/// Result of one item in a batch calculation. A failed item never aborts
/// the batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub contribution_id: Uuid,
    pub result: Result<RewardCalculation, RewardError>,
}

/// What `distribute` did for one calculation.
#[derive(Debug)]
pub enum Distribution {
    /// A ledger credit was created by this call.
    Credited(LedgerEntry),
    /// The calculation had already been distributed; the prior entry is
    /// reported and no new credit is made.
    AlreadyDistributed(EntryId),
}

#[derive(Debug)]
pub struct DistributionOutcome {
    pub calculation_id: Uuid,
    pub result: Result<Distribution, RewardError>,
}

/// Output of one pass through the reward formula.
struct FormulaOutput {
    base_factor: Decimal,
    market_factor: Decimal,
    holding_factor: Decimal,
    market_price: Decimal,
    amount: Amount,
}

/// The reward computation engine.
///
/// Calculation is read-only: no ledger mutation happens before `distribute`,
/// so abandoned or failed calculations leave no partial state behind.
pub struct RewardEngine {
    config: EngineConfig,
    base: BaseFactorProvider,
    market: MarketFactorProvider,
    holding: HoldingFactorProvider,
    holdings: RwLock<HashMap<UserId, HoldingIncentiveSnapshot>>,
    calculations: RwLock<HashMap<Uuid, RewardCalculation>>,
    by_contribution: RwLock<HashMap<Uuid, Uuid>>,
    ledger: Arc<Ledger>,
    events: EventBus,
}

/// Public API
impl RewardEngine {
    pub fn new(config: EngineConfig, ledger: Arc<Ledger>, events: EventBus) -> Self {
        Self {
            base: BaseFactorProvider::new(config.base.clone()),
            market: MarketFactorProvider::new(config.market.clone()),
            holding: HoldingFactorProvider::new(config.holding.clone()),
            holdings: RwLock::new(HashMap::new()),
            calculations: RwLock::new(HashMap::new()),
            by_contribution: RwLock::new(HashMap::new()),
            config,
            ledger,
            events,
        }
    }

    /// Run the reward formula for one contribution record.
    ///
    /// `amount = base × score × market × holding`, truncated to 8 fractional
    /// digits. Out-of-bounds amounts and non-positive factors persist a
    /// `Failed` calculation and surface a typed error; nothing is clamped.
    pub fn calculate(
        &self,
        record: &ContributionRecord,
    ) -> Result<RewardCalculation, RewardError> {
        let mut calculation = self.blank_calculation(record);

        // Reserve the contribution id before evaluating, so two concurrent
        // calculate calls for the same record cannot both pass the check.
        {
            let mut index = self.by_contribution.write();
            if index.contains_key(&record.id) {
                return Err(RewardError::DuplicateContribution(record.id));
            }
            index.insert(record.id, calculation.id);
        }

        let result = self.evaluate(record);
        self.settle(&mut calculation, &result);

        self.calculations
            .write()
            .insert(calculation.id, calculation.clone());

        match result {
            Ok(_) => {
                info!(
                    calculation = %calculation.id,
                    user = %calculation.user,
                    amount = %calculation.calculated_amount,
                    "reward calculated"
                );
                Ok(calculation)
            }
            Err(e) => {
                info!(calculation = %calculation.id, reason = %e, "reward calculation failed");
                Err(e)
            }
        }
    }

    /// Calculate each record independently; per-item failures are isolated
    /// into the outcome list.
    pub fn calculate_batch(&self, records: &[ContributionRecord]) -> Vec<BatchOutcome> {
        records
            .iter()
            .map(|record| BatchOutcome {
                contribution_id: record.id,
                result: self.calculate(record),
            })
            .collect()
    }

    /// Re-run the formula for an existing calculation with fresh factors.
    ///
    /// The row is superseded in place (same id, bumped revision). Approval
    /// metadata survives for audit; whether the approval itself survives is
    /// the `preserve_approval_on_recalculate` policy hook.
    pub fn recalculate(
        &self,
        calculation_id: Uuid,
        record: &ContributionRecord,
    ) -> Result<RewardCalculation, RewardError> {
        let existing = self
            .get_calculation(calculation_id)
            .ok_or(RewardError::NotFound(calculation_id))?;
        if existing.status == CalculationStatus::Distributed {
            return Err(RewardError::AlreadyDistributed(calculation_id));
        }
        if existing.contribution_id != record.id {
            return Err(RewardError::InvalidState(
                CalculationOperation::Recalculate,
                calculation_id,
            ));
        }

        let mut updated = self.blank_calculation(record);
        updated.id = existing.id;
        updated.created_at = existing.created_at;
        updated.revision = existing.revision + 1;
        updated.approved_by = existing.approved_by.clone();
        updated.approved_at = existing.approved_at;
        updated.approval_comment = existing.approval_comment.clone();

        let result = self.evaluate(record);
        self.settle(&mut updated, &result);

        let was_approved = existing.approved_at.is_some();
        if updated.status == CalculationStatus::Calculated
            && was_approved
            && self.config.preserve_approval_on_recalculate
        {
            updated.status = CalculationStatus::Approved;
        }

        self.calculations
            .write()
            .insert(updated.id, updated.clone());

        match result {
            Ok(_) => {
                info!(
                    calculation = %updated.id,
                    revision = updated.revision,
                    amount = %updated.calculated_amount,
                    "reward recalculated"
                );
                Ok(updated)
            }
            Err(e) => Err(e),
        }
    }

    /// Approve calculations for distribution. Validates every id before
    /// touching any of them: either all transition or none do.
    pub fn approve(
        &self,
        ids: &[Uuid],
        approver: &str,
        comment: Option<&str>,
    ) -> Result<Vec<RewardCalculation>, RewardError> {
        let mut calculations = self.calculations.write();

        for id in ids {
            let calculation = calculations.get(id).ok_or(RewardError::NotFound(*id))?;
            if calculation.status != CalculationStatus::Calculated {
                return Err(RewardError::InvalidState(CalculationOperation::Approve, *id));
            }
        }

        let now = Utc::now();
        let mut approved = Vec::with_capacity(ids.len());
        for id in ids {
            let calculation = calculations
                .get_mut(id)
                .ok_or(RewardError::NotFound(*id))?;
            calculation.status = CalculationStatus::Approved;
            calculation.approved_by = Some(approver.to_string());
            calculation.approved_at = Some(now);
            calculation.approval_comment = comment.map(str::to_string);
            approved.push(calculation.clone());
        }
        Ok(approved)
    }

    /// Distribute approved calculations: the only reward-path operation that
    /// credits the ledger. Idempotent per calculation — distributing an
    /// already-distributed id reports the prior entry instead of crediting
    /// twice, so at-least-once callers can retry safely.
    pub fn distribute(&self, ids: &[Uuid]) -> Vec<DistributionOutcome> {
        ids.iter()
            .map(|id| DistributionOutcome {
                calculation_id: *id,
                result: self.distribute_one(*id),
            })
            .collect()
    }

    /// Adjust the amount that will be credited on distribution. Bounds still
    /// apply; distributed and failed calculations cannot be adjusted.
    pub fn adjust_final_amount(
        &self,
        calculation_id: Uuid,
        amount: Amount,
    ) -> Result<RewardCalculation, RewardError> {
        if amount < self.config.min_reward || amount > self.config.max_reward {
            return Err(RewardError::RewardOutOfBounds {
                amount,
                min: self.config.min_reward,
                max: self.config.max_reward,
            });
        }

        let mut calculations = self.calculations.write();
        let calculation = calculations
            .get_mut(&calculation_id)
            .ok_or(RewardError::NotFound(calculation_id))?;
        match calculation.status {
            CalculationStatus::Calculated | CalculationStatus::Approved => {
                calculation.final_amount = amount;
                Ok(calculation.clone())
            }
            CalculationStatus::Distributed => {
                Err(RewardError::AlreadyDistributed(calculation_id))
            }
            CalculationStatus::Pending | CalculationStatus::Failed => Err(
                RewardError::InvalidState(CalculationOperation::Adjust, calculation_id),
            ),
        }
    }

    pub fn get_calculation(&self, id: Uuid) -> Option<RewardCalculation> {
        self.calculations.read().get(&id).cloned()
    }

    /// The current (possibly superseded) calculation for a contribution.
    pub fn calculation_for_contribution(&self, contribution_id: Uuid) -> Option<RewardCalculation> {
        let id = *self.by_contribution.read().get(&contribution_id)?;
        self.get_calculation(id)
    }

    /// Record a user's holding snapshot; used on the next calculation.
    pub fn record_holding_snapshot(&self, snapshot: HoldingIncentiveSnapshot) {
        self.holdings.write().insert(snapshot.user, snapshot);
    }

    /// Inspectable holding-factor breakdown for a user at the current price.
    pub fn holding_breakdown(&self, user: UserId) -> Option<HoldingFactorBreakdown> {
        let holdings = self.holdings.read();
        let snapshot = holdings.get(&user)?;
        Some(self.holding.compute(snapshot, self.market.latest_price()))
    }

    pub fn market(&self) -> &MarketFactorProvider {
        &self.market
    }

    pub fn base_factors(&self) -> &BaseFactorProvider {
        &self.base
    }
}

/// Private API
impl RewardEngine {
    /// New calculation row in `Pending`, before the formula has run.
    fn blank_calculation(&self, record: &ContributionRecord) -> RewardCalculation {
        RewardCalculation {
            id: Uuid::new_v4(),
            contribution_id: record.id,
            user: record.user,
            scope: record.scope,
            base_factor: Decimal::ZERO,
            score: record.score,
            market_factor: Decimal::ZERO,
            holding_factor: Decimal::ZERO,
            calculated_amount: Amount::zero(),
            final_amount: Amount::zero(),
            status: CalculationStatus::Pending,
            market_price_at_calculation: Decimal::ZERO,
            approved_by: None,
            approved_at: None,
            approval_comment: None,
            distribution_entry: None,
            failure: None,
            revision: 0,
            created_at: Utc::now(),
        }
    }

    /// Fetch the three factors and evaluate the formula, without touching
    /// the calculation store.
    fn evaluate(&self, record: &ContributionRecord) -> Result<FormulaOutput, RewardError> {
        let base_factor = self
            .base
            .current_factor(record.contribution_type)
            .unwrap_or(Decimal::ZERO);
        let market_factor = self.market.current_factor();
        let market_price = self.market.latest_price();
        let holding_factor = match self.holdings.read().get(&record.user) {
            Some(snapshot) => self.holding.compute(snapshot, market_price).clamped,
            // No holding data yet: treated as "just acquired", neutral factor.
            None => Decimal::ONE,
        };

        for (name, value) in [
            ("base", base_factor),
            ("market", market_factor),
            ("holding", holding_factor),
        ] {
            if value <= Decimal::ZERO {
                return Err(RewardError::InvalidFactor { name, value });
            }
        }

        let product = base_factor
            .checked_mul(record.score)
            .and_then(|v| v.checked_mul(market_factor))
            .and_then(|v| v.checked_mul(holding_factor))
            .ok_or(RewardError::Overflow)?;
        let amount = Amount::new(product);

        if amount < self.config.min_reward || amount > self.config.max_reward {
            return Err(RewardError::RewardOutOfBounds {
                amount,
                min: self.config.min_reward,
                max: self.config.max_reward,
            });
        }

        Ok(FormulaOutput {
            base_factor,
            market_factor,
            holding_factor,
            market_price,
            amount,
        })
    }

    /// Write a formula result into a calculation row: `Calculated` with the
    /// numbers on success, `Failed` with the validation message otherwise.
    fn settle(
        &self,
        calculation: &mut RewardCalculation,
        result: &Result<FormulaOutput, RewardError>,
    ) {
        match result {
            Ok(output) => {
                calculation.base_factor = output.base_factor;
                calculation.market_factor = output.market_factor;
                calculation.holding_factor = output.holding_factor;
                calculation.market_price_at_calculation = output.market_price;
                calculation.calculated_amount = output.amount;
                calculation.final_amount = output.amount;
                calculation.status = CalculationStatus::Calculated;
                calculation.failure = None;
            }
            Err(e) => {
                calculation.status = CalculationStatus::Failed;
                calculation.failure = Some(e.to_string());
            }
        }
    }

    fn distribute_one(&self, id: Uuid) -> Result<Distribution, RewardError> {
        // The store lock is held across the credit so that concurrent
        // distribute calls for the same id cannot both pass the status check.
        let mut calculations = self.calculations.write();
        let calculation = calculations.get_mut(&id).ok_or(RewardError::NotFound(id))?;

        match calculation.status {
            CalculationStatus::Distributed => {
                return match calculation.distribution_entry {
                    Some(entry) => Ok(Distribution::AlreadyDistributed(entry)),
                    None => Err(RewardError::InvalidState(
                        CalculationOperation::Distribute,
                        id,
                    )),
                };
            }
            CalculationStatus::Approved => {}
            CalculationStatus::Calculated if !self.config.require_approval => {}
            CalculationStatus::Calculated => {
                return Err(RewardError::CalculationNotApproved(id));
            }
            CalculationStatus::Pending | CalculationStatus::Failed => {
                return Err(RewardError::InvalidState(CalculationOperation::Distribute, id));
            }
        }

        let entry = self.ledger.credit(
            calculation.user,
            calculation.scope,
            calculation.final_amount,
            TransactionType::Earn,
            "contribution reward",
            Some(calculation.id),
        )?;

        calculation.status = CalculationStatus::Distributed;
        calculation.distribution_entry = Some(entry.id);

        info!(
            calculation = %id,
            user = %calculation.user,
            amount = %calculation.final_amount,
            "reward distributed"
        );
        self.events.emit(EngineEvent::RewardDistributed {
            calculation_id: id,
            user: calculation.user,
            scope: calculation.scope,
            amount: calculation.final_amount,
            entry: entry.id,
            distributed_at: Utc::now(),
        });

        Ok(Distribution::Credited(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContributionType;
    use rust_decimal_macros::dec;

    // test utils

    fn engine() -> RewardEngine {
        RewardEngine::new(
            EngineConfig::default(),
            Arc::new(Ledger::new()),
            EventBus::default(),
        )
    }

    fn contribution(score: Decimal) -> ContributionRecord {
        ContributionRecord::new(1, 1, ContributionType::Development, score)
    }

    #[test]
    fn calculate_multiplies_all_factors() {
        let engine = engine();
        // base 1.4 × score 2 × market 1.0 × holding 1.0 = 2.8
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();

        assert_eq!(calculation.base_factor, dec!(1.4));
        assert_eq!(calculation.market_factor, dec!(1.0));
        assert_eq!(calculation.holding_factor, dec!(1.0));
        assert_eq!(calculation.calculated_amount, Amount::new(dec!(2.8)));
        assert_eq!(calculation.calculated_amount.to_string(), "2.80000000");
        assert_eq!(calculation.status, CalculationStatus::Calculated);
    }

    #[test]
    fn calculate_uses_market_and_holding_factors() {
        let engine = engine();
        engine.market().update_price(dec!(0.4), "feed", None, None); // factor 1.5
        engine.record_holding_snapshot(HoldingIncentiveSnapshot {
            user: 1,
            holding_days: 100,
            avg_holding_price: dec!(0.4),
            staking_months: 6,
            payment_usage_count: 1,
            taken_at: Utc::now(),
        });

        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();
        assert_eq!(calculation.market_factor, dec!(1.5));
        assert_eq!(calculation.market_price_at_calculation, dec!(0.4));
        // 1 + 0.2 + 0.05·(0.4/0.4) + 0.1 + 0.05 = 1.4
        assert_eq!(calculation.holding_factor, dec!(1.4));
        // 1.4 × 2 × 1.5 × 1.4 = 5.88
        assert_eq!(calculation.calculated_amount, Amount::new(dec!(5.88)));
    }

    #[test]
    fn calculate_truncates_to_scale() {
        let engine = engine();
        // 1.4 × 0.33333333 = 0.466666662, truncated to 0.46666666
        let calculation = engine.calculate(&contribution(dec!(0.33333333))).unwrap();
        assert_eq!(calculation.calculated_amount, Amount::new(dec!(0.46666666)));
    }

    #[test]
    fn duplicate_contribution_fails() {
        let engine = engine();
        let record = contribution(dec!(2));
        engine.calculate(&record).unwrap();

        let result = engine.calculate(&record);
        assert!(matches!(result, Err(RewardError::DuplicateContribution(id)) if id == record.id));
    }

    #[test]
    fn out_of_bounds_reward_fails_and_persists_failed_row() {
        let engine = engine();
        let record = contribution(dec!(100_000)); // 1.4 × 100000 = 140000 > max 10000

        let result = engine.calculate(&record);
        assert!(matches!(result, Err(RewardError::RewardOutOfBounds { .. })));

        let stored = engine.calculation_for_contribution(record.id).unwrap();
        assert_eq!(stored.status, CalculationStatus::Failed);
        assert!(stored.failure.as_deref().unwrap().contains("bounds"));
    }

    #[test]
    fn zero_score_fails_below_minimum() {
        let engine = engine();
        let result = engine.calculate(&contribution(dec!(0)));
        assert!(matches!(result, Err(RewardError::RewardOutOfBounds { .. })));
    }

    #[test]
    fn non_positive_factor_fails_calculation() {
        let engine = engine();
        engine
            .base_factors()
            .replace(ContributionType::Development, dec!(0), Utc::now() - chrono::Duration::hours(1));

        let result = engine.calculate(&contribution(dec!(2)));
        assert!(matches!(
            result,
            Err(RewardError::InvalidFactor { name: "base", .. })
        ));
    }

    #[test]
    fn batch_isolates_failures() {
        let engine = engine();
        let good = contribution(dec!(2));
        let bad = contribution(dec!(0));
        let also_good = contribution(dec!(3));

        let outcomes = engine.calculate_batch(&[good, bad, also_good]);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert!(outcomes[2].result.is_ok());
    }

    #[test]
    fn approve_requires_calculated_status() {
        let engine = engine();
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();

        let approved = engine
            .approve(&[calculation.id], "ops", Some("weekly run"))
            .unwrap();
        assert_eq!(approved[0].status, CalculationStatus::Approved);
        assert_eq!(approved[0].approved_by.as_deref(), Some("ops"));

        // Approving again fails: no longer in Calculated
        let result = engine.approve(&[calculation.id], "ops", None);
        assert!(matches!(
            result,
            Err(RewardError::InvalidState(CalculationOperation::Approve, _))
        ));
    }

    #[test]
    fn approve_is_all_or_nothing() {
        let engine = engine();
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();
        let missing = Uuid::new_v4();

        let result = engine.approve(&[calculation.id, missing], "ops", None);
        assert!(matches!(result, Err(RewardError::NotFound(id)) if id == missing));

        // The valid one was not touched
        let stored = engine.get_calculation(calculation.id).unwrap();
        assert_eq!(stored.status, CalculationStatus::Calculated);
    }

    #[test]
    fn distribute_credits_ledger_once() {
        let ledger = Arc::new(Ledger::new());
        let engine = RewardEngine::new(EngineConfig::default(), ledger.clone(), EventBus::default());
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();
        engine.approve(&[calculation.id], "ops", None).unwrap();

        let outcomes = engine.distribute(&[calculation.id]);
        assert!(matches!(outcomes[0].result, Ok(Distribution::Credited(_))));

        let balance = ledger.get_balance(1, 1).unwrap();
        assert_eq!(balance.current, Amount::new(dec!(2.8)));
        assert_eq!(ledger.entry_count(1, 1), 1);
    }

    #[test]
    fn distribute_twice_is_idempotent() {
        let ledger = Arc::new(Ledger::new());
        let engine = RewardEngine::new(EngineConfig::default(), ledger.clone(), EventBus::default());
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();
        engine.approve(&[calculation.id], "ops", None).unwrap();

        engine.distribute(&[calculation.id]);
        let outcomes = engine.distribute(&[calculation.id]);
        assert!(matches!(
            outcomes[0].result,
            Ok(Distribution::AlreadyDistributed(_))
        ));

        // Exactly one credit exists
        assert_eq!(ledger.entry_count(1, 1), 1);
        assert_eq!(ledger.get_balance(1, 1).unwrap().current, Amount::new(dec!(2.8)));
    }

    #[test]
    fn distribute_before_approve_fails_when_approval_required() {
        let engine = engine();
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();

        let outcomes = engine.distribute(&[calculation.id]);
        assert!(matches!(
            outcomes[0].result,
            Err(RewardError::CalculationNotApproved(_))
        ));
    }

    #[test]
    fn distribute_without_approval_policy_skips_gate() {
        let config = EngineConfig {
            require_approval: false,
            ..EngineConfig::default()
        };
        let ledger = Arc::new(Ledger::new());
        let engine = RewardEngine::new(config, ledger.clone(), EventBus::default());
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();

        let outcomes = engine.distribute(&[calculation.id]);
        assert!(matches!(outcomes[0].result, Ok(Distribution::Credited(_))));
    }

    #[test]
    fn distribute_emits_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let engine = RewardEngine::new(EngineConfig::default(), Arc::new(Ledger::new()), bus);
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();
        engine.approve(&[calculation.id], "ops", None).unwrap();
        engine.distribute(&[calculation.id]);

        let event = rx.try_recv().unwrap();
        assert!(matches!(event, EngineEvent::RewardDistributed { user: 1, .. }));
    }

    #[test]
    fn recalculate_supersedes_in_place() {
        let engine = engine();
        let record = contribution(dec!(2));
        let calculation = engine.calculate(&record).unwrap();

        engine.market().update_price(dec!(0.4), "feed", None, None); // factor now 1.5
        let updated = engine.recalculate(calculation.id, &record).unwrap();

        assert_eq!(updated.id, calculation.id);
        assert_eq!(updated.revision, 1);
        assert_eq!(updated.calculated_amount, Amount::new(dec!(4.2))); // 1.4 × 2 × 1.5
        assert_eq!(updated.status, CalculationStatus::Calculated);

        // Only one row for this contribution
        let stored = engine.calculation_for_contribution(record.id).unwrap();
        assert_eq!(stored.revision, 1);
    }

    #[test]
    fn recalculate_resets_approval_by_default() {
        let engine = engine();
        let record = contribution(dec!(2));
        let calculation = engine.calculate(&record).unwrap();
        engine.approve(&[calculation.id], "ops", None).unwrap();

        let updated = engine.recalculate(calculation.id, &record).unwrap();
        assert_eq!(updated.status, CalculationStatus::Calculated);
        // Audit trail survives even though the approval gate reset
        assert_eq!(updated.approved_by.as_deref(), Some("ops"));
    }

    #[test]
    fn recalculate_can_preserve_approval_via_policy() {
        let config = EngineConfig {
            preserve_approval_on_recalculate: true,
            ..EngineConfig::default()
        };
        let engine = RewardEngine::new(config, Arc::new(Ledger::new()), EventBus::default());
        let record = contribution(dec!(2));
        let calculation = engine.calculate(&record).unwrap();
        engine.approve(&[calculation.id], "ops", None).unwrap();

        let updated = engine.recalculate(calculation.id, &record).unwrap();
        assert_eq!(updated.status, CalculationStatus::Approved);
    }

    #[test]
    fn recalculate_after_distribution_fails() {
        let engine = engine();
        let record = contribution(dec!(2));
        let calculation = engine.calculate(&record).unwrap();
        engine.approve(&[calculation.id], "ops", None).unwrap();
        engine.distribute(&[calculation.id]);

        let result = engine.recalculate(calculation.id, &record);
        assert!(matches!(result, Err(RewardError::AlreadyDistributed(_))));
    }

    #[test]
    fn recalculate_revives_failed_calculation() {
        let engine = engine();
        let record = contribution(dec!(100_000));
        let _ = engine.calculate(&record); // fails out of bounds

        let failed = engine.calculation_for_contribution(record.id).unwrap();
        let smaller = ContributionRecord { score: dec!(2), ..record.clone() };
        let updated = engine.recalculate(failed.id, &smaller).unwrap();

        assert_eq!(updated.status, CalculationStatus::Calculated);
        assert_eq!(updated.calculated_amount, Amount::new(dec!(2.8)));
        assert!(updated.failure.is_none());
    }

    #[test]
    fn adjust_final_amount_within_bounds() {
        let engine = engine();
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();

        let updated = engine
            .adjust_final_amount(calculation.id, Amount::new(dec!(2.5)))
            .unwrap();
        assert_eq!(updated.final_amount, Amount::new(dec!(2.5)));
        assert_eq!(updated.calculated_amount, Amount::new(dec!(2.8)));

        let result = engine.adjust_final_amount(calculation.id, Amount::new(dec!(999_999)));
        assert!(matches!(result, Err(RewardError::RewardOutOfBounds { .. })));
    }

    #[test]
    fn distributed_amount_is_final_amount() {
        let ledger = Arc::new(Ledger::new());
        let engine = RewardEngine::new(EngineConfig::default(), ledger.clone(), EventBus::default());
        let calculation = engine.calculate(&contribution(dec!(2))).unwrap();
        engine
            .adjust_final_amount(calculation.id, Amount::new(dec!(2.5)))
            .unwrap();
        engine.approve(&[calculation.id], "ops", None).unwrap();
        engine.distribute(&[calculation.id]);

        assert_eq!(ledger.get_balance(1, 1).unwrap().current, Amount::new(dec!(2.5)));
    }
}
