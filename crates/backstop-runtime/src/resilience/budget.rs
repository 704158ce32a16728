//! Context budget accounting per workflow phase.
//!
//! Phase sub-budgets are hard caps: a charge that would overflow one is
//! rejected without touching the ledger. The global budget is only
//! observed through `remaining()` and the advisory thresholds.

use backstop_core::Phase;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Budget limits for one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Units available to the whole run
    pub total_budget: u64,

    /// Caps for individual phases; absent phases are uncapped
    pub phase_budgets: BTreeMap<Phase, u64>,

    /// Remaining fraction below which a checkpoint is advised
    pub checkpoint_ratio: f64,

    /// Remaining fraction below which context compression is advised
    pub compress_ratio: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        let phase_budgets = [
            (Phase::Explore, 5_000),
            (Phase::Plan, 3_000),
            (Phase::Code, 15_000),
            (Phase::Test, 5_000),
            (Phase::Quality, 3_000),
            (Phase::Fix, 8_000),
            (Phase::Commit, 2_000),
        ]
        .into_iter()
        .collect();

        Self {
            total_budget: 100_000,
            phase_budgets,
            checkpoint_ratio: 0.25,
            compress_ratio: 0.10,
        }
    }
}

/// Point-in-time summary of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub total_budget: u64,
    pub used: u64,
    pub remaining: u64,
    pub phase_usage: BTreeMap<Phase, u64>,
    pub should_checkpoint: bool,
    pub should_compress: bool,
}

/// Ledger of budget consumed per phase.
pub struct ContextBudgetTracker {
    config: BudgetConfig,
    usage: RwLock<HashMap<Phase, u64>>,
}

impl ContextBudgetTracker {
    /// Create a tracker with the default phase caps and the given total.
    pub fn new(total_budget: u64) -> Self {
        Self::with_config(BudgetConfig {
            total_budget,
            ..Default::default()
        })
    }

    /// Create a tracker from explicit limits.
    pub fn with_config(config: BudgetConfig) -> Self {
        Self {
            config,
            usage: RwLock::new(HashMap::new()),
        }
    }

    /// Charge `amount` units to a phase.
    ///
    /// Returns false, leaving the ledger untouched, when the phase cap
    /// would be exceeded.
    pub fn consume(&self, phase: Phase, amount: u64) -> bool {
        let mut usage = self.usage.write();
        let current = usage.get(&phase).copied().unwrap_or(0);
        let next = current.saturating_add(amount);

        if let Some(limit) = self.phase_limit(phase) {
            if next > limit {
                tracing::warn!(
                    phase = %phase,
                    requested = amount,
                    used = current,
                    limit,
                    "Phase budget exceeded, charge rejected"
                );
                return false;
            }
        }

        usage.insert(phase, next);
        true
    }

    /// Total units consumed across all phases, saturating at `u64::MAX`.
    pub fn used(&self) -> u64 {
        self.usage
            .read()
            .values()
            .fold(0u64, |total, used| total.saturating_add(*used))
    }

    /// Units left in the global budget, floored at zero.
    pub fn remaining(&self) -> u64 {
        self.config.total_budget.saturating_sub(self.used())
    }

    /// Units consumed by one phase.
    pub fn phase_usage(&self, phase: Phase) -> u64 {
        self.usage.read().get(&phase).copied().unwrap_or(0)
    }

    /// The cap for a phase, if it has one.
    pub fn phase_limit(&self, phase: Phase) -> Option<u64> {
        self.config.phase_budgets.get(&phase).copied()
    }

    /// Units left under a phase cap, or `None` when uncapped.
    pub fn phase_remaining(&self, phase: Phase) -> Option<u64> {
        self.phase_limit(phase)
            .map(|limit| limit.saturating_sub(self.phase_usage(phase)))
    }

    pub fn total_budget(&self) -> u64 {
        self.config.total_budget
    }

    /// Whether remaining budget has fallen below the checkpoint threshold.
    pub fn should_checkpoint(&self) -> bool {
        self.below(self.config.checkpoint_ratio)
    }

    /// Whether remaining budget has fallen below the compression threshold.
    pub fn should_compress(&self) -> bool {
        self.below(self.config.compress_ratio)
    }

    /// Summarize the ledger.
    pub fn report(&self) -> BudgetReport {
        let phase_usage = self
            .usage
            .read()
            .iter()
            .map(|(phase, used)| (*phase, *used))
            .collect();

        BudgetReport {
            total_budget: self.config.total_budget,
            used: self.used(),
            remaining: self.remaining(),
            phase_usage,
            should_checkpoint: self.should_checkpoint(),
            should_compress: self.should_compress(),
        }
    }

    /// Clear all usage for a new run.
    pub fn reset(&self) {
        self.usage.write().clear();
    }

    fn below(&self, ratio: f64) -> bool {
        (self.remaining() as f64) < ratio * self.config.total_budget as f64
    }
}

impl Default for ContextBudgetTracker {
    fn default() -> Self {
        Self::with_config(BudgetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uncapped(total: u64) -> ContextBudgetTracker {
        ContextBudgetTracker::with_config(BudgetConfig {
            total_budget: total,
            phase_budgets: BTreeMap::new(),
            ..Default::default()
        })
    }

    #[test]
    fn test_consume_within_phase_cap() {
        let tracker = ContextBudgetTracker::default();

        assert!(tracker.consume(Phase::Plan, 1_000));
        assert!(tracker.consume(Phase::Plan, 2_000));
        assert_eq!(tracker.phase_usage(Phase::Plan), 3_000);
        assert_eq!(tracker.phase_remaining(Phase::Plan), Some(0));
        assert_eq!(tracker.remaining(), 97_000);
    }

    #[test]
    fn test_rejection_does_not_mutate() {
        let tracker = ContextBudgetTracker::default();

        assert!(tracker.consume(Phase::Commit, 1_500));
        assert!(!tracker.consume(Phase::Commit, 501));
        assert_eq!(tracker.phase_usage(Phase::Commit), 1_500);
        assert_eq!(tracker.used(), 1_500);
    }

    #[test]
    fn test_uncapped_phase_always_accepts() {
        let tracker = ContextBudgetTracker::with_config(BudgetConfig {
            phase_budgets: [(Phase::Code, 10)].into_iter().collect(),
            ..Default::default()
        });

        assert!(tracker.consume(Phase::Explore, 90_000));
        assert_eq!(tracker.phase_limit(Phase::Explore), None);
        assert_eq!(tracker.phase_remaining(Phase::Explore), None);
        assert!(!tracker.consume(Phase::Code, 11));
    }

    #[test]
    fn test_global_budget_not_enforced_per_call() {
        let tracker = uncapped(1_000);

        assert!(tracker.consume(Phase::Code, 800));
        assert!(tracker.consume(Phase::Test, 800));
        assert_eq!(tracker.used(), 1_600);
        assert_eq!(tracker.remaining(), 0);
    }

    #[test]
    fn test_thresholds() {
        let tracker = uncapped(1_000);

        assert!(tracker.consume(Phase::Code, 750));
        // Remaining 250 is not below 25%
        assert!(!tracker.should_checkpoint());

        assert!(tracker.consume(Phase::Code, 1));
        assert!(tracker.should_checkpoint());
        assert!(!tracker.should_compress());

        assert!(tracker.consume(Phase::Test, 150));
        assert!(tracker.should_compress());

        let report = tracker.report();
        assert_eq!(report.used, 901);
        assert_eq!(report.remaining, 99);
        assert_eq!(report.phase_usage.get(&Phase::Code), Some(&751));
        assert!(report.should_checkpoint && report.should_compress);
    }

    #[test]
    fn test_reset_clears_usage() {
        let tracker = ContextBudgetTracker::new(50_000);
        assert!(tracker.consume(Phase::Fix, 4_000));

        tracker.reset();
        assert_eq!(tracker.used(), 0);
        assert_eq!(tracker.remaining(), 50_000);
        assert_eq!(tracker.total_budget(), 50_000);
    }

    #[test]
    fn test_uncapped_usage_saturates_instead_of_overflowing() {
        let tracker = uncapped(1_000);

        assert!(tracker.consume(Phase::Code, u64::MAX));
        assert!(tracker.consume(Phase::Test, 1));
        assert_eq!(tracker.used(), u64::MAX);
        assert_eq!(tracker.remaining(), 0);
        assert!(tracker.should_checkpoint());
        assert_eq!(tracker.report().used, u64::MAX);
    }

    proptest! {
        #[test]
        fn prop_rejected_charge_leaves_ledger(charges in proptest::collection::vec(0u64..4_000, 1..20)) {
            let tracker = ContextBudgetTracker::default();
            for amount in charges {
                let before = tracker.phase_usage(Phase::Plan);
                if !tracker.consume(Phase::Plan, amount) {
                    prop_assert_eq!(tracker.phase_usage(Phase::Plan), before);
                }
                prop_assert!(tracker.phase_usage(Phase::Plan) <= 3_000);
            }
        }
    }
}
