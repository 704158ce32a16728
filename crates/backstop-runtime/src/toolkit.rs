//! Composition of the recovery components for one workflow run.
//!
//! The toolkit owns one instance of each component. Hosts that run many
//! workflows call [`RecoveryToolkit::begin_run`] between them so no state
//! leaks from one run into the next.

use std::fmt;
use std::future::Future;

use backstop_core::PhaseCheckpoint;

use crate::cache::NegativeCache;
use crate::checkpoint::CheckpointManager;
use crate::config::{ConfigError, RecoveryConfig};
use crate::resilience::{self, CircuitBreaker, ContextBudgetTracker, FallbackOutcome};

/// Recovery components owned by an orchestrator.
///
/// # Composition
/// - Consult the negative cache before searching
/// - Wrap remote calls in the circuit breaker
/// - Charge the budget tracker for work performed
/// - Save a checkpoint when the budget runs low
/// - Ask the escalation policy when failures repeat
pub struct RecoveryToolkit {
    config: RecoveryConfig,
    negative_cache: NegativeCache,
    circuit_breaker: CircuitBreaker,
    budget: ContextBudgetTracker,
    checkpoints: CheckpointManager,
}

impl RecoveryToolkit {
    /// Build every component from a validated config.
    pub fn new(config: RecoveryConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            negative_cache: NegativeCache::from_config(&config.negative_cache),
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            budget: ContextBudgetTracker::with_config(config.budget.clone()),
            checkpoints: CheckpointManager::from_config(&config.checkpoints),
            config,
        })
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn negative_cache(&self) -> &NegativeCache {
        &self.negative_cache
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn budget(&self) -> &ContextBudgetTracker {
        &self.budget
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Forget all state from the previous run.
    pub fn begin_run(&self) {
        self.negative_cache.clear();
        self.circuit_breaker.reset_all();
        self.budget.reset();
        self.checkpoints.clear_all();
        tracing::info!("Recovery state reset for new workflow run");
    }

    /// Save `checkpoint` if the budget has crossed the checkpoint threshold.
    ///
    /// The saved checkpoint records the run's total usage. Returns whether
    /// it was saved.
    pub fn checkpoint_if_low(&self, checkpoint: PhaseCheckpoint) -> bool {
        if !self.budget.should_checkpoint() {
            return false;
        }
        let used = self.budget.used();
        tracing::info!(
            issue = %checkpoint.issue_key,
            phase = %checkpoint.phase,
            remaining = self.budget.remaining(),
            "Budget low, saving checkpoint"
        );
        self.checkpoints.save(checkpoint.with_context_used(used));
        true
    }

    /// [`with_fallback`](resilience::with_fallback) using the configured timeout.
    pub async fn with_fallback<T, PE, FE, P, PFut, F, FFut>(
        &self,
        primary: P,
        fallback: F,
    ) -> Result<FallbackOutcome<T>, FE>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, PE>>,
        PE: fmt::Display,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, FE>>,
    {
        resilience::with_fallback(primary, fallback, self.config.fallback_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::BudgetConfig;
    use backstop_core::Phase;
    use std::collections::BTreeMap;

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = RecoveryConfig::default();
        config.budget.checkpoint_ratio = 1.5;
        assert!(RecoveryToolkit::new(config).is_err());
    }

    #[test]
    fn test_checkpoint_only_when_low() {
        let config = RecoveryConfig {
            budget: BudgetConfig {
                total_budget: 1_000,
                phase_budgets: BTreeMap::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        let toolkit = RecoveryToolkit::new(config).unwrap();

        assert!(toolkit.budget().consume(Phase::Code, 500));
        assert!(!toolkit.checkpoint_if_low(PhaseCheckpoint::new("PROJ-3", Phase::Code)));
        assert!(toolkit.checkpoints().is_empty());

        assert!(toolkit.budget().consume(Phase::Code, 300));
        assert!(toolkit.checkpoint_if_low(PhaseCheckpoint::new("PROJ-3", Phase::Code)));
        assert_eq!(
            toolkit.checkpoints().get("PROJ-3", Phase::Code).unwrap().context_used,
            800
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_run_clears_state() {
        let toolkit = RecoveryToolkit::new(RecoveryConfig::default()).unwrap();

        toolkit.negative_cache().set("grep TODO", "no results").await;
        assert!(toolkit.budget().consume(Phase::Explore, 100));
        toolkit
            .checkpoints()
            .save(PhaseCheckpoint::new("PROJ-4", Phase::Explore));
        let _ = toolkit
            .circuit_breaker()
            .execute("confluence", || async { Err::<(), _>("down") })
            .await;
        assert!(toolkit.circuit_breaker().is_open("confluence"));

        toolkit.begin_run();

        assert!(!toolkit.negative_cache().contains("grep TODO").await);
        assert_eq!(toolkit.budget().used(), 0);
        assert!(toolkit.checkpoints().is_empty());
        assert!(!toolkit.circuit_breaker().is_open("confluence"));
    }
}
