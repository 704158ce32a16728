//! # backstop-runtime
//!
//! In-process failure recovery for multi-phase work orchestrators.
//!
//! This crate decides *when to stop trying*. It provides:
//! - A negative cache of recently failed queries
//! - Per-dependency circuit breaking with retry budgets
//! - Per-phase context budget accounting
//! - Phase checkpoints for resumption
//! - Timeout and fallback wrappers
//!
//! The escalation policy and fallback catalog live in `backstop-core` and
//! are re-exported here.
//!
//! ## Example
//!
//! ```rust,ignore
//! use backstop_runtime::{RecoveryConfig, RecoveryToolkit, FallbackScenario};
//!
//! let toolkit = RecoveryToolkit::new(RecoveryConfig::default())?;
//!
//! match toolkit.circuit_breaker().execute("jiraApi", || fetch_issue("PROJ-1")).await {
//!     Ok(issue) => plan(issue),
//!     Err(err) if err.is_unavailable() => {
//!         let plan = FallbackScenario::JiraUnavailable.plan();
//!         degrade(plan.steps)
//!     }
//!     Err(err) => return Err(err.into()),
//! }
//! ```

pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod resilience;
pub mod toolkit;

pub use cache::{NegativeCache, NegativeCacheEntry};
pub use checkpoint::CheckpointManager;
pub use config::{CheckpointConfig, ConfigError, NegativeCacheConfig, RecoveryConfig};
pub use resilience::{
    with_fallback, with_timeout, BreakerError, BudgetConfig, BudgetReport, CircuitBreaker,
    CircuitBreakerConfig, CircuitState, ContextBudgetTracker, FallbackOutcome, RetryBudget,
    ServiceBudget, TimeoutError, DEFAULT_FALLBACK_TIMEOUT,
};
pub use toolkit::RecoveryToolkit;

pub use backstop_core::{
    determine_escalation, EscalationAction, EscalationLevel, EscalationResult, FallbackPlan,
    FallbackScenario, Phase, PhaseArtifacts, PhaseCheckpoint,
};
