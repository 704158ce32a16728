//! Resilience patterns for backstop-runtime.
//!
//! This module provides:
//! - Per-service circuit breaking with retry budgets and backoff
//! - Context budget accounting per phase
//! - Timeout and fallback wrappers

mod budget;
mod circuit_breaker;
mod fallback;

pub use budget::{BudgetConfig, BudgetReport, ContextBudgetTracker};
pub use circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryBudget, ServiceBudget,
};
pub use fallback::{
    with_fallback, with_timeout, FallbackOutcome, TimeoutError, DEFAULT_FALLBACK_TIMEOUT,
};
