//! Per-dependency circuit breaker with retry budgets.
//!
//! Each named service owns a retry budget and a backoff schedule. When
//! every attempt inside one `execute` call fails, the circuit opens and
//! later calls fail fast until the cooldown has elapsed since the last
//! failure. Services without a registered budget run unprotected.

use backon::Retryable;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::{humantime_duration, humantime_durations};

/// Retry allowance for one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBudget {
    /// Attempts made per `execute` call before the circuit opens.
    /// Zero is treated as one attempt.
    pub max_retries: u32,

    /// Waits between successive attempts
    #[serde(with = "humantime_durations", default)]
    pub backoff: Vec<Duration>,
}

impl ServiceBudget {
    pub fn new(max_retries: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_retries: max_retries.max(1),
            backoff,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Time after the last failure before an open circuit is probed again
    #[serde(with = "humantime_duration")]
    pub cooldown: Duration,

    /// Registered services by name
    pub services: BTreeMap<String, ServiceBudget>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        let ms = Duration::from_millis;
        let services = [
            ("jiraApi", ServiceBudget::new(3, vec![ms(1000), ms(2000), ms(4000)])),
            ("confluence", ServiceBudget::new(2, vec![ms(2000), ms(5000)])),
            ("githubApi", ServiceBudget::new(3, vec![ms(1000), ms(2000), ms(4000)])),
            ("codeSearch", ServiceBudget::new(3, vec![ms(500), ms(1000), ms(2000)])),
        ]
        .into_iter()
        .map(|(name, budget)| (name.to_string(), budget))
        .collect();

        Self {
            cooldown: Duration::from_secs(60),
            services,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,

    /// Failing fast since the given instant
    Open { since: Instant },

    /// Cooldown elapsed; the current call decides close vs. re-open
    HalfOpenProbe,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open { .. } => write!(f, "open"),
            CircuitState::HalfOpenProbe => write!(f, "half_open_probe"),
        }
    }
}

/// Mutable retry state for one service.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    pub max_retries: u32,

    /// Failures since the last success
    pub current_retries: u32,

    pub backoff_schedule: Vec<Duration>,

    pub state: CircuitState,

    pub last_failure: Option<Instant>,
}

impl RetryBudget {
    fn from_config(budget: &ServiceBudget) -> Self {
        Self {
            max_retries: budget.max_retries.max(1),
            current_retries: 0,
            backoff_schedule: budget.backoff.clone(),
            state: CircuitState::Closed,
            last_failure: None,
        }
    }

    /// Delays between attempts for one `execute` call.
    ///
    /// A schedule shorter than the attempt count repeats its last entry.
    fn delays(&self) -> Vec<Duration> {
        let waits = self.max_retries as usize - 1;
        (0..waits)
            .map(|i| {
                self.backoff_schedule
                    .get(i)
                    .or_else(|| self.backoff_schedule.last())
                    .copied()
                    .unwrap_or(Duration::ZERO)
            })
            .collect()
    }

    fn record_failure(&mut self) {
        self.current_retries += 1;
        self.last_failure = Some(Instant::now());
    }
}

/// Why a protected call produced no value.
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    #[error("Circuit open for {service}, next attempt allowed in {retry_in:?}")]
    Open { service: String, retry_in: Duration },

    #[error("{service} unavailable after {attempts} attempts: {last_error}")]
    Exhausted {
        service: String,
        attempts: u32,
        last_error: E,
    },

    /// The service has no budget and the pass-through call failed
    #[error("{0}")]
    Unprotected(E),
}

impl<E> BreakerError<E> {
    /// True when the dependency should be treated as unavailable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BreakerError::Open { .. } | BreakerError::Exhausted { .. })
    }

    /// The operation's own error, if one was observed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Exhausted { last_error, .. } => Some(last_error),
            BreakerError::Unprotected(err) => Some(err),
        }
    }
}

/// Circuit breaker keyed by service name.
///
/// Each service has its own lock so independent services never contend.
pub struct CircuitBreaker {
    budgets: RwLock<HashMap<String, Arc<Mutex<RetryBudget>>>>,
    cooldown: Duration,
}

impl CircuitBreaker {
    /// Create a circuit breaker seeded with the configured services.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let budgets = config
            .services
            .iter()
            .map(|(name, budget)| {
                (
                    name.clone(),
                    Arc::new(Mutex::new(RetryBudget::from_config(budget))),
                )
            })
            .collect();

        Self {
            budgets: RwLock::new(budgets),
            cooldown: config.cooldown,
        }
    }

    /// Register or replace a service budget. Replacing closes the circuit.
    pub fn register(&self, service: impl Into<String>, budget: ServiceBudget) {
        self.budgets.write().insert(
            service.into(),
            Arc::new(Mutex::new(RetryBudget::from_config(&budget))),
        );
    }

    /// Run `operation` under the service's retry budget.
    ///
    /// Attempts run strictly in sequence, sleeping the scheduled backoff
    /// between them. The first success resets the failure count. If every
    /// attempt fails the circuit opens and the last error is returned in
    /// [`BreakerError::Exhausted`].
    pub async fn execute<T, E, F, Fut>(
        &self,
        service: &str,
        mut operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let Some(budget) = self.budget_handle(service) else {
            return operation().await.map_err(BreakerError::Unprotected);
        };

        let delays = {
            let mut guard = budget.lock();
            if let CircuitState::Open { since } = guard.state {
                let last = guard.last_failure.unwrap_or(since);
                let elapsed = Instant::now().saturating_duration_since(last);
                if elapsed < self.cooldown {
                    tracing::debug!(service = %service, "Circuit open, failing fast");
                    return Err(BreakerError::Open {
                        service: service.to_string(),
                        retry_in: self.cooldown - elapsed,
                    });
                }
                guard.state = CircuitState::HalfOpenProbe;
                tracing::info!(service = %service, "Cooldown elapsed, probing half-open circuit");
            }
            guard.delays()
        };

        let shared: &Mutex<RetryBudget> = &budget;
        let mut attempts = 0u32;
        let result = (|| {
            attempts += 1;
            let attempt = operation();
            async move {
                let outcome = attempt.await;
                if outcome.is_err() {
                    shared.lock().record_failure();
                }
                outcome
            }
        })
        .retry(delays.into_iter())
        .sleep(tokio::time::sleep)
        .notify(|err: &E, delay: Duration| {
            tracing::debug!(
                service = %service,
                error = %err,
                delay = ?delay,
                "Attempt failed, backing off"
            );
        })
        .await;

        let mut guard = budget.lock();
        match result {
            Ok(value) => {
                if guard.state == CircuitState::HalfOpenProbe {
                    tracing::info!(service = %service, "Circuit closed after successful probe");
                }
                guard.current_retries = 0;
                guard.state = CircuitState::Closed;
                Ok(value)
            }
            Err(last_error) => {
                let since = guard.last_failure.unwrap_or_else(Instant::now);
                let reopened = guard.state == CircuitState::HalfOpenProbe;
                guard.state = CircuitState::Open { since };
                if reopened {
                    tracing::warn!(service = %service, "Circuit reopened after failed probe");
                } else {
                    tracing::warn!(
                        service = %service,
                        attempts,
                        "Circuit opened after repeated failures"
                    );
                }
                Err(BreakerError::Exhausted {
                    service: service.to_string(),
                    attempts,
                    last_error,
                })
            }
        }
    }

    /// Whether the circuit is currently marked open.
    ///
    /// This does not look at the clock: an open circuit whose cooldown has
    /// elapsed stays open until the next `execute` probes it.
    pub fn is_open(&self, service: &str) -> bool {
        self.budget_handle(service)
            .map(|b| matches!(b.lock().state, CircuitState::Open { .. }))
            .unwrap_or(false)
    }

    /// Current state, or `None` for an unregistered service.
    pub fn state(&self, service: &str) -> Option<CircuitState> {
        self.budget_handle(service).map(|b| b.lock().state)
    }

    /// Snapshot of a service's retry budget.
    pub fn budget(&self, service: &str) -> Option<RetryBudget> {
        self.budget_handle(service).map(|b| b.lock().clone())
    }

    /// Close one circuit and clear its failure history.
    pub fn reset(&self, service: &str) {
        if let Some(budget) = self.budget_handle(service) {
            let mut guard = budget.lock();
            guard.current_retries = 0;
            guard.last_failure = None;
            guard.state = CircuitState::Closed;
        }
    }

    /// Close every circuit.
    pub fn reset_all(&self) {
        for budget in self.budgets.read().values() {
            let mut guard = budget.lock();
            guard.current_retries = 0;
            guard.last_failure = None;
            guard.state = CircuitState::Closed;
        }
    }

    fn budget_handle(&self, service: &str) -> Option<Arc<Mutex<RetryBudget>>> {
        self.budgets.read().get(service).cloned()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
