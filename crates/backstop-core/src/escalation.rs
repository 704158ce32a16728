//! Escalation policy for repeated failures.
//!
//! A pure decision table: the same inputs always produce the same
//! result. Callers own the retry counter and feed it back on every call.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Graduated response to repeated failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationLevel {
    /// Retry the same approach
    SelfRecovery,

    /// Switch to an alternative approach
    StrategyPivot,

    /// Continue without the failed piece
    GracefulDegradation,

    /// Stop and ask a human
    HumanEscalation,
}

impl EscalationLevel {
    /// Numeric level, 1 (least severe) to 4.
    pub fn number(&self) -> u8 {
        match self {
            EscalationLevel::SelfRecovery => 1,
            EscalationLevel::StrategyPivot => 2,
            EscalationLevel::GracefulDegradation => 3,
            EscalationLevel::HumanEscalation => 4,
        }
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationLevel::SelfRecovery => write!(f, "SELF_RECOVERY"),
            EscalationLevel::StrategyPivot => write!(f, "STRATEGY_PIVOT"),
            EscalationLevel::GracefulDegradation => write!(f, "GRACEFUL_DEGRADATION"),
            EscalationLevel::HumanEscalation => write!(f, "HUMAN_ESCALATION"),
        }
    }
}

/// What the orchestrator should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    Retry,
    Pivot,
    Proceed,
    Pause,
}

impl EscalationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationAction::Retry => "retry",
            EscalationAction::Pivot => "pivot",
            EscalationAction::Proceed => "proceed",
            EscalationAction::Pause => "pause",
        }
    }
}

impl fmt::Display for EscalationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an escalation decision. Produced fresh on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationResult {
    pub level: EscalationLevel,

    /// True only for graceful degradation
    pub resolved: bool,

    pub action: EscalationAction,

    /// Human-readable explanation
    pub message: String,

    pub requires_human: bool,
}

/// Retries allowed before pivoting to another strategy.
pub const SELF_RECOVERY_LIMIT: u32 = 3;

/// Retries allowed before alternatives count as exhausted.
pub const STRATEGY_PIVOT_LIMIT: u32 = 5;

/// Decide how to respond to a failure.
///
/// Evaluated in precedence order:
/// 1. `retry_count <= 3` with alternatives: retry
/// 2. `retry_count <= 5` with alternatives: pivot
/// 3. not critical: proceed degraded (the only resolved outcome)
/// 4. otherwise: pause for a human
pub fn determine_escalation(
    retry_count: u32,
    has_alternatives: bool,
    is_critical: bool,
) -> EscalationResult {
    if has_alternatives && retry_count <= SELF_RECOVERY_LIMIT {
        EscalationResult {
            level: EscalationLevel::SelfRecovery,
            resolved: false,
            action: EscalationAction::Retry,
            message: format!(
                "Retrying with the current approach (retry {}, limit {})",
                retry_count, SELF_RECOVERY_LIMIT
            ),
            requires_human: false,
        }
    } else if has_alternatives && retry_count <= STRATEGY_PIVOT_LIMIT {
        EscalationResult {
            level: EscalationLevel::StrategyPivot,
            resolved: false,
            action: EscalationAction::Pivot,
            message: format!(
                "Switching to an alternative strategy after {} failed attempts",
                retry_count
            ),
            requires_human: false,
        }
    } else if !is_critical {
        EscalationResult {
            level: EscalationLevel::GracefulDegradation,
            resolved: true,
            action: EscalationAction::Proceed,
            message: "Proceeding without the failed non-critical step".to_string(),
            requires_human: false,
        }
    } else {
        EscalationResult {
            level: EscalationLevel::HumanEscalation,
            resolved: false,
            action: EscalationAction::Pause,
            message: format!(
                "Critical step failed {} times with no alternatives left; human input required",
                retry_count
            ),
            requires_human: true,
        }
    }
}
