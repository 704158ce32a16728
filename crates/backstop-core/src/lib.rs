//! # backstop-core
//!
//! Deterministic building blocks for workflow failure recovery.
//!
//! This crate holds everything that needs no clock, no I/O and no runtime:
//! - The phase pipeline and checkpoint data model
//! - The escalation decision table
//! - The static fallback catalog
//!
//! ## Example
//!
//! ```rust
//! use backstop_core::{determine_escalation, EscalationLevel};
//!
//! let decision = determine_escalation(10, false, true);
//! assert_eq!(decision.level, EscalationLevel::HumanEscalation);
//! assert!(decision.requires_human);
//! ```

pub mod escalation;
pub mod fallback;
pub mod types;

pub use escalation::{
    determine_escalation, EscalationAction, EscalationLevel, EscalationResult,
    SELF_RECOVERY_LIMIT, STRATEGY_PIVOT_LIMIT,
};
pub use fallback::{FallbackPlan, FallbackScenario};
pub use types::{Phase, PhaseArtifacts, PhaseCheckpoint};
