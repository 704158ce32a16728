//! Core types shared by every recovery component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A phase of the multi-phase work pipeline.
///
/// Declaration order is pipeline order, so `Ord` sorts phases from
/// `Explore` to `Commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Discover the relevant code and context
    Explore,

    /// Produce an implementation plan
    Plan,

    /// Write the change
    Code,

    /// Run and fix tests
    Test,

    /// Quality gates (lint, review, coverage)
    Quality,

    /// Address gate findings
    Fix,

    /// Commit and hand off
    Commit,
}

impl Phase {
    /// All phases in pipeline order.
    pub const PIPELINE: [Phase; 7] = [
        Phase::Explore,
        Phase::Plan,
        Phase::Code,
        Phase::Test,
        Phase::Quality,
        Phase::Fix,
        Phase::Commit,
    ];

    /// Upper-case name used in logs and serialized forms.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Explore => "EXPLORE",
            Phase::Plan => "PLAN",
            Phase::Code => "CODE",
            Phase::Test => "TEST",
            Phase::Quality => "QUALITY",
            Phase::Fix => "FIX",
            Phase::Commit => "COMMIT",
        }
    }

    /// Phases from the end of the pipeline back to the start.
    pub fn reverse_pipeline() -> impl Iterator<Item = Phase> {
        Self::PIPELINE.into_iter().rev()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work produced by a phase so far.
///
/// The toolkit stores these payloads but never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseArtifacts {
    /// Files found to be relevant
    #[serde(default)]
    pub files_identified: Vec<String>,

    /// Short summary of the plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_summary: Option<String>,

    /// Paths or descriptions of changes made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_changes: Option<Vec<String>>,

    /// Opaque test-run payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<serde_json::Value>,

    /// Score reported by quality gates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

/// Snapshot of a phase's progress for one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseCheckpoint {
    /// Phase this snapshot belongs to
    pub phase: Phase,

    /// Opaque work-item identifier (e.g. an issue key)
    pub issue_key: String,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Artifacts produced so far
    #[serde(default)]
    pub artifacts: PhaseArtifacts,

    /// Budget units consumed when the snapshot was taken
    #[serde(default)]
    pub context_used: u64,

    /// Whether the orchestrator may resume from this snapshot
    pub can_resume: bool,
}

impl PhaseCheckpoint {
    /// Create a resumable checkpoint stamped with the current time.
    pub fn new(issue_key: impl Into<String>, phase: Phase) -> Self {
        Self {
            phase,
            issue_key: issue_key.into(),
            timestamp: Utc::now(),
            artifacts: PhaseArtifacts::default(),
            context_used: 0,
            can_resume: true,
        }
    }

    /// Attach artifacts.
    pub fn with_artifacts(mut self, artifacts: PhaseArtifacts) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Record how much context had been used.
    pub fn with_context_used(mut self, context_used: u64) -> Self {
        self.context_used = context_used;
        self
    }

    /// Mark whether the snapshot can be resumed.
    pub fn resumable(mut self, can_resume: bool) -> Self {
        self.can_resume = can_resume;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_pipeline_starts_at_commit() {
        let order: Vec<Phase> = Phase::reverse_pipeline().collect();
        assert_eq!(order.first(), Some(&Phase::Commit));
        assert_eq!(order.last(), Some(&Phase::Explore));
        assert_eq!(order.len(), 7);
    }

    #[test]
    fn test_checkpoint_serializes_with_wire_names() {
        let checkpoint = PhaseCheckpoint::new("PROJ-42", Phase::Plan)
            .with_artifacts(PhaseArtifacts {
                files_identified: vec!["src/lib.rs".to_string()],
                plan_summary: Some("Split parser".to_string()),
                ..Default::default()
            })
            .with_context_used(1200);

        let json = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(json["phase"], "PLAN");
        assert_eq!(json["issueKey"], "PROJ-42");
        assert_eq!(json["contextUsed"], 1200);
        assert_eq!(json["canResume"], true);
        assert_eq!(json["artifacts"]["filesIdentified"][0], "src/lib.rs");
        assert!(json["artifacts"].get("qualityScore").is_none());
    }
}
