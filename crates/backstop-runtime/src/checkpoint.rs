//! Phase checkpoints for resuming interrupted work items.
//!
//! Snapshots live in process memory, keyed by work item and phase, for
//! the lifetime of the process.

use backstop_core::{Phase, PhaseCheckpoint};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::config::CheckpointConfig;

/// In-process checkpoint registry.
pub struct CheckpointManager {
    checkpoints: RwLock<HashMap<String, BTreeMap<Phase, PhaseCheckpoint>>>,
    max_issues: usize,
}

impl CheckpointManager {
    /// Create a manager that keeps at most `max_issues` work items.
    pub fn new(max_issues: usize) -> Self {
        Self {
            checkpoints: RwLock::new(HashMap::new()),
            max_issues: max_issues.max(1),
        }
    }

    pub fn from_config(config: &CheckpointConfig) -> Self {
        Self::new(config.max_issues)
    }

    /// Store a checkpoint under its issue key and phase, replacing any
    /// previous one.
    pub fn save(&self, checkpoint: PhaseCheckpoint) {
        let mut checkpoints = self.checkpoints.write();

        if !checkpoints.contains_key(&checkpoint.issue_key) && checkpoints.len() >= self.max_issues
        {
            if let Some(stalest) = stalest_issue(&checkpoints) {
                checkpoints.remove(&stalest);
                tracing::info!(issue = %stalest, "Evicted checkpoints for stalest work item");
            }
        }

        tracing::debug!(
            issue = %checkpoint.issue_key,
            phase = %checkpoint.phase,
            can_resume = checkpoint.can_resume,
            "Checkpoint saved"
        );
        checkpoints
            .entry(checkpoint.issue_key.clone())
            .or_default()
            .insert(checkpoint.phase, checkpoint);
    }

    /// Fetch the checkpoint for one phase.
    pub fn get(&self, issue_key: &str, phase: Phase) -> Option<PhaseCheckpoint> {
        self.checkpoints
            .read()
            .get(issue_key)
            .and_then(|phases| phases.get(&phase))
            .cloned()
    }

    /// The resumable checkpoint furthest along the pipeline.
    pub fn latest_resumable(&self, issue_key: &str) -> Option<PhaseCheckpoint> {
        let checkpoints = self.checkpoints.read();
        let phases = checkpoints.get(issue_key)?;

        Phase::reverse_pipeline()
            .filter_map(|phase| phases.get(&phase))
            .find(|checkpoint| checkpoint.can_resume)
            .cloned()
    }

    /// Drop every phase checkpoint for a work item.
    pub fn clear(&self, issue_key: &str) {
        if self.checkpoints.write().remove(issue_key).is_some() {
            tracing::debug!(issue = %issue_key, "Checkpoints cleared");
        }
    }

    /// Drop everything.
    pub fn clear_all(&self) {
        self.checkpoints.write().clear();
    }

    /// Number of work items held.
    pub fn len(&self) -> usize {
        self.checkpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CheckpointManager {
    fn default() -> Self {
        Self::from_config(&CheckpointConfig::default())
    }
}

fn stalest_issue(checkpoints: &HashMap<String, BTreeMap<Phase, PhaseCheckpoint>>) -> Option<String> {
    checkpoints
        .iter()
        .filter_map(|(issue, phases)| {
            phases
                .values()
                .map(|checkpoint| checkpoint.timestamp)
                .max()
                .map(|newest| (newest, issue))
        })
        .min()
        .map(|(_, issue)| issue.clone())
}
