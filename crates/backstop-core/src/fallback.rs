//! Static catalog of fallback plans for known outages.
//!
//! Pure data. The orchestrator consults it when a dependency is
//! unavailable; nothing here performs any action.

use serde::{Deserialize, Serialize};

/// A known failure scenario with a prepared fallback plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FallbackScenario {
    JiraUnavailable,
    ConfluenceUnavailable,
    SearchFailed,
    GateTimeout,
}

/// Steps to take for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FallbackPlan {
    /// Short machine-friendly action name
    pub action: &'static str,

    /// Ordered steps for the orchestrator
    pub steps: &'static [&'static str],
}

const JIRA_UNAVAILABLE: FallbackPlan = FallbackPlan {
    action: "use_cached_context",
    steps: &[
        "Use cached issue details from the last successful fetch",
        "Continue from local git history and branch name",
        "Queue issue transitions and comments for later sync",
        "Report degraded mode in the final summary",
    ],
};

const CONFLUENCE_UNAVAILABLE: FallbackPlan = FallbackPlan {
    action: "skip_documentation_lookup",
    steps: &[
        "Fall back to in-repo documentation (README, docs/)",
        "Record missing documentation links in the plan",
        "Continue without publishing documentation updates",
    ],
};

const SEARCH_FAILED: FallbackPlan = FallbackPlan {
    action: "narrow_search",
    steps: &[
        "Retry with a narrower path or file-type filter",
        "Switch to filename glob matching",
        "Read entry points directly and follow imports",
    ],
};

const GATE_TIMEOUT: FallbackPlan = FallbackPlan {
    action: "run_partial_gates",
    steps: &[
        "Run fast gates only (format, lint)",
        "Mark slow gates as pending in the commit message",
        "Schedule the full gate run after commit",
    ],
};

impl FallbackScenario {
    /// The catalog entry for this scenario.
    pub fn plan(&self) -> &'static FallbackPlan {
        match self {
            FallbackScenario::JiraUnavailable => &JIRA_UNAVAILABLE,
            FallbackScenario::ConfluenceUnavailable => &CONFLUENCE_UNAVAILABLE,
            FallbackScenario::SearchFailed => &SEARCH_FAILED,
            FallbackScenario::GateTimeout => &GATE_TIMEOUT,
        }
    }

    /// Map a circuit breaker service name to its outage scenario.
    pub fn for_service(service: &str) -> Option<FallbackScenario> {
        match service {
            "jiraApi" => Some(FallbackScenario::JiraUnavailable),
            "confluence" => Some(FallbackScenario::ConfluenceUnavailable),
            "codeSearch" => Some(FallbackScenario::SearchFailed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scenario_has_steps() {
        for scenario in [
            FallbackScenario::JiraUnavailable,
            FallbackScenario::ConfluenceUnavailable,
            FallbackScenario::SearchFailed,
            FallbackScenario::GateTimeout,
        ] {
            let plan = scenario.plan();
            assert!(!plan.action.is_empty());
            assert!(!plan.steps.is_empty(), "{:?} has no steps", scenario);
        }
    }

    #[test]
    fn test_service_mapping() {
        assert_eq!(
            FallbackScenario::for_service("codeSearch"),
            Some(FallbackScenario::SearchFailed)
        );
        assert_eq!(
            FallbackScenario::for_service("jiraApi"),
            Some(FallbackScenario::JiraUnavailable)
        );
        assert_eq!(FallbackScenario::for_service("githubApi"), None);
    }
}
