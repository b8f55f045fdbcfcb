//! Typed error hierarchy for the autopilot.
//!
//! - `PlanningError`: a planner could not produce a usable spec
//! - `AutopilotError`: conditions that end a run
//! - `RunFailure`: an `AutopilotError` plus the per-job summary gathered so far
//!
//! Ordinary step failures and blocking conditions are not errors here: the
//! orchestrator handles them at the phase boundary and records events.

use crate::audit::Phase2Artifact;
use crate::orchestrator::RunReport;
use thiserror::Error;

/// A planner failed to produce a spec. Distinct from a low-quality spec,
/// which is scored rather than rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanningError {
    #[error("Planner {planner} is not configured: {reason}")]
    NotConfigured { planner: String, reason: String },

    #[error("Model call failed: {0}")]
    ModelCallFailed(String),

    #[error("Model response could not be used: {0}")]
    InvalidResponse(String),

    #[error("No planner available: {0}")]
    Unavailable(String),
}

/// Errors that terminate an autopilot run.
#[derive(Debug, Error)]
pub enum AutopilotError {
    #[error("Planning failed: {0}")]
    Planning(#[from] PlanningError),

    #[error("Phase-2 planning produced no viable candidate ({requested} requested)")]
    NoViablePlan {
        requested: usize,
        /// Discover and design records for the failed round.
        artifacts: Vec<Phase2Artifact>,
    },

    #[error("Failed to write checkpoint at {path}: {source}")]
    CheckpointWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to clear checkpoint at {path}: {source}")]
    CheckpointClear {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AutopilotError {
    /// Whether this error came from planning (configuration) rather than I/O.
    pub fn is_planning(&self) -> bool {
        matches!(
            self,
            AutopilotError::Planning(_) | AutopilotError::NoViablePlan { .. }
        )
    }
}

/// A fatal run error together with the summary accumulated before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: AutopilotError,
    pub report: RunReport,
}
