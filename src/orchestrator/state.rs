//! Orchestrator state: the unit that is checkpointed.

use crate::spec::{DEFAULT_PROFILE, JobSpec};
use serde::{Deserialize, Serialize};

/// Phase of the current job.
///
/// Jobs cycle `plan → create → wait → master_export` and then back to `plan`
/// for the next index. `Done` is the terminal marker for a finished job; it is
/// never persisted as the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Plan,
    Create,
    Wait,
    MasterExport,
    Done,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Plan => "plan",
            JobPhase::Create => "create",
            JobPhase::Wait => "wait",
            JobPhase::MasterExport => "master_export",
            JobPhase::Done => "done",
        }
    }

    /// Phase that follows a successful pass through this one.
    pub fn next(&self) -> JobPhase {
        match self {
            JobPhase::Plan => JobPhase::Create,
            JobPhase::Create => JobPhase::Wait,
            JobPhase::Wait => JobPhase::MasterExport,
            JobPhase::MasterExport | JobPhase::Done => JobPhase::Done,
        }
    }

    /// Phases that run an external action with retries.
    pub fn is_step(&self) -> bool {
        matches!(self, JobPhase::Create | JobPhase::MasterExport)
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of a run, persisted after every phase transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorState {
    /// 0-based index of the current job.
    pub song_index: usize,
    pub phase: JobPhase,
    pub profile: String,
    pub spec: Option<JobSpec>,
    pub last_error: Option<String>,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self {
            song_index: 0,
            phase: JobPhase::Plan,
            profile: DEFAULT_PROFILE.to_string(),
            spec: None,
            last_error: None,
        }
    }
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the phase/spec invariant: `plan` has no spec, every other phase has one.
    pub fn validate(&self) -> Result<(), String> {
        match (self.phase, &self.spec) {
            (JobPhase::Plan, Some(_)) => Err("phase 'plan' must not carry a spec".into()),
            (JobPhase::Plan, None) => Ok(()),
            (JobPhase::Done, _) => Err("phase 'done' is never a resumable phase".into()),
            (phase, None) => Err(format!("phase '{}' requires a spec", phase)),
            (_, Some(_)) => Ok(()),
        }
    }

    /// Record a freshly planned spec and move to `create`.
    pub fn record_plan(&mut self, spec: JobSpec, profile: String) {
        self.spec = Some(spec);
        self.profile = profile;
        self.last_error = None;
        self.phase = JobPhase::Create;
    }

    /// Move to the next phase within the current job.
    pub fn advance(&mut self) {
        self.phase = self.phase.next();
        self.last_error = None;
    }

    /// Finish (or abandon) the current job and reset for the next index.
    pub fn next_job(&mut self) {
        self.song_index += 1;
        self.phase = JobPhase::Plan;
        self.spec = None;
        self.last_error = None;
    }

    pub fn title(&self) -> Option<&str> {
        self.spec.as_ref().and_then(|s| s.title.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> JobSpec {
        JobSpec::new("words", "pop").with_title("Song")
    }

    #[test]
    fn test_phase_order() {
        let mut phase = JobPhase::Plan;
        let mut order = vec![phase];
        while phase != JobPhase::Done {
            phase = phase.next();
            order.push(phase);
        }
        assert_eq!(
            order,
            vec![
                JobPhase::Plan,
                JobPhase::Create,
                JobPhase::Wait,
                JobPhase::MasterExport,
                JobPhase::Done
            ]
        );
    }

    #[test]
    fn test_phase_serde_names() {
        assert_eq!(
            serde_json::to_value(JobPhase::MasterExport).unwrap(),
            "master_export"
        );
        let phase: JobPhase = serde_json::from_str("\"wait\"").unwrap();
        assert_eq!(phase, JobPhase::Wait);
    }

    #[test]
    fn test_fresh_state_is_valid() {
        let state = OrchestratorState::new();
        assert_eq!(state.song_index, 0);
        assert_eq!(state.phase, JobPhase::Plan);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_invariant_rejects_spec_in_plan() {
        let state = OrchestratorState {
            spec: Some(spec()),
            ..OrchestratorState::new()
        };
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_invariant_requires_spec_after_plan() {
        for phase in [JobPhase::Create, JobPhase::Wait, JobPhase::MasterExport] {
            let state = OrchestratorState {
                phase,
                ..OrchestratorState::new()
            };
            assert!(state.validate().is_err(), "{} without spec", phase);
        }
    }

    #[test]
    fn test_record_plan_then_next_job() {
        let mut state = OrchestratorState::new();
        state.last_error = Some("old".into());
        state.record_plan(spec(), "lo_fi".into());
        assert_eq!(state.phase, JobPhase::Create);
        assert_eq!(state.profile, "lo_fi");
        assert!(state.last_error.is_none());
        assert!(state.validate().is_ok());

        state.next_job();
        assert_eq!(state.song_index, 1);
        assert_eq!(state.phase, JobPhase::Plan);
        assert!(state.spec.is_none());
        assert!(state.validate().is_ok());
    }
}
