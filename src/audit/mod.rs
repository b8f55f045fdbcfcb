//! Append-only audit trail for autopilot runs.
//!
//! Two independent newline-delimited JSON files are written:
//! - the event log, one [`Event`] per significant transition
//! - the Phase-2 artifact log, one [`Phase2Artifact`] per planning step
//!
//! Both are written through [`JsonlLog`] and never rewritten.

pub mod logger;

pub use logger::JsonlLog;

use crate::orchestrator::state::JobPhase;
use crate::phase2::Candidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kinds of events written to the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    Resumed,
    CheckpointDiscarded,
    PhaseStarted,
    Planned,
    PlannerFallback,
    StepAttemptFailed,
    BlockingPause,
    BlockingResume,
    CreateFailed,
    MasterExportFailed,
    SongCompleted,
    RunStopped,
    RunFinished,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "run_started",
            EventKind::Resumed => "resumed",
            EventKind::CheckpointDiscarded => "checkpoint_discarded",
            EventKind::PhaseStarted => "phase_started",
            EventKind::Planned => "planned",
            EventKind::PlannerFallback => "planner_fallback",
            EventKind::StepAttemptFailed => "step_attempt_failed",
            EventKind::BlockingPause => "blocking_pause",
            EventKind::BlockingResume => "blocking_resume",
            EventKind::CreateFailed => "create_failed",
            EventKind::MasterExportFailed => "master_export_failed",
            EventKind::SongCompleted => "song_completed",
            EventKind::RunStopped => "run_stopped",
            EventKind::RunFinished => "run_finished",
        }
    }

    /// The `*_failed` event recorded when a step exhausts its attempts.
    pub fn step_failed(phase: JobPhase) -> Option<Self> {
        match phase {
            JobPhase::Create => Some(EventKind::CreateFailed),
            JobPhase::MasterExport => Some(EventKind::MasterExportFailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the event log. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub run_id: Uuid,
    pub event: EventKind,
    pub song_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Event-specific fields (phase, attempt, profile, resume_file, ...).
    #[serde(flatten, default)]
    pub details: Map<String, Value>,
}

impl Event {
    pub fn new(run_id: Uuid, event: EventKind, song_index: usize) -> Self {
        Self {
            ts: Utc::now(),
            run_id,
            event,
            song_index,
            title: None,
            message: None,
            details: Map::new(),
        }
    }

    pub fn with_title(mut self, title: Option<&str>) -> Self {
        self.title = title.map(str::to_string);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach an extra field. Reserved keys are ignored.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !matches!(
            key,
            "ts" | "run_id" | "event" | "song_index" | "title" | "message"
        ) {
            self.details.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }
}

/// One record of the Phase-2 artifact log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase2Artifact {
    Discover {
        intent: String,
        index: usize,
        objective: String,
    },
    Design {
        candidate_count: usize,
        candidates: Vec<Candidate>,
    },
    Decide {
        selected_candidate: usize,
        selected_score: f64,
        selected_profile: String,
        #[serde(default)]
        selected_title: Option<String>,
    },
}

impl Phase2Artifact {
    pub fn phase_name(&self) -> &'static str {
        match self {
            Phase2Artifact::Discover { .. } => "discover",
            Phase2Artifact::Design { .. } => "design",
            Phase2Artifact::Decide { .. } => "decide",
        }
    }
}
