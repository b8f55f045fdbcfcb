//! Durable checkpoint of orchestrator state.
//!
//! One JSON object per run, holding the run's static configuration next to
//! the flattened [`OrchestratorState`]:
//!
//! ```json
//! { "intent": "lofi", "count": 3, "wait_phase_seconds": 90,
//!   "wait_between_jobs_seconds": 20, "export_mode": "full",
//!   "song_index": 1, "phase": "create", "profile": "lo_fi",
//!   "spec": { ... }, "last_error": null }
//! ```
//!
//! Saves go to a sibling temp file which is then renamed over the checkpoint,
//! so a reader sees either the previous record or the new one.

use super::state::OrchestratorState;
use crate::errors::AutopilotError;
use crate::spec::ExportMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Static settings a checkpoint is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDescriptor {
    pub intent: String,
    pub count: usize,
    pub wait_phase_seconds: u64,
    pub wait_between_jobs_seconds: u64,
    pub export_mode: ExportMode,
}

/// On-disk record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    #[serde(flatten)]
    pub run: RunDescriptor,
    #[serde(flatten)]
    pub state: OrchestratorState,
}

/// What `inspect` found on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointLoad {
    Missing,
    Loaded(OrchestratorState),
    /// A checkpoint exists for another intent.
    IntentMismatch { stored_intent: String },
    /// A checkpoint exists but cannot be used.
    Corrupt(String),
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist `state` for the run described by `run`.
    pub fn save(
        &self,
        run: &RunDescriptor,
        state: &OrchestratorState,
    ) -> Result<(), AutopilotError> {
        let write_err = |source: std::io::Error| AutopilotError::CheckpointWrite {
            path: self.path.clone(),
            source,
        };

        let record = CheckpointRecord {
            run: run.clone(),
            state: state.clone(),
        };
        let json = serde_json::to_vec_pretty(&record).map_err(|e| write_err(e.into()))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(write_err)?;
            file.write_all(&json).map_err(write_err)?;
            file.sync_all().map_err(write_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        debug!(
            song_index = state.song_index,
            phase = %state.phase,
            "checkpoint saved"
        );
        Ok(())
    }

    /// Read the raw record, if one exists.
    pub fn read_record(&self) -> anyhow::Result<Option<CheckpointRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read checkpoint {}", self.path.display()))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint {}", self.path.display()))?;
        Ok(Some(record))
    }

    /// Classify the checkpoint against the run being started.
    pub fn inspect(&self, run: &RunDescriptor) -> CheckpointLoad {
        let record = match self.read_record() {
            Ok(Some(record)) => record,
            Ok(None) => return CheckpointLoad::Missing,
            Err(e) => return CheckpointLoad::Corrupt(format!("{:#}", e)),
        };

        if record.run.intent != run.intent {
            return CheckpointLoad::IntentMismatch {
                stored_intent: record.run.intent,
            };
        }
        if let Err(reason) = record.state.validate() {
            return CheckpointLoad::Corrupt(reason);
        }

        CheckpointLoad::Loaded(record.state)
    }

    /// Load a usable state, or `None` when there is nothing to resume.
    pub fn load(&self, run: &RunDescriptor) -> Option<OrchestratorState> {
        match self.inspect(run) {
            CheckpointLoad::Loaded(state) => Some(state),
            _ => None,
        }
    }

    /// Delete the checkpoint and any leftover temp file.
    pub fn clear(&self) -> Result<(), AutopilotError> {
        for path in [self.path.clone(), self.temp_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(AutopilotError::CheckpointClear { path, source }),
            }
        }
        Ok(())
    }
}
