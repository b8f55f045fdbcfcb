//! File-backed configuration for the autopilot.
//!
//! Settings are read from `.autopilot/autopilot.toml` under the project
//! directory, then overridden by environment variables, then by CLI flags
//! (applied later in [`crate::config`]).
//!
//! # Configuration File Format
//!
//! ```toml
//! [run]
//! count = 3
//! wait_phase_seconds = 90
//! wait_between_jobs_seconds = 20
//! export_mode = "full"
//! step_retries = 2
//! retry_delay_ms = 2000
//! continue_on_error = true
//! max_hours = 6.0
//!
//! [planner]
//! strategy = "auto"
//! model = "sonnet"
//! model_cmd = "claude"
//! timeout_secs = 120
//! phase2 = false
//! candidate_count = 3
//!
//! [pause]
//! pause_on_blocking = true
//! poll_interval_ms = 2000
//! blocking_markers = ["captcha"]
//! notify_cmd = "notify-send autopilot"
//!
//! [executor]
//! create_cmd = "./scripts/create.sh"
//! export_cmd = "./scripts/export.sh"
//! timeout_secs = 600
//!
//! [paths]
//! checkpoint = "checkpoint.json"
//! events = "events.jsonl"
//! artifacts = "phase2-artifacts.jsonl"
//! resume_signal = "resume.signal"
//! ```
//!
//! Relative paths in `[paths]` resolve against the `.autopilot` directory.

use crate::planner::PlannerStrategy;
use crate::spec::ExportMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding config, checkpoint and logs.
pub const PILOT_DIR: &str = ".autopilot";
/// Config file name inside [`PILOT_DIR`].
pub const CONFIG_FILE: &str = "autopilot.toml";

pub const ENV_MODEL: &str = "AUTOPILOT_MODEL";
pub const ENV_MODEL_CMD: &str = "AUTOPILOT_MODEL_CMD";
pub const ENV_NOTIFY_CMD: &str = "AUTOPILOT_NOTIFY_CMD";
pub const ENV_CREATE_CMD: &str = "AUTOPILOT_CREATE_CMD";
pub const ENV_EXPORT_CMD: &str = "AUTOPILOT_EXPORT_CMD";

/// `[run]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_wait_phase")]
    pub wait_phase_seconds: u64,
    #[serde(default = "default_wait_between")]
    pub wait_between_jobs_seconds: u64,
    #[serde(default)]
    pub export_mode: ExportMode,
    #[serde(default = "default_step_retries")]
    pub step_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_true")]
    pub continue_on_error: bool,
    /// Wall-clock limit for a run, in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hours: Option<f64>,
}

fn default_count() -> usize {
    1
}

fn default_wait_phase() -> u64 {
    90
}

fn default_wait_between() -> u64 {
    20
}

fn default_step_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            count: default_count(),
            wait_phase_seconds: default_wait_phase(),
            wait_between_jobs_seconds: default_wait_between(),
            export_mode: ExportMode::default(),
            step_retries: default_step_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            continue_on_error: true,
            max_hours: None,
        }
    }
}

/// `[planner]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerSection {
    #[serde(default)]
    pub strategy: PlannerStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_cmd: Option<String>,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub phase2: bool,
    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,
}

fn default_model_timeout() -> u64 {
    120
}

fn default_candidate_count() -> usize {
    3
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            strategy: PlannerStrategy::default(),
            model: None,
            model_cmd: None,
            timeout_secs: default_model_timeout(),
            phase2: false,
            candidate_count: default_candidate_count(),
        }
    }
}

/// `[pause]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseSection {
    #[serde(default = "default_true")]
    pub pause_on_blocking: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_blocking_markers")]
    pub blocking_markers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_cmd: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_blocking_markers() -> Vec<String> {
    vec!["captcha".to_string()]
}

impl Default for PauseSection {
    fn default() -> Self {
        Self {
            pause_on_blocking: true,
            poll_interval_ms: default_poll_interval_ms(),
            blocking_markers: default_blocking_markers(),
            notify_cmd: None,
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_cmd: Option<String>,
    #[serde(default = "default_step_timeout")]
    pub timeout_secs: u64,
}

fn default_step_timeout() -> u64 {
    600
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            create_cmd: None,
            export_cmd: None,
            timeout_secs: default_step_timeout(),
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_checkpoint")]
    pub checkpoint: PathBuf,
    #[serde(default = "default_events")]
    pub events: PathBuf,
    #[serde(default = "default_artifacts")]
    pub artifacts: PathBuf,
    #[serde(default = "default_resume_signal")]
    pub resume_signal: PathBuf,
}

fn default_checkpoint() -> PathBuf {
    PathBuf::from("checkpoint.json")
}

fn default_events() -> PathBuf {
    PathBuf::from("events.jsonl")
}

fn default_artifacts() -> PathBuf {
    PathBuf::from("phase2-artifacts.jsonl")
}

fn default_resume_signal() -> PathBuf {
    PathBuf::from("resume.signal")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            checkpoint: default_checkpoint(),
            events: default_events(),
            artifacts: default_artifacts(),
            resume_signal: default_resume_signal(),
        }
    }
}

/// Parsed `autopilot.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PilotToml {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub pause: PauseSection,
    #[serde(default)]
    pub executor: ExecutorSection,
    #[serde(default)]
    pub paths: PathsSection,
}

impl PilotToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse autopilot.toml")
    }

    /// Load from `<pilot_dir>/autopilot.toml`, or defaults when absent.
    pub fn load_or_default(pilot_dir: &Path) -> Result<Self> {
        let path = pilot_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize autopilot.toml")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(model) = get(ENV_MODEL) {
            self.planner.model = Some(model);
        }
        if let Some(cmd) = get(ENV_MODEL_CMD) {
            self.planner.model_cmd = Some(cmd);
        }
        if let Some(cmd) = get(ENV_NOTIFY_CMD) {
            self.pause.notify_cmd = Some(cmd);
        }
        if let Some(cmd) = get(ENV_CREATE_CMD) {
            self.executor.create_cmd = Some(cmd);
        }
        if let Some(cmd) = get(ENV_EXPORT_CMD) {
            self.executor.export_cmd = Some(cmd);
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.run.count == 0 {
            warnings.push("run.count is 0: runs will finish immediately".to_string());
        }
        if let Some(hours) = self.run.max_hours
            && hours <= 0.0
        {
            warnings.push(format!(
                "run.max_hours = {} stops every run before its first job",
                hours
            ));
        }
        if self.planner.candidate_count == 0 {
            warnings.push(
                "planner.candidate_count is 0: one candidate will be generated".to_string(),
            );
        }
        if self.planner.strategy == PlannerStrategy::Model && self.planner.model.is_none() {
            warnings.push(format!(
                "planner.strategy = \"model\" but no model is set (planner.model or {})",
                ENV_MODEL
            ));
        }
        if self
            .pause
            .blocking_markers
            .iter()
            .all(|m| m.trim().is_empty())
        {
            warnings.push(
                "pause.blocking_markers is empty: blocking conditions will be retried as ordinary failures"
                    .to_string(),
            );
        }
        if self.pause.poll_interval_ms == 0 {
            warnings.push("pause.poll_interval_ms is 0: resume polling will spin".to_string());
        }
        if self.executor.create_cmd.is_none() || self.executor.export_cmd.is_none() {
            warnings.push(format!(
                "executor.create_cmd/export_cmd not set ({} / {}): only --dry-run runs are possible",
                ENV_CREATE_CMD, ENV_EXPORT_CMD
            ));
        }

        warnings
    }
}

/// File + environment configuration for a project.
#[derive(Debug, Clone)]
pub struct PilotConfig {
    pub project_dir: PathBuf,
    pub pilot_dir: PathBuf,
    pub toml: PilotToml,
}

impl PilotConfig {
    /// Load `.autopilot/autopilot.toml` and apply environment overrides.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let mut config = Self::from_file(project_dir)?;
        config.toml.apply_env();
        Ok(config)
    }

    /// Load without consulting the environment.
    pub fn from_file(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let pilot_dir = project_dir.join(PILOT_DIR);
        let toml = PilotToml::load_or_default(&pilot_dir)?;
        Ok(Self {
            project_dir,
            pilot_dir,
            toml,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.pilot_dir.join(CONFIG_FILE)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.pilot_dir.join(&self.toml.paths.checkpoint)
    }

    pub fn events_path(&self) -> PathBuf {
        self.pilot_dir.join(&self.toml.paths.events)
    }

    pub fn artifacts_path(&self) -> PathBuf {
        self.pilot_dir.join(&self.toml.paths.artifacts)
    }

    pub fn resume_signal_path(&self) -> PathBuf {
        self.pilot_dir.join(&self.toml.paths.resume_signal)
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
