use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestrator::checkpoint::RunDescriptor;
use crate::pilot_config::{PILOT_DIR, PilotConfig, PilotToml};
use crate::planner::{ModelSettings, PlannerStrategy};
use crate::planner::model::DEFAULT_MODEL_CMD;
use crate::spec::ExportMode;

/// Where a run keeps its durable files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub checkpoint: PathBuf,
    pub events: PathBuf,
    pub artifacts: PathBuf,
    pub resume_signal: PathBuf,
}

impl RunPaths {
    /// Default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            checkpoint: dir.join("checkpoint.json"),
            events: dir.join("events.jsonl"),
            artifacts: dir.join("phase2-artifacts.jsonl"),
            resume_signal: dir.join("resume.signal"),
        }
    }

    fn from_pilot(pilot: &PilotConfig) -> Self {
        Self {
            checkpoint: pilot.checkpoint_path(),
            events: pilot.events_path(),
            artifacts: pilot.artifacts_path(),
            resume_signal: pilot.resume_signal_path(),
        }
    }
}

/// Runtime configuration for one autopilot run.
///
/// Built from the file/environment layer ([`PilotConfig`]) and then
/// adjusted by CLI flags through [`RunOverrides`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub intent: String,
    pub count: usize,
    pub resume: bool,
    pub planner: PlannerStrategy,
    pub model: ModelSettings,
    pub phase2: bool,
    pub candidate_count: usize,
    pub wait_phase: Duration,
    pub wait_between_jobs: Duration,
    pub export_mode: ExportMode,
    pub step_retries: u32,
    pub retry_delay: Duration,
    pub continue_on_error: bool,
    pub pause_on_blocking: bool,
    pub poll_interval: Duration,
    pub blocking_markers: Vec<String>,
    pub notify_cmd: Option<String>,
    pub max_runtime: Option<Duration>,
    pub paths: RunPaths,
}

impl RunConfig {
    /// Defaults for `intent`, with files under `dir`.
    pub fn new(intent: impl Into<String>, dir: &Path) -> Self {
        Self::from_toml(intent, &PilotToml::default(), RunPaths::in_dir(dir))
    }

    /// Resolve a run from the project configuration.
    pub fn from_pilot(intent: impl Into<String>, pilot: &PilotConfig) -> Self {
        Self::from_toml(intent, &pilot.toml, RunPaths::from_pilot(pilot))
    }

    fn from_toml(intent: impl Into<String>, toml: &PilotToml, paths: RunPaths) -> Self {
        Self {
            intent: intent.into(),
            count: toml.run.count,
            resume: false,
            planner: toml.planner.strategy,
            model: ModelSettings {
                model: toml.planner.model.clone(),
                command: toml
                    .planner
                    .model_cmd
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MODEL_CMD.to_string()),
                timeout: Duration::from_secs(toml.planner.timeout_secs),
            },
            phase2: toml.planner.phase2,
            candidate_count: toml.planner.candidate_count,
            wait_phase: Duration::from_secs(toml.run.wait_phase_seconds),
            wait_between_jobs: Duration::from_secs(toml.run.wait_between_jobs_seconds),
            export_mode: toml.run.export_mode,
            step_retries: toml.run.step_retries,
            retry_delay: Duration::from_millis(toml.run.retry_delay_ms),
            continue_on_error: toml.run.continue_on_error,
            pause_on_blocking: toml.pause.pause_on_blocking,
            poll_interval: Duration::from_millis(toml.pause.poll_interval_ms),
            blocking_markers: toml.pause.blocking_markers.clone(),
            notify_cmd: toml.pause.notify_cmd.clone(),
            max_runtime: toml.run.max_hours.and_then(hours_to_duration),
            paths,
        }
    }

    /// Static settings stored alongside the checkpoint.
    pub fn descriptor(&self) -> RunDescriptor {
        RunDescriptor {
            intent: self.intent.clone(),
            count: self.count,
            wait_phase_seconds: self.wait_phase.as_secs(),
            wait_between_jobs_seconds: self.wait_between_jobs.as_secs(),
            export_mode: self.export_mode,
        }
    }

    /// Total attempts allowed per step, ignoring blocking pauses.
    pub fn max_attempts(&self) -> u32 {
        self.step_retries.saturating_add(1)
    }

    /// Instruction shown to the operator while paused.
    pub fn resume_instruction(&self) -> String {
        format!(
            "Resolve the blocking condition in the target application, then run `autopilot resume-signal` (or create {})",
            self.paths.resume_signal.display()
        )
    }
}

/// `None` for negative, non-finite or unrepresentable values, which leaves
/// the run without a limit.
fn hours_to_duration(hours: f64) -> Option<Duration> {
    if hours.is_finite() && hours >= 0.0 {
        Duration::try_from_secs_f64(hours * 3600.0).ok()
    } else {
        None
    }
}

/// CLI-level adjustments applied on top of file/env settings.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub count: Option<usize>,
    pub resume: bool,
    pub planner: Option<PlannerStrategy>,
    pub model: Option<String>,
    pub phase2: bool,
    pub candidate_count: Option<usize>,
    pub wait_phase_seconds: Option<u64>,
    pub wait_between_jobs_seconds: Option<u64>,
    pub export_mode: Option<ExportMode>,
    pub step_retries: Option<u32>,
    pub stop_on_error: bool,
    pub no_pause: bool,
    pub max_hours: Option<f64>,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(count) = self.count {
            config.count = count;
        }
        config.resume |= self.resume;
        if let Some(planner) = self.planner {
            config.planner = planner;
        }
        if let Some(ref model) = self.model {
            config.model.model = Some(model.clone());
        }
        config.phase2 |= self.phase2;
        if let Some(n) = self.candidate_count {
            config.candidate_count = n;
        }
        if let Some(secs) = self.wait_phase_seconds {
            config.wait_phase = Duration::from_secs(secs);
        }
        if let Some(secs) = self.wait_between_jobs_seconds {
            config.wait_between_jobs = Duration::from_secs(secs);
        }
        if let Some(mode) = self.export_mode {
            config.export_mode = mode;
        }
        if let Some(retries) = self.step_retries {
            config.step_retries = retries;
        }
        if self.stop_on_error {
            config.continue_on_error = false;
        }
        if self.no_pause {
            config.pause_on_blocking = false;
        }
        if let Some(hours) = self.max_hours {
            config.max_runtime = hours_to_duration(hours);
        }
    }
}

/// Default state directory for a project.
pub fn pilot_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(PILOT_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let dir = tempdir().unwrap();
        let config = RunConfig::new("lofi", dir.path());
        assert_eq!(config.count, 1);
        assert!(!config.resume);
        assert_eq!(config.planner, PlannerStrategy::Auto);
        assert_eq!(config.wait_phase, Duration::from_secs(90));
        assert_eq!(config.wait_between_jobs, Duration::from_secs(20));
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.max_attempts(), 3);
        assert!(config.continue_on_error);
        assert!(config.max_runtime.is_none());
        assert_eq!(config.model.command, "claude");
        assert_eq!(config.paths.checkpoint, dir.path().join("checkpoint.json"));
    }

    #[test]
    fn test_descriptor_mirrors_static_settings() {
        let dir = tempdir().unwrap();
        let mut config = RunConfig::new("edm", dir.path());
        config.count = 5;
        config.export_mode = ExportMode::Multitrack;
        let d = config.descriptor();
        assert_eq!(d.intent, "edm");
        assert_eq!(d.count, 5);
        assert_eq!(d.wait_phase_seconds, 90);
        assert_eq!(d.wait_between_jobs_seconds, 20);
        assert_eq!(d.export_mode, ExportMode::Multitrack);
    }

    #[test]
    fn test_overrides_win() {
        let dir = tempdir().unwrap();
        let mut config = RunConfig::new("rock", dir.path());
        let overrides = RunOverrides {
            count: Some(3),
            resume: true,
            planner: Some(PlannerStrategy::Template),
            model: Some("opus".into()),
            phase2: true,
            candidate_count: Some(5),
            wait_phase_seconds: Some(0),
            wait_between_jobs_seconds: Some(1),
            export_mode: Some(ExportMode::Multitrack),
            step_retries: Some(0),
            stop_on_error: true,
            no_pause: true,
            max_hours: Some(0.5),
        };
        overrides.apply(&mut config);

        assert_eq!(config.count, 3);
        assert!(config.resume);
        assert_eq!(config.planner, PlannerStrategy::Template);
        assert_eq!(config.model.model.as_deref(), Some("opus"));
        assert!(config.phase2);
        assert_eq!(config.candidate_count, 5);
        assert_eq!(config.wait_phase, Duration::ZERO);
        assert_eq!(config.wait_between_jobs, Duration::from_secs(1));
        assert_eq!(config.max_attempts(), 1);
        assert!(!config.continue_on_error);
        assert!(!config.pause_on_blocking);
        assert_eq!(config.max_runtime, Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let dir = tempdir().unwrap();
        let mut config = RunConfig::new("rock", dir.path());
        RunOverrides::default().apply(&mut config);
        assert_eq!(config.count, 1);
        assert!(config.continue_on_error);
        assert!(config.pause_on_blocking);
    }

    #[test]
    fn test_from_pilot_uses_file_settings() {
        let dir = tempdir().unwrap();
        let pilot_dir = pilot_dir(dir.path());
        std::fs::create_dir_all(&pilot_dir).unwrap();
        std::fs::write(
            pilot_dir.join("autopilot.toml"),
            "[run]\ncount = 4\nretry_delay_ms = 10\n\n[pause]\nnotify_cmd = \"say\"\n",
        )
        .unwrap();
        let pilot = PilotConfig::from_file(dir.path().to_path_buf()).unwrap();
        let config = RunConfig::from_pilot("pop", &pilot);
        assert_eq!(config.count, 4);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert_eq!(config.notify_cmd.as_deref(), Some("say"));
        assert!(config.paths.checkpoint.ends_with(".autopilot/checkpoint.json"));
    }

    #[test]
    fn test_resume_instruction_names_signal() {
        let dir = tempdir().unwrap();
        let config = RunConfig::new("pop", dir.path());
        let text = config.resume_instruction();
        assert!(text.contains("autopilot resume-signal"));
        assert!(text.contains("resume.signal"));
    }

    #[test]
    fn test_negative_hours_are_ignored() {
        assert!(hours_to_duration(-1.0).is_none());
        assert!(hours_to_duration(f64::NAN).is_none());
        assert_eq!(hours_to_duration(0.0), Some(Duration::ZERO));
    }

    #[test]
    fn test_oversized_hours_do_not_panic() {
        assert!(hours_to_duration(1e300).is_none());
        assert!(hours_to_duration(f64::MAX).is_none());

        let dir = tempdir().unwrap();
        let mut config = RunConfig::new("pop", dir.path());
        RunOverrides {
            max_hours: Some(1e300),
            ..Default::default()
        }
        .apply(&mut config);
        assert!(config.max_runtime.is_none());
    }
}
