//! The autopilot state machine.
//!
//! Jobs run strictly one at a time through `plan → create → wait →
//! master_export → done`. State is checkpointed after every transition and
//! the checkpoint is removed only once every job has finished.

use super::checkpoint::{CheckpointLoad, CheckpointStore};
use super::signal::{ResumeSignal, StopSignal};
use super::state::{JobPhase, OrchestratorState};
use super::summary::{JobRow, JobStatus};
use crate::audit::{Event, EventKind, JsonlLog, Phase2Artifact};
use crate::config::RunConfig;
use crate::errors::{AutopilotError, RunFailure};
use crate::executor::{StepExecutor, StepOutcome, is_blocking};
use crate::phase2::{Phase2Coordinator, score_spec};
use crate::planner::{FallbackNote, PlannedSpec, PlannerChain};
use crate::ui::PilotUI;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a run ended without a fatal error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every job finished; the checkpoint was cleared.
    #[default]
    Completed,
    /// Stop requested, runtime limit hit, or a step failed with
    /// `continue_on_error` off. The checkpoint is kept.
    Stopped { reason: String },
    /// A blocking condition was hit while pausing is disabled.
    Blocked { reason: String },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Per-job summary plus the state the run ended in.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub rows: Vec<JobRow>,
    pub final_state: OrchestratorState,
    pub outcome: RunOutcome,
}

enum JobEnd {
    /// The job completed or was abandoned; move on.
    Finished,
    /// Leave the loop with this outcome.
    Halt(RunOutcome),
}

enum StepResult {
    Succeeded(String),
    Failed(String),
    Halted(RunOutcome),
}

/// Drives a run. Construct once per run.
pub struct Autopilot {
    config: RunConfig,
    planner: PlannerChain,
    executor: Arc<dyn StepExecutor>,
    events: JsonlLog,
    artifacts: JsonlLog,
    checkpoint: CheckpointStore,
    resume: ResumeSignal,
    stop: StopSignal,
    ui: Option<Arc<PilotUI>>,
    run_id: Uuid,
}

impl Autopilot {
    pub fn new(config: RunConfig, planner: PlannerChain, executor: Arc<dyn StepExecutor>) -> Self {
        let events = JsonlLog::new(config.paths.events.clone());
        let artifacts = JsonlLog::new(config.paths.artifacts.clone());
        let checkpoint = CheckpointStore::new(config.paths.checkpoint.clone());
        let resume = ResumeSignal::new(config.paths.resume_signal.clone());
        Self {
            config,
            planner,
            executor,
            events,
            artifacts,
            checkpoint,
            resume,
            stop: StopSignal::new(),
            ui: None,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_ui(mut self, ui: Arc<PilotUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run until every job has finished or the run halts.
    ///
    /// Planning failures and checkpoint I/O failures are fatal and come back
    /// as [`RunFailure`] with the summary gathered so far.
    pub async fn run(&self) -> Result<RunReport, RunFailure> {
        let started = Instant::now();
        let mut report = RunReport::default();

        let mut state = match self.initial_state() {
            Ok(state) => state,
            Err(error) => return Err(RunFailure { error, report }),
        };

        match self.resume.clear() {
            Ok(true) => debug!("removed stale resume flag"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "could not remove stale resume flag"),
        }

        self.record(
            Event::new(self.run_id, EventKind::RunStarted, state.song_index)
                .with_detail("intent", self.config.intent.as_str())
                .with_detail("count", self.config.count)
                .with_detail("phase", state.phase.as_str())
                .with_detail("planners", self.planner.names())
                .with_detail("phase2", self.config.phase2)
                .with_detail("executor", self.executor.name()),
        );
        info!(
            intent = %self.config.intent,
            count = self.config.count,
            song_index = state.song_index,
            phase = %state.phase,
            "autopilot run started"
        );
        if let Some(ui) = &self.ui {
            ui.set_finished(state.song_index.min(self.config.count) as u64);
        }

        while state.song_index < self.config.count {
            if let Some(reason) = self.halt_reason(started) {
                report.outcome = RunOutcome::Stopped { reason };
                break;
            }

            if let Some(ui) = &self.ui {
                ui.start_job(state.song_index + 1, self.config.count);
            }

            match self.run_job(&mut state, &mut report).await {
                Ok(JobEnd::Finished) => {}
                Ok(JobEnd::Halt(outcome)) => {
                    report.outcome = outcome;
                    break;
                }
                Err(error) => {
                    report.final_state = state;
                    return Err(RunFailure { error, report });
                }
            }
        }

        if state.song_index >= self.config.count {
            if let Err(error) = self.checkpoint.clear() {
                report.final_state = state;
                return Err(RunFailure { error, report });
            }
            report.outcome = RunOutcome::Completed;
            self.record(
                Event::new(self.run_id, EventKind::RunFinished, state.song_index)
                    .with_detail("jobs", report.rows.len()),
            );
            info!(jobs = report.rows.len(), "autopilot run finished");
        } else {
            let reason = match &report.outcome {
                RunOutcome::Stopped { reason } | RunOutcome::Blocked { reason } => reason.clone(),
                RunOutcome::Completed => String::new(),
            };
            self.record(
                Event::new(self.run_id, EventKind::RunStopped, state.song_index)
                    .with_message(reason.as_str())
                    .with_detail("phase", state.phase.as_str()),
            );
            warn!(song_index = state.song_index, phase = %state.phase, %reason, "autopilot run stopped");
            if let Some(ui) = &self.ui {
                ui.show_stopped(&reason);
            }
        }

        report.final_state = state;
        Ok(report)
    }

    /// Fresh state, or the checkpointed one when resuming a matching run.
    fn initial_state(&self) -> Result<OrchestratorState, AutopilotError> {
        if self.config.resume {
            let discarded = match self.checkpoint.inspect(&self.config.descriptor()) {
                CheckpointLoad::Loaded(state) => {
                    info!(song_index = state.song_index, phase = %state.phase, "resuming from checkpoint");
                    self.record(
                        Event::new(self.run_id, EventKind::Resumed, state.song_index)
                            .with_title(state.title())
                            .with_detail("phase", state.phase.as_str()),
                    );
                    return Ok(state);
                }
                CheckpointLoad::Missing => None,
                CheckpointLoad::IntentMismatch { stored_intent } => Some(format!(
                    "checkpoint belongs to intent '{}'",
                    stored_intent
                )),
                CheckpointLoad::Corrupt(reason) => Some(reason),
            };

            if let Some(reason) = discarded {
                warn!(%reason, "ignoring checkpoint, starting fresh");
                self.record(
                    Event::new(self.run_id, EventKind::CheckpointDiscarded, 0).with_message(reason),
                );
            }
        }

        let state = OrchestratorState::new();
        self.checkpoint.save(&self.config.descriptor(), &state)?;
        Ok(state)
    }

    fn halt_reason(&self, started: Instant) -> Option<String> {
        if self.stop.is_requested() {
            return Some("stop requested".to_string());
        }
        if let Some(limit) = self.config.max_runtime
            && started.elapsed() >= limit
        {
            return Some(format!(
                "runtime limit of {:.2}h reached",
                limit.as_secs_f64() / 3600.0
            ));
        }
        None
    }

    /// Drive the current job from its checkpointed phase to the end.
    async fn run_job(
        &self,
        state: &mut OrchestratorState,
        report: &mut RunReport,
    ) -> Result<JobEnd, AutopilotError> {
        let mut last_message = String::new();

        loop {
            self.record(
                Event::new(self.run_id, EventKind::PhaseStarted, state.song_index)
                    .with_title(state.title())
                    .with_detail("phase", state.phase.as_str()),
            );
            if let Some(ui) = &self.ui {
                ui.start_phase(state.phase, state.title());
            }

            match state.phase {
                JobPhase::Plan => {
                    self.plan(state).await?;
                    self.save(state)?;
                }
                JobPhase::Create | JobPhase::MasterExport => {
                    match self.run_step(state).await? {
                        StepResult::Succeeded(message) => {
                            last_message = message;
                            state.advance();
                            // `done` is never persisted; the job completes below.
                            if state.phase != JobPhase::Done {
                                self.save(state)?;
                            }
                        }
                        StepResult::Failed(message) => {
                            return self.abandon(state, report, message).await;
                        }
                        StepResult::Halted(outcome) => return Ok(JobEnd::Halt(outcome)),
                    }
                }
                JobPhase::Wait => {
                    if let Some(ui) = &self.ui {
                        ui.show_waiting(self.config.wait_phase.as_secs());
                    }
                    tokio::time::sleep(self.config.wait_phase).await;
                    state.advance();
                    self.save(state)?;
                }
                JobPhase::Done => {
                    self.complete(state, report, last_message).await?;
                    return Ok(JobEnd::Finished);
                }
            }
        }
    }

    async fn plan(&self, state: &mut OrchestratorState) -> Result<(), AutopilotError> {
        let index = state.song_index;
        let (planned, planner, fallbacks) = if self.config.phase2 {
            let coordinator = Phase2Coordinator::new(self.planner.clone());
            match coordinator
                .build_plan(&self.config.intent, index, self.config.candidate_count)
                .await
            {
                Ok(plan) => {
                    self.record_artifacts(&plan.artifacts);
                    (
                        plan.planned,
                        format!("phase2 candidate {}", plan.selected),
                        plan.fallbacks,
                    )
                }
                Err(AutopilotError::NoViablePlan {
                    requested,
                    artifacts,
                }) => {
                    self.record_artifacts(&artifacts);
                    return Err(AutopilotError::NoViablePlan {
                        requested,
                        artifacts,
                    });
                }
                Err(e) => return Err(e),
            }
        } else {
            let outcome = self.planner.generate(&self.config.intent, index).await?;
            (outcome.planned, outcome.planner, outcome.fallbacks)
        };

        self.record_fallbacks(index, &fallbacks);

        let PlannedSpec { spec, profile } = planned;
        let title = spec.display_title();
        let score = score_spec(&spec);
        info!(song_index = index, %title, %profile, %planner, "job planned");
        if let Some(ui) = &self.ui {
            ui.show_plan(&title, &profile, &planner);
        }
        self.record(
            Event::new(self.run_id, EventKind::Planned, index)
                .with_title(spec.title.as_deref())
                .with_detail("profile", profile.as_str())
                .with_detail("planner", planner.as_str())
                .with_detail("score", score),
        );

        state.record_plan(spec, profile);
        Ok(())
    }

    /// Run the current step with retries. Blocking failures pause and retry
    /// the same step without using up an attempt.
    async fn run_step(&self, state: &mut OrchestratorState) -> Result<StepResult, AutopilotError> {
        let phase = state.phase;
        let spec = state
            .spec
            .clone()
            .ok_or_else(|| anyhow!("phase '{}' reached without a planned spec", phase))?;
        let max_attempts = self.config.max_attempts();
        let mut failures = 0u32;

        loop {
            let outcome = match phase {
                JobPhase::Create => self.executor.execute_primary(&spec).await,
                JobPhase::MasterExport => {
                    self.executor
                        .execute_secondary(&state.profile, self.config.export_mode)
                        .await
                }
                other => return Err(anyhow!("'{}' is not an executor step", other).into()),
            };
            let StepOutcome { success, message } = outcome;

            if success {
                debug!(song_index = state.song_index, %phase, %message, "step succeeded");
                return Ok(StepResult::Succeeded(message));
            }

            if is_blocking(&message, &self.config.blocking_markers) {
                state.last_error = Some(message.clone());
                self.save(state)?;
                match self.pause(state, &message).await {
                    None => continue,
                    Some(outcome) => return Ok(StepResult::Halted(outcome)),
                }
            }

            failures += 1;
            warn!(
                song_index = state.song_index,
                %phase,
                attempt = failures,
                max_attempts,
                %message,
                "step attempt failed"
            );
            self.record(
                Event::new(self.run_id, EventKind::StepAttemptFailed, state.song_index)
                    .with_title(state.title())
                    .with_message(message.as_str())
                    .with_detail("phase", phase.as_str())
                    .with_detail("attempt", failures)
                    .with_detail("max_attempts", max_attempts),
            );
            if let Some(ui) = &self.ui {
                ui.attempt_failed(phase, failures, max_attempts, &message);
            }

            if failures >= max_attempts {
                return Ok(StepResult::Failed(message));
            }
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// Wait for the operator. `None` means resume; `Some` ends the run.
    async fn pause(&self, state: &OrchestratorState, reason: &str) -> Option<RunOutcome> {
        if !self.config.pause_on_blocking {
            return Some(RunOutcome::Blocked {
                reason: format!(
                    "blocking condition during {}: {}. Resolve it, then rerun with --resume",
                    state.phase, reason
                ),
            });
        }

        let instruction = self.config.resume_instruction();
        warn!(song_index = state.song_index, phase = %state.phase, %reason, "paused on blocking condition");
        self.record(
            Event::new(self.run_id, EventKind::BlockingPause, state.song_index)
                .with_title(state.title())
                .with_message(reason)
                .with_detail("phase", state.phase.as_str())
                .with_detail(
                    "resume_file",
                    self.resume.path().display().to_string(),
                )
                .with_detail("instruction", instruction.as_str()),
        );
        if let Some(ui) = &self.ui {
            ui.show_pause(reason, &instruction);
        }
        if let Some(cmd) = &self.config.notify_cmd {
            notify(cmd, &instruction).await;
        }

        if !self
            .resume
            .wait_for_resume(self.config.poll_interval, &self.stop)
            .await
        {
            return Some(RunOutcome::Stopped {
                reason: "stop requested while paused".to_string(),
            });
        }

        info!(song_index = state.song_index, phase = %state.phase, "resume signal received");
        self.record(
            Event::new(self.run_id, EventKind::BlockingResume, state.song_index)
                .with_title(state.title())
                .with_detail("phase", state.phase.as_str()),
        );
        if let Some(ui) = &self.ui {
            ui.show_resumed();
        }
        None
    }

    /// A step ran out of attempts.
    async fn abandon(
        &self,
        state: &mut OrchestratorState,
        report: &mut RunReport,
        message: String,
    ) -> Result<JobEnd, AutopilotError> {
        let phase = state.phase;
        let (kind, status) = match phase {
            JobPhase::Create => (EventKind::CreateFailed, JobStatus::FailedCreate),
            _ => (EventKind::MasterExportFailed, JobStatus::FailedMasterExport),
        };
        let number = state.song_index + 1;
        let title = state
            .spec
            .as_ref()
            .map(|s| s.display_title())
            .unwrap_or_else(|| "-".to_string());

        report.rows.push(JobRow {
            index: number,
            title,
            status,
            message: message.clone(),
        });
        self.record(
            Event::new(self.run_id, kind, state.song_index)
                .with_title(state.title())
                .with_message(message.as_str()),
        );
        if let Some(ui) = &self.ui {
            ui.job_failed(number, phase, &message);
        }

        state.last_error = Some(message.clone());
        if !self.config.continue_on_error {
            self.save(state)?;
            return Ok(JobEnd::Halt(RunOutcome::Stopped {
                reason: format!("job {} failed at {}: {}", number, phase, message),
            }));
        }

        state.next_job();
        self.save(state)?;
        self.wait_between_jobs(state).await;
        Ok(JobEnd::Finished)
    }

    async fn complete(
        &self,
        state: &mut OrchestratorState,
        report: &mut RunReport,
        message: String,
    ) -> Result<(), AutopilotError> {
        let number = state.song_index + 1;
        let title = state
            .spec
            .as_ref()
            .map(|s| s.display_title())
            .unwrap_or_else(|| "-".to_string());

        self.record(
            Event::new(self.run_id, EventKind::SongCompleted, state.song_index)
                .with_title(state.title())
                .with_message(message.as_str())
                .with_detail("profile", state.profile.as_str()),
        );
        info!(song_index = state.song_index, %title, "job completed");
        if let Some(ui) = &self.ui {
            ui.job_complete(number, &title);
        }
        report.rows.push(JobRow {
            index: number,
            title,
            status: JobStatus::Ok,
            message,
        });

        state.next_job();
        self.save(state)?;
        self.wait_between_jobs(state).await;
        Ok(())
    }

    /// Inter-job delay after a completed or abandoned job, skipped after the last one.
    async fn wait_between_jobs(&self, state: &OrchestratorState) {
        if state.song_index < self.config.count && !self.config.wait_between_jobs.is_zero() {
            if let Some(ui) = &self.ui {
                ui.show_waiting(self.config.wait_between_jobs.as_secs());
            }
            tokio::time::sleep(self.config.wait_between_jobs).await;
        }
    }

    fn save(&self, state: &OrchestratorState) -> Result<(), AutopilotError> {
        self.checkpoint.save(&self.config.descriptor(), state)
    }

    fn record(&self, event: Event) {
        if let Err(e) = self.events.append(&event) {
            warn!(event = %event.event, error = %e, "failed to append event");
        }
    }

    fn record_artifacts(&self, artifacts: &[Phase2Artifact]) {
        if let Err(e) = self.artifacts.append_all(artifacts) {
            warn!(error = %e, "failed to append phase2 artifacts");
        }
    }

    fn record_fallbacks(&self, index: usize, fallbacks: &[FallbackNote]) {
        for note in fallbacks {
            self.record(
                Event::new(self.run_id, EventKind::PlannerFallback, index)
                    .with_message(note.error.to_string())
                    .with_detail("planner", note.planner.as_str()),
            );
        }
    }
}

/// Run the operator notification hook. Failures only warn.
async fn notify(cmd: &str, instruction: &str) {
    let result = tokio::time::timeout(
        Duration::from_secs(30),
        Command::new("sh")
            .arg("-c")
            .arg(format!("{} \"$1\"", cmd))
            .arg("autopilot-notify")
            .arg(instruction)
            .kill_on_drop(true)
            .status(),
    )
    .await;

    match result {
        Ok(Ok(status)) if status.success() => debug!("notify command ran"),
        Ok(Ok(status)) => warn!(%status, "notify command failed"),
        Ok(Err(e)) => warn!(error = %e, "could not run notify command"),
        Err(_) => warn!("notify command timed out"),
    }
}
