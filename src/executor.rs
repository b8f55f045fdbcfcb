//! External step execution.
//!
//! The orchestrator drives two opaque actions per job through a
//! [`StepExecutor`]: the primary `create` step and the secondary
//! `master_export` step. Each returns a [`StepOutcome`]; the only part of a
//! failure the orchestrator inspects is whether its message carries a
//! blocking marker.

use crate::spec::{ExportMode, JobSpec};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub success: bool,
    pub message: String,
}

impl StepOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute_primary(&self, spec: &JobSpec) -> StepOutcome;

    async fn execute_secondary(&self, profile: &str, export_mode: ExportMode) -> StepOutcome;
}

/// Case-insensitive check for any configured blocking marker.
pub fn is_blocking(message: &str, markers: &[String]) -> bool {
    let lower = message.to_lowercase();
    markers
        .iter()
        .filter(|m| !m.trim().is_empty())
        .any(|m| lower.contains(&m.to_lowercase()))
}

/// Executor that succeeds without touching anything.
#[derive(Debug, Default, Clone)]
pub struct DryRunExecutor;

#[async_trait]
impl StepExecutor for DryRunExecutor {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn execute_primary(&self, spec: &JobSpec) -> StepOutcome {
        StepOutcome::ok(format!("dry run: would create '{}'", spec.display_title()))
    }

    async fn execute_secondary(&self, profile: &str, export_mode: ExportMode) -> StepOutcome {
        StepOutcome::ok(format!(
            "dry run: would export {} with profile {}",
            export_mode, profile
        ))
    }
}

/// Executor that shells out to user-configured commands.
///
/// `create_cmd` receives the job spec as JSON on stdin. `export_cmd` receives
/// the profile and export mode as `AUTOPILOT_PROFILE` and
/// `AUTOPILOT_EXPORT_MODE`. Exit code 0 is success; the message is the last
/// non-empty line of output.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    pub create_cmd: String,
    pub export_cmd: String,
    pub working_dir: PathBuf,
    pub timeout: Duration,
}

impl CommandExecutor {
    pub fn new(
        create_cmd: impl Into<String>,
        export_cmd: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            create_cmd: create_cmd.into(),
            export_cmd: export_cmd.into(),
            working_dir: working_dir.into(),
            timeout,
        }
    }

    async fn run_shell(&self, command: &str, stdin: Option<String>, env: &[(&str, String)]) -> StepOutcome {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return StepOutcome::failed(format!("failed to spawn '{}': {}", command, e)),
        };

        let stdin_pipe = child.stdin.take();
        let exchange = async move {
            if let Some(input) = stdin
                && let Some(mut pipe) = stdin_pipe
            {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    debug!(error = %e, "step command closed stdin early");
                }
                drop(pipe);
            }
            child.wait_with_output().await
        };

        // Covers the stdin write too: a command that never reads would
        // otherwise block the write forever.
        let output = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return StepOutcome::failed(format!("step command failed: {}", e)),
            Err(_) => {
                return StepOutcome::failed(format!(
                    "step command timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = last_line(&stdout)
            .or_else(|| last_line(&stderr))
            .unwrap_or_else(|| format!("exited with {}", output.status));

        debug!(command, status = %output.status, message = %message, "step command finished");

        if output.status.success() {
            StepOutcome::ok(message)
        } else {
            StepOutcome::failed(message)
        }
    }
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl StepExecutor for CommandExecutor {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute_primary(&self, spec: &JobSpec) -> StepOutcome {
        let json = match serde_json::to_string(spec) {
            Ok(json) => json,
            Err(e) => return StepOutcome::failed(format!("could not encode spec: {}", e)),
        };
        let env = [("AUTOPILOT_TITLE", spec.display_title().to_string())];
        self.run_shell(&self.create_cmd, Some(json), &env).await
    }

    async fn execute_secondary(&self, profile: &str, export_mode: ExportMode) -> StepOutcome {
        let env = [
            ("AUTOPILOT_PROFILE", profile.to_string()),
            ("AUTOPILOT_EXPORT_MODE", export_mode.to_string()),
        ];
        self.run_shell(&self.export_cmd, None, &env).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["captcha".into(), "verify you are human".into()]
    }

    #[test]
    fn test_blocking_detection_is_case_insensitive() {
        assert!(is_blocking("CAPTCHA challenge shown", &markers()));
        assert!(is_blocking("Please Verify You Are Human", &markers()));
        assert!(!is_blocking("button not found", &markers()));
    }

    #[test]
    fn test_blank_markers_never_match() {
        assert!(!is_blocking("anything", &["".into(), "  ".into()]));
        assert!(!is_blocking("anything", &[]));
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("a\nb\n\n  \n").as_deref(), Some("b"));
        assert_eq!(last_line("\n\n"), None);
    }

    #[tokio::test]
    async fn test_dry_run_always_succeeds() {
        let exec = DryRunExecutor;
        let spec = JobSpec::new("l", "s").with_title("Dry");
        assert!(exec.execute_primary(&spec).await.success);
        let out = exec.execute_secondary("lo_fi", ExportMode::Multitrack).await;
        assert!(out.success);
        assert!(out.message.contains("multitrack"));
    }

    #[cfg(unix)]
    fn executor(create: &str, export: &str) -> CommandExecutor {
        CommandExecutor::new(create, export, std::env::temp_dir(), Duration::from_secs(10))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_create_receives_spec_on_stdin() {
        let exec = executor("grep -q '\"title\":\"Piped\"' && echo created", "true");
        let spec = JobSpec::new("words", "pop").with_title("Piped");
        let out = exec.execute_primary(&spec).await;
        assert_eq!(out, StepOutcome::ok("created"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_export_receives_env() {
        let exec = executor("true", "echo \"$AUTOPILOT_PROFILE/$AUTOPILOT_EXPORT_MODE\"");
        let out = exec.execute_secondary("bass_heavy", ExportMode::Full).await;
        assert_eq!(out, StepOutcome::ok("bass_heavy/full"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure_with_last_line() {
        let exec = executor("echo working; echo captcha detected >&2; exit 3", "true");
        let out = exec.execute_primary(&JobSpec::new("l", "s")).await;
        assert!(!out.success);
        assert_eq!(out.message, "captcha detected");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_failure() {
        let mut exec = executor("sleep 5", "true");
        exec.timeout = Duration::from_millis(50);
        let out = exec.execute_primary(&JobSpec::new("l", "s")).await;
        assert!(!out.success);
        assert!(out.message.contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_covers_unread_stdin() {
        let mut exec = executor("sleep 5", "true");
        exec.timeout = Duration::from_millis(200);
        // Far larger than a pipe buffer, so the write cannot complete.
        let spec = JobSpec::new("la ".repeat(100_000), "pop");

        let started = std::time::Instant::now();
        let out = exec.execute_primary(&spec).await;

        assert!(!out.success);
        assert!(out.message.contains("timed out"), "{}", out.message);
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
