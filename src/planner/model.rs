//! Planner backed by an external model CLI.
//!
//! The prompt is written to the command's stdin and the reply is expected to
//! contain one JSON object with the fields below. Missing fields get the same
//! fallbacks the template planner would use; tuning values are clamped.
//!
//! ```json
//! {"title": "...", "lyrics": "...", "styles": "...",
//!  "weirdness": 40, "style_influence": 70, "mastering_profile": "radio_ready"}
//! ```

use super::{PlannedSpec, SpecPlanner};
use crate::errors::PlanningError;
use crate::spec::{JobSpec, KNOWN_PROFILES, normalize_profile};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Default model CLI.
pub const DEFAULT_MODEL_CMD: &str = "claude";

/// How to reach the model.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Model identifier. `None` means the planner is not configured.
    pub model: Option<String>,
    pub command: String,
    pub timeout: Duration,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: None,
            command: DEFAULT_MODEL_CMD.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ModelReply {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    lyrics: Option<String>,
    #[serde(default)]
    styles: Option<String>,
    #[serde(default)]
    weirdness: Option<Value>,
    #[serde(default)]
    style_influence: Option<Value>,
    #[serde(default)]
    mastering_profile: Option<String>,
}

/// Accept numbers or numeric strings.
fn as_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Turn a raw model reply into a spec.
pub(crate) fn parse_reply(raw: &str, intent: &str, index: usize) -> Result<PlannedSpec, PlanningError> {
    let cleaned = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => {
            return Err(PlanningError::InvalidResponse(
                "reply contains no JSON object".into(),
            ));
        }
    };

    let reply: ModelReply = serde_json::from_str(cleaned)
        .map_err(|e| PlanningError::InvalidResponse(e.to_string()))?;

    let lyrics = non_empty(reply.lyrics).unwrap_or_else(|| format!("{} instrumental", intent));
    let styles = non_empty(reply.styles).unwrap_or_else(|| intent.to_string());
    let title = non_empty(reply.title).unwrap_or_else(|| format!("{} Session {}", intent, index + 1));
    let weirdness = as_int(reply.weirdness.as_ref()).unwrap_or(40);
    let influence = as_int(reply.style_influence.as_ref()).unwrap_or(70);
    let profile = normalize_profile(reply.mastering_profile.as_deref().unwrap_or_default());

    Ok(PlannedSpec {
        spec: JobSpec::new(lyrics, styles)
            .with_title(title)
            .with_tuning(weirdness, influence),
        profile,
    })
}

pub struct ModelPlanner {
    settings: ModelSettings,
}

impl ModelPlanner {
    pub fn new(settings: ModelSettings) -> Self {
        Self { settings }
    }

    /// Check configuration without calling the model.
    pub fn readiness(&self) -> Result<&str, PlanningError> {
        match self.settings.model.as_deref() {
            Some(m) if !m.trim().is_empty() => Ok(m),
            _ => Err(PlanningError::NotConfigured {
                planner: "model".into(),
                reason: "AUTOPILOT_MODEL is not set and no --model was provided".into(),
            }),
        }
    }

    fn build_prompt(intent: &str, index: usize) -> String {
        format!(
            "Plan one song for an autonomous create-master-export run.\n\n\
             Music type: {}\n\
             Iteration: {}\n\n\
             Respond with a single JSON object only, with keys:\n\
             title, lyrics, styles, weirdness (0-100), style_influence (0-100), \
             mastering_profile (one of: {}).\n\
             Lyrics should use [Verse]/[Chorus] section tags.",
            intent,
            index + 1,
            KNOWN_PROFILES.join(", ")
        )
    }

    async fn call_model(&self, model: &str, prompt: &str) -> Result<String, PlanningError> {
        let mut child = Command::new(&self.settings.command)
            .args(["--print", "--model", model])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PlanningError::ModelCallFailed(format!(
                    "failed to spawn '{}': {}",
                    self.settings.command, e
                ))
            })?;

        let stdin = child.stdin.take();
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                stdin
                    .write_all(prompt.as_bytes())
                    .await
                    .map_err(|e| PlanningError::ModelCallFailed(format!("stdin write: {}", e)))?;
                stdin
                    .shutdown()
                    .await
                    .map_err(|e| PlanningError::ModelCallFailed(format!("stdin close: {}", e)))?;
            }
            child
                .wait_with_output()
                .await
                .map_err(|e| PlanningError::ModelCallFailed(e.to_string()))
        };

        let output = tokio::time::timeout(self.settings.timeout, exchange)
            .await
            .map_err(|_| {
                PlanningError::ModelCallFailed(format!(
                    "timed out after {:.1}s",
                    self.settings.timeout.as_secs_f64()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlanningError::ModelCallFailed(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SpecPlanner for ModelPlanner {
    fn name(&self) -> &str {
        "model"
    }

    async fn generate(&self, intent: &str, index: usize) -> Result<PlannedSpec, PlanningError> {
        let model = self.readiness()?;
        let prompt = Self::build_prompt(intent, index);
        debug!(model, index, "calling model planner");
        let reply = self.call_model(model, &prompt).await?;
        parse_reply(&reply, intent, index)
    }
}
