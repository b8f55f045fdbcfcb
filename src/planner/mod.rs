//! Spec planners.
//!
//! A planner turns a high-level intent and an iteration index into a concrete
//! [`JobSpec`] plus a mastering profile. Two implementations exist behind the
//! [`SpecPlanner`] trait:
//!
//! | Planner           | Backing                      | Can fail |
//! |-------------------|------------------------------|----------|
//! | `TemplatePlanner` | built-in genre presets       | never    |
//! | `ModelPlanner`    | external model CLI           | yes      |
//!
//! The run picks a [`PlannerStrategy`] once; [`PlannerChain`] expresses it as
//! an ordered list of planners tried until one succeeds.

pub mod model;
pub mod template;

pub use model::{ModelPlanner, ModelSettings};
pub use template::TemplatePlanner;

use crate::errors::PlanningError;
use crate::spec::JobSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Output of a single planner invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSpec {
    pub spec: JobSpec,
    pub profile: String,
}

/// Produces a job spec for `(intent, index)`.
///
/// Implementations must not mutate shared state; they may call out to
/// external services.
#[async_trait]
pub trait SpecPlanner: Send + Sync {
    /// Short identifier used in events and artifacts.
    fn name(&self) -> &str;

    async fn generate(&self, intent: &str, index: usize) -> Result<PlannedSpec, PlanningError>;
}

/// Which planners a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerStrategy {
    /// Model planner first, template on any planning error.
    #[default]
    Auto,
    Template,
    Model,
}

impl std::fmt::Display for PlannerStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlannerStrategy::Auto => write!(f, "auto"),
            PlannerStrategy::Template => write!(f, "template"),
            PlannerStrategy::Model => write!(f, "model"),
        }
    }
}

impl std::str::FromStr for PlannerStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(PlannerStrategy::Auto),
            "template" => Ok(PlannerStrategy::Template),
            "model" => Ok(PlannerStrategy::Model),
            _ => anyhow::bail!(
                "Invalid planner '{}'. Valid values: auto, template, model",
                s
            ),
        }
    }
}

/// A planner that failed before a later one in the chain succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackNote {
    pub planner: String,
    pub error: PlanningError,
}

/// Result of running the chain.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub planned: PlannedSpec,
    /// Name of the planner that produced the spec.
    pub planner: String,
    pub fallbacks: Vec<FallbackNote>,
}

/// Ordered fallback list of planners.
#[derive(Clone)]
pub struct PlannerChain {
    links: Vec<Arc<dyn SpecPlanner>>,
}

impl PlannerChain {
    pub fn new(links: Vec<Arc<dyn SpecPlanner>>) -> Self {
        Self { links }
    }

    pub fn single(planner: Arc<dyn SpecPlanner>) -> Self {
        Self::new(vec![planner])
    }

    /// Build the chain for a strategy.
    pub fn from_strategy(strategy: PlannerStrategy, model: ModelSettings) -> Self {
        let template: Arc<dyn SpecPlanner> = Arc::new(TemplatePlanner::new());
        let model: Arc<dyn SpecPlanner> = Arc::new(ModelPlanner::new(model));
        match strategy {
            PlannerStrategy::Template => Self::new(vec![template]),
            PlannerStrategy::Model => Self::new(vec![model]),
            PlannerStrategy::Auto => Self::new(vec![model, template]),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.links.iter().map(|p| p.name().to_string()).collect()
    }

    /// Try each planner in order and return the first success.
    ///
    /// Fails with the last planner's error when every link fails.
    pub async fn generate(&self, intent: &str, index: usize) -> Result<ChainOutcome, PlanningError> {
        let mut fallbacks = Vec::new();

        for planner in &self.links {
            match planner.generate(intent, index).await {
                Ok(planned) => {
                    return Ok(ChainOutcome {
                        planned,
                        planner: planner.name().to_string(),
                        fallbacks,
                    });
                }
                Err(error) => {
                    warn!(planner = planner.name(), %error, "planner failed");
                    fallbacks.push(FallbackNote {
                        planner: planner.name().to_string(),
                        error,
                    });
                }
            }
        }

        Err(fallbacks
            .pop()
            .map(|note| note.error)
            .unwrap_or_else(|| PlanningError::Unavailable("planner chain is empty".into())))
    }
}

impl std::fmt::Debug for PlannerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerChain")
            .field("links", &self.names())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Planner that always fails with `NotConfigured`.
    pub struct FailingPlanner;

    #[async_trait]
    impl SpecPlanner for FailingPlanner {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _intent: &str, _index: usize) -> Result<PlannedSpec, PlanningError> {
            Err(PlanningError::NotConfigured {
                planner: "failing".into(),
                reason: "no model".into(),
            })
        }
    }

    /// Planner that returns queued results by call order, recording indices.
    pub struct ScriptedPlanner {
        pub results: Mutex<Vec<Result<PlannedSpec, PlanningError>>>,
        pub seen: Mutex<Vec<usize>>,
    }

    impl ScriptedPlanner {
        pub fn new(results: Vec<Result<PlannedSpec, PlanningError>>) -> Self {
            Self {
                results: Mutex::new(results.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpecPlanner for ScriptedPlanner {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _intent: &str, index: usize) -> Result<PlannedSpec, PlanningError> {
            self.seen.lock().unwrap().push(index);
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(PlanningError::Unavailable("script exhausted".into())))
        }
    }
}
