use super::{Candidate, select_best};
use crate::audit::Phase2Artifact;
use crate::errors::AutopilotError;
use crate::planner::{FallbackNote, PlannedSpec, PlannerChain};
use futures::future::join_all;
use tracing::{debug, info};

/// Objective recorded in every discover artifact.
pub const OBJECTIVE: &str = "create-master-export one song with autonomous settings";

/// Outcome of a successful round.
#[derive(Debug, Clone)]
pub struct Phase2Plan {
    pub planned: PlannedSpec,
    /// Ordinal of the selected candidate.
    pub selected: usize,
    /// Discover, design and decide records, in that order.
    pub artifacts: Vec<Phase2Artifact>,
    pub fallbacks: Vec<FallbackNote>,
}

/// Fans planner invocations out concurrently and picks the best result.
pub struct Phase2Coordinator {
    chain: PlannerChain,
}

impl Phase2Coordinator {
    pub fn new(chain: PlannerChain) -> Self {
        Self { chain }
    }

    /// Run one planning round for job `index`.
    ///
    /// Candidate `i` (0-based) plans with index `index + i`. Every candidate is
    /// awaited; one failing does not cancel the others. Fails with
    /// `NoViablePlan` when no candidate produced a spec, carrying the discover
    /// and design artifacts so they can still be logged.
    pub async fn build_plan(
        &self,
        intent: &str,
        index: usize,
        candidate_count: usize,
    ) -> Result<Phase2Plan, AutopilotError> {
        let requested = candidate_count.max(1);
        let mut artifacts = vec![Phase2Artifact::Discover {
            intent: intent.to_string(),
            index,
            objective: OBJECTIVE.to_string(),
        }];

        let futures: Vec<_> = (0..requested)
            .map(|offset| self.chain.generate(intent, index + offset))
            .collect();
        let results = join_all(futures).await;

        let mut fallbacks = Vec::new();
        let candidates: Vec<Candidate> = results
            .into_iter()
            .enumerate()
            .map(|(pos, result)| {
                let ordinal = pos + 1;
                match result {
                    Ok(outcome) => {
                        fallbacks.extend(outcome.fallbacks);
                        Candidate::planned(
                            ordinal,
                            outcome.planned.spec,
                            outcome.planned.profile,
                            outcome.planner,
                        )
                    }
                    Err(e) => {
                        debug!(ordinal, error = %e, "phase2 candidate failed");
                        Candidate::failed(ordinal, e.to_string())
                    }
                }
            })
            .collect();

        let selected = select_best(&candidates);

        artifacts.push(Phase2Artifact::Design {
            candidate_count: candidates.len(),
            candidates: candidates.clone(),
        });

        let Some(pos) = selected else {
            return Err(AutopilotError::NoViablePlan {
                requested,
                artifacts,
            });
        };

        let best = &candidates[pos];
        let (Some(spec), Some(profile)) = (best.spec.clone(), best.profile.clone()) else {
            return Err(AutopilotError::NoViablePlan {
                requested,
                artifacts,
            });
        };

        info!(
            index,
            selected = best.ordinal,
            score = best.score,
            profile = %profile,
            "phase2 candidate selected"
        );

        artifacts.push(Phase2Artifact::Decide {
            selected_candidate: best.ordinal,
            selected_score: best.score,
            selected_profile: profile.clone(),
            selected_title: spec.title.clone(),
        });

        Ok(Phase2Plan {
            planned: PlannedSpec { spec, profile },
            selected: best.ordinal,
            artifacts,
            fallbacks,
        })
    }
}
