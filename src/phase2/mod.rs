//! Phase-2 planning: several candidate specs generated concurrently, scored,
//! and one selected, with a discover/design/decide audit trail.

pub mod coordinator;
pub mod scorer;

pub use coordinator::{OBJECTIVE, Phase2Coordinator, Phase2Plan};
pub use scorer::{FAILED_CANDIDATE_SCORE, MAX_SCORE, score_spec};

use crate::spec::JobSpec;
use serde::{Deserialize, Serialize};

/// One planner result competing for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// 1-based position in the round.
    pub ordinal: usize,
    pub spec: Option<JobSpec>,
    pub profile: Option<String>,
    pub score: f64,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planner: Option<String>,
}

impl Candidate {
    pub fn planned(
        ordinal: usize,
        spec: JobSpec,
        profile: impl Into<String>,
        planner: impl Into<String>,
    ) -> Self {
        let score = score_spec(&spec);
        Self {
            ordinal,
            spec: Some(spec),
            profile: Some(profile.into()),
            score,
            error: None,
            planner: Some(planner.into()),
        }
    }

    pub fn failed(ordinal: usize, error: impl Into<String>) -> Self {
        Self {
            ordinal,
            spec: None,
            profile: None,
            score: FAILED_CANDIDATE_SCORE,
            error: Some(error.into()),
            planner: None,
        }
    }

    pub fn is_viable(&self) -> bool {
        self.error.is_none() && self.spec.is_some()
    }
}

/// Position of the winning candidate: highest score, lowest ordinal on ties.
/// Failed candidates are never chosen.
pub fn select_best(candidates: &[Candidate]) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (pos, candidate) in candidates.iter().enumerate() {
        if !candidate.is_viable() {
            continue;
        }
        best = match best {
            None => Some(pos),
            Some(current) => {
                let incumbent = &candidates[current];
                if candidate.score > incumbent.score
                    || (candidate.score == incumbent.score && candidate.ordinal < incumbent.ordinal)
                {
                    Some(pos)
                } else {
                    Some(current)
                }
            }
        };
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(ordinal: usize, score: f64) -> Candidate {
        let mut c = Candidate::planned(ordinal, JobSpec::new("l", "s"), "flat", "template");
        c.score = score;
        c
    }

    #[test]
    fn test_select_first_of_tied_maximum() {
        let candidates: Vec<Candidate> = [2.0, 3.5, 3.5, 1.0]
            .iter()
            .enumerate()
            .map(|(i, s)| scored(i + 1, *s))
            .collect();
        for _ in 0..10 {
            assert_eq!(select_best(&candidates), Some(1));
        }
    }

    #[test]
    fn test_tie_break_uses_ordinal_not_position() {
        let candidates = vec![scored(3, 4.0), scored(2, 4.0)];
        assert_eq!(select_best(&candidates), Some(1));
    }

    #[test]
    fn test_failed_candidates_are_skipped() {
        let candidates = vec![Candidate::failed(1, "boom"), scored(2, 0.5)];
        assert_eq!(select_best(&candidates), Some(1));
    }

    #[test]
    fn test_no_viable_candidates() {
        let candidates = vec![Candidate::failed(1, "a"), Candidate::failed(2, "b")];
        assert_eq!(select_best(&candidates), None);
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn test_failed_candidate_shape() {
        let c = Candidate::failed(2, "not configured");
        assert_eq!(c.score, -1.0);
        assert!(!c.is_viable());
        let value = serde_json::to_value(&c).unwrap();
        assert!(value["spec"].is_null());
        assert_eq!(value["error"], "not configured");
    }
}
