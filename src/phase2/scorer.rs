//! Heuristic completeness score for a job spec.
//!
//! Only the ordering matters: a spec that satisfies more of the checks below
//! scores strictly higher. The weights themselves carry no external meaning.

use crate::spec::JobSpec;
use std::ops::RangeInclusive;

/// Score assigned to a candidate whose planner failed. Never selectable.
pub const FAILED_CANDIDATE_SCORE: f64 = -1.0;

const TITLE_MIN_CHARS: usize = 6;
const STYLES_BAND: RangeInclusive<usize> = 20..=180;
const LYRICS_MIN_CHARS: usize = 120;
const WEIRDNESS_HEALTHY: RangeInclusive<u8> = 10..=80;
const INFLUENCE_HEALTHY: RangeInclusive<u8> = 40..=90;

const TITLE_WEIGHT: f64 = 1.0;
const STYLES_WEIGHT: f64 = 1.5;
const LYRICS_WEIGHT: f64 = 2.0;
const TUNING_HEALTHY_WEIGHT: f64 = 0.75;
const TUNING_PRESENT_WEIGHT: f64 = 0.2;

/// Best possible score.
pub const MAX_SCORE: f64 =
    TITLE_WEIGHT + STYLES_WEIGHT + LYRICS_WEIGHT + 2.0 * TUNING_HEALTHY_WEIGHT;

fn tuning_credit(value: Option<u8>, healthy: RangeInclusive<u8>) -> f64 {
    match value {
        Some(v) if healthy.contains(&v) => TUNING_HEALTHY_WEIGHT,
        Some(_) => TUNING_PRESENT_WEIGHT,
        None => 0.0,
    }
}

/// Deterministic score of a spec.
pub fn score_spec(spec: &JobSpec) -> f64 {
    let mut score = 0.0;

    if spec
        .title
        .as_deref()
        .is_some_and(|t| t.chars().count() >= TITLE_MIN_CHARS)
    {
        score += TITLE_WEIGHT;
    }
    if STYLES_BAND.contains(&spec.styles.chars().count()) {
        score += STYLES_WEIGHT;
    }
    if spec.lyrics.chars().count() >= LYRICS_MIN_CHARS {
        score += LYRICS_WEIGHT;
    }
    score += tuning_credit(spec.weirdness, WEIRDNESS_HEALTHY);
    score += tuning_credit(spec.style_influence, INFLUENCE_HEALTHY);

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_spec() -> JobSpec {
        JobSpec::new("x".repeat(200), "modern pop, catchy hooks")
            .with_title("Night Drive")
            .with_tuning(35, 75)
    }

    #[test]
    fn test_complete_spec_hits_max() {
        assert_eq!(score_spec(&full_spec()), MAX_SCORE);
    }

    #[test]
    fn test_empty_spec_scores_zero() {
        assert_eq!(score_spec(&JobSpec::new("", "")), 0.0);
    }

    #[test]
    fn test_short_title_earns_nothing() {
        let mut spec = full_spec();
        spec.title = Some("Hi".into());
        assert!(score_spec(&spec) < score_spec(&full_spec()));
    }

    #[test]
    fn test_styles_outside_band_lose_credit() {
        let mut short = full_spec();
        short.styles = "pop".into();
        let mut long = full_spec();
        long.styles = "a".repeat(181);
        assert!(score_spec(&short) < score_spec(&full_spec()));
        assert_eq!(score_spec(&short), score_spec(&long));
    }

    #[test]
    fn test_unhealthy_tuning_beats_missing_tuning() {
        let healthy = full_spec();
        let unhealthy = full_spec().with_tuning(95, 10);
        let mut missing = full_spec();
        missing.weirdness = None;
        missing.style_influence = None;

        assert!(score_spec(&healthy) > score_spec(&unhealthy));
        assert!(score_spec(&unhealthy) > score_spec(&missing));
    }

    #[test]
    fn test_failed_score_below_any_spec() {
        assert!(FAILED_CANDIDATE_SCORE < score_spec(&JobSpec::new("", "")));
    }
}
