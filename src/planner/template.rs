//! Offline planner built from genre presets.

use super::{PlannedSpec, SpecPlanner};
use crate::errors::PlanningError;
use crate::spec::JobSpec;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

struct Preset {
    key: &'static str,
    styles: &'static str,
    profile: &'static str,
    weirdness: i64,
    influence: i64,
    imagery: &'static [&'static str],
}

const PRESETS: &[Preset] = &[
    Preset {
        key: "pop",
        styles: "modern pop, catchy hooks, polished production, radio-ready",
        profile: "radio_ready",
        weirdness: 35,
        influence: 75,
        imagery: &["city lights", "late-night drive", "heartbeat", "neon skyline"],
    },
    Preset {
        key: "edm",
        styles: "EDM, festival energy, heavy drops, sidechain pumping, bright synths",
        profile: "bass_heavy",
        weirdness: 45,
        influence: 80,
        imagery: &["strobe lights", "crowd jump", "bassline", "laser beams"],
    },
    Preset {
        key: "lofi",
        styles: "lo-fi hip hop, dusty drums, vinyl crackle, mellow keys, chill",
        profile: "lo_fi",
        weirdness: 25,
        influence: 60,
        imagery: &["rainy window", "old notebook", "coffee steam", "faded photo"],
    },
    Preset {
        key: "rock",
        styles: "alternative rock, driven guitars, live drums, anthemic chorus",
        profile: "clarity",
        weirdness: 40,
        influence: 70,
        imagery: &["highway", "amp glow", "crowd chant", "midnight road"],
    },
    Preset {
        key: "hiphop",
        styles: "hip-hop, punchy drums, deep 808, confident flow, modern trap influence",
        profile: "bass_heavy",
        weirdness: 50,
        influence: 78,
        imagery: &["streetlights", "skyscraper", "808 rumble", "night ambition"],
    },
    Preset {
        key: "rnb",
        styles: "R&B, smooth vocals, warm keys, groove-focused, soulful",
        profile: "vocal_focus",
        weirdness: 30,
        influence: 72,
        imagery: &["velvet room", "moonlight", "silk chords", "slow pulse"],
    },
];

const GENERIC_IMAGERY: &[&str] = &["night sky", "heartbeat", "motion", "echo"];

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex is valid"));

/// Lowercase slug with runs of non-alphanumerics collapsed to `_`.
pub fn slug(text: &str) -> String {
    let lowered = text.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lowered, "_");
    let trimmed = slug.trim_matches('_');
    if trimmed.is_empty() {
        "track".to_string()
    } else {
        trimmed.to_string()
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Deterministic planner: same `(intent, index)` always yields the same spec.
#[derive(Debug, Clone, Default)]
pub struct TemplatePlanner;

impl TemplatePlanner {
    pub fn new() -> Self {
        Self
    }

    fn preset_for(intent: &str) -> Option<&'static Preset> {
        let key = slug(intent).replace('_', "");
        PRESETS.iter().find(|p| key.contains(p.key))
    }

    /// Pick three imagery phrases, rotating the starting point by index.
    fn imagery(pool: &[&'static str], index: usize) -> [&'static str; 3] {
        let at = |offset: usize| pool[(index + offset) % pool.len()];
        [at(0), at(1), at(2)]
    }

    pub fn plan(&self, intent: &str, index: usize) -> PlannedSpec {
        let intent = intent.trim();
        let preset = Self::preset_for(intent);

        let (styles, profile, weirdness, influence, pool) = match preset {
            Some(p) => (
                p.styles.to_string(),
                p.profile,
                p.weirdness,
                p.influence,
                p.imagery,
            ),
            None => (
                format!("{}, modern production, emotionally engaging", intent),
                "radio_ready",
                40,
                70,
                GENERIC_IMAGERY,
            ),
        };

        let [first, second, third] = Self::imagery(pool, index);
        let title = format!("{} Session {}", title_case(intent), index + 1);
        let lyrics = format!(
            "[Verse 1]\n\
             {} in the distance, we don't look back tonight\n\
             We turn the pressure into motion, turn the silence into light\n\n\
             [Chorus]\n\
             This is our {} moment, loud and clear\n\
             We rise together, no fear\n\
             From {} to {}, we keep it true\n\
             One more song to break through\n\n\
             [Outro]\n\
             Keep it moving, keep it true.",
            title_case(first),
            intent,
            second,
            third
        );

        PlannedSpec {
            spec: JobSpec::new(lyrics, styles)
                .with_title(title)
                .with_tuning(weirdness, influence),
            profile: profile.to_string(),
        }
    }
}

#[async_trait]
impl SpecPlanner for TemplatePlanner {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, intent: &str, index: usize) -> Result<PlannedSpec, PlanningError> {
        Ok(self.plan(intent, index))
    }
}
