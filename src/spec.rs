//! Job specification types.
//!
//! A [`JobSpec`] is the content one job produces: free-text fields plus two
//! optional tuning parameters bounded to `0..=100`. It is fixed once planned
//! for a job attempt and travels through the checkpoint verbatim.

use serde::{Deserialize, Serialize};

/// Lowest legal value for a tuning parameter.
pub const TUNING_MIN: u8 = 0;
/// Highest legal value for a tuning parameter.
pub const TUNING_MAX: u8 = 100;

/// Profile used when a planner does not name a known one.
pub const DEFAULT_PROFILE: &str = "radio_ready";

/// Mastering profiles the secondary action understands.
pub const KNOWN_PROFILES: &[&str] = &[
    "radio_ready",
    "warm_vinyl",
    "bass_heavy",
    "vocal_focus",
    "bright_pop",
    "lo_fi",
    "clarity",
    "flat",
];

/// Check whether a profile name is one the export step accepts.
pub fn is_known_profile(profile: &str) -> bool {
    KNOWN_PROFILES.contains(&profile)
}

/// Map an arbitrary profile string onto a known profile, falling back to
/// [`DEFAULT_PROFILE`].
pub fn normalize_profile(raw: &str) -> String {
    let candidate = raw.trim().to_lowercase();
    if is_known_profile(&candidate) {
        candidate
    } else {
        DEFAULT_PROFILE.to_string()
    }
}

/// Clamp a signed value into the legal tuning range.
pub fn clamp_tuning(value: i64) -> u8 {
    value.clamp(TUNING_MIN as i64, TUNING_MAX as i64) as u8
}

/// Content for a single job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Primary content (lyrics).
    pub lyrics: String,
    /// Descriptive style tags.
    pub styles: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub weirdness: Option<u8>,
    #[serde(default)]
    pub style_influence: Option<u8>,
}

impl JobSpec {
    pub fn new(lyrics: impl Into<String>, styles: impl Into<String>) -> Self {
        Self {
            lyrics: lyrics.into(),
            styles: styles.into(),
            title: None,
            weirdness: None,
            style_influence: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set both tuning parameters, clamping them into range.
    pub fn with_tuning(mut self, weirdness: i64, style_influence: i64) -> Self {
        self.weirdness = Some(clamp_tuning(weirdness));
        self.style_influence = Some(clamp_tuning(style_influence));
        self
    }

    /// Title for display, falling back to the first 40 characters of the lyrics.
    pub fn display_title(&self) -> String {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => {
                let head: String = self.lyrics.chars().take(40).collect();
                if head.is_empty() {
                    "-".to_string()
                } else {
                    format!("{}...", head.replace('\n', " "))
                }
            }
        }
    }

    /// Whether every tuning parameter that is set lies in the legal range.
    pub fn tuning_in_range(&self) -> bool {
        [self.weirdness, self.style_influence]
            .into_iter()
            .flatten()
            .all(|v| (TUNING_MIN..=TUNING_MAX).contains(&v))
    }
}

/// What the secondary action exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Full mixed-down song.
    #[default]
    Full,
    /// Individual tracks.
    Multitrack,
}

impl std::fmt::Display for ExportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportMode::Full => write!(f, "full"),
            ExportMode::Multitrack => write!(f, "multitrack"),
        }
    }
}

impl std::str::FromStr for ExportMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(ExportMode::Full),
            "multitrack" => Ok(ExportMode::Multitrack),
            _ => anyhow::bail!("Invalid export mode '{}'. Valid values: full, multitrack", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_profile_keeps_known() {
        assert_eq!(normalize_profile(" Bass_Heavy "), "bass_heavy");
        assert_eq!(normalize_profile("lo_fi"), "lo_fi");
    }

    #[test]
    fn test_normalize_profile_falls_back() {
        assert_eq!(normalize_profile("stadium"), DEFAULT_PROFILE);
        assert_eq!(normalize_profile(""), DEFAULT_PROFILE);
    }

    #[test]
    fn test_with_tuning_clamps() {
        let spec = JobSpec::new("la la", "pop").with_tuning(-5, 250);
        assert_eq!(spec.weirdness, Some(0));
        assert_eq!(spec.style_influence, Some(100));
        assert!(spec.tuning_in_range());
    }

    #[test]
    fn test_display_title_prefers_title() {
        let spec = JobSpec::new("first line\nsecond", "pop").with_title("Night Drive");
        assert_eq!(spec.display_title(), "Night Drive");
    }

    #[test]
    fn test_display_title_falls_back_to_lyrics() {
        let spec = JobSpec::new("first line\nsecond", "pop");
        assert_eq!(spec.display_title(), "first line second...");
    }

    #[test]
    fn test_spec_json_uses_flat_field_names() {
        let spec = JobSpec::new("words", "lofi").with_title("T").with_tuning(10, 60);
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["lyrics"], "words");
        assert_eq!(value["weirdness"], 10);
        assert_eq!(value["style_influence"], 60);
    }

    #[test]
    fn test_spec_missing_optionals_deserialize() {
        let spec: JobSpec = serde_json::from_str(r#"{"lyrics":"a","styles":"b"}"#).unwrap();
        assert!(spec.title.is_none());
        assert!(spec.weirdness.is_none());
    }

    #[test]
    fn test_export_mode_parse_and_display() {
        assert_eq!("Multitrack".parse::<ExportMode>().unwrap(), ExportMode::Multitrack);
        assert_eq!(ExportMode::Full.to_string(), "full");
        assert!("stems".parse::<ExportMode>().is_err());
    }
}
