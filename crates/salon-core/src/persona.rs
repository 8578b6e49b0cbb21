//! Personas and the closed personality set.
//!
//! `Personality` is the single switchboard for everything tag-dependent: prompt
//! description, default voice modifiers and the placeholder generator's lines all
//! dispatch through exhaustive matches on it.

use salon_voice::{clamp_unit, VoiceSettings};
use serde::{Deserialize, Serialize};

/// Personality tag of a persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Cheerful,
    Romantic,
    Unhinged,
    Sarcastic,
    Wise,
    Mysterious,
    Aggressive,
    Gentle,
    Confident,
    Playful,
    Melancholic,
    Authoritative,
}

impl Personality {
    pub const ALL: [Personality; 12] = [
        Personality::Cheerful,
        Personality::Romantic,
        Personality::Unhinged,
        Personality::Sarcastic,
        Personality::Wise,
        Personality::Mysterious,
        Personality::Aggressive,
        Personality::Gentle,
        Personality::Confident,
        Personality::Playful,
        Personality::Melancholic,
        Personality::Authoritative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Cheerful => "cheerful",
            Personality::Romantic => "romantic",
            Personality::Unhinged => "unhinged",
            Personality::Sarcastic => "sarcastic",
            Personality::Wise => "wise",
            Personality::Mysterious => "mysterious",
            Personality::Aggressive => "aggressive",
            Personality::Gentle => "gentle",
            Personality::Confident => "confident",
            Personality::Playful => "playful",
            Personality::Melancholic => "melancholic",
            Personality::Authoritative => "authoritative",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
    }

    /// How the persona talks; injected into every generation request for this speaker.
    pub fn description(&self) -> &'static str {
        match self {
            Personality::Cheerful => "Upbeat and warm. Finds the bright side, laughs easily, \
                encourages everyone in the room.",
            Personality::Romantic => "Dreamy and affectionate. Speaks in vivid images, \
                lingers on feelings and beauty.",
            Personality::Unhinged => "Chaotic and unpredictable. Leaps between wild ideas, \
                exaggerates, never quite stays on topic.",
            Personality::Sarcastic => "Dry and ironic. Undercuts enthusiasm with deadpan \
                remarks, but is secretly engaged.",
            Personality::Wise => "Calm and reflective. Offers perspective, asks thoughtful \
                questions, speaks in measured sentences.",
            Personality::Mysterious => "Enigmatic and terse. Hints more than explains, \
                answers questions with questions.",
            Personality::Aggressive => "Blunt and combative. Challenges every claim and \
                pushes the debate forward hard.",
            Personality::Gentle => "Soft-spoken and kind. Validates others, de-escalates, \
                chooses careful words.",
            Personality::Confident => "Self-assured and direct. States opinions plainly \
                and backs them up.",
            Personality::Playful => "Teasing and light. Makes jokes and games out of the \
                topic, keeps things moving.",
            Personality::Melancholic => "Wistful and introspective. Notices loss and \
                impermanence, speaks slowly.",
            Personality::Authoritative => "Commanding and precise. Summarizes, corrects, \
                and sets direction for the group.",
        }
    }
}

impl std::fmt::Display for Personality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_stability() -> f32 {
    0.5
}

fn default_similarity() -> f32 {
    0.75
}

/// A configured synthetic participant. Shared as `Arc<Persona>` and never mutated by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Stable identifier; defaults to the lowercased name when loaded from config.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub personality: Personality,
    /// Synthesizer voice identity.
    pub voice_id: String,
    #[serde(default = "default_stability")]
    pub stability: f32,
    #[serde(default = "default_similarity")]
    pub similarity: f32,
}

impl Persona {
    pub fn new(name: impl Into<String>, personality: Personality, voice_id: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.to_lowercase(),
            name,
            personality,
            voice_id: voice_id.into(),
            stability: default_stability(),
            similarity: default_similarity(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Base synthesis parameters, clamped into `[0, 1]`.
    pub fn with_voice_settings(mut self, stability: f32, similarity: f32) -> Self {
        self.stability = clamp_unit(stability);
        self.similarity = clamp_unit(similarity);
        self
    }

    /// Fill in a missing id and pull base parameters back into range (config input is untrusted).
    pub fn normalized(mut self) -> Self {
        if self.id.trim().is_empty() {
            self.id = self.name.to_lowercase();
        }
        self.stability = clamp_unit(self.stability);
        self.similarity = clamp_unit(self.similarity);
        self
    }

    pub fn base_settings(&self) -> VoiceSettings {
        VoiceSettings::new(self.stability, self.similarity)
    }
}
