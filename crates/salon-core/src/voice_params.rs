//! Sentiment + personality → bounded synthesis parameter deltas.

use crate::persona::Personality;
use crate::sentiment::{SentimentClass, SentimentResult};
use salon_voice::VoiceSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_STABILITY_DELTA: f32 = 0.4;
pub const MAX_SIMILARITY_DELTA: f32 = 0.2;

/// Per-tag adjustment layered on top of the sentiment rule.
///
/// `positive_stability` / `negative_stability` only apply when the sentiment has that
/// class, scaled by its intensity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityModifier {
    pub stability: f32,
    pub similarity: f32,
    pub positive_stability: f32,
    pub negative_stability: f32,
}

impl PersonalityModifier {
    pub const fn new(stability: f32, similarity: f32) -> Self {
        Self {
            stability,
            similarity,
            positive_stability: 0.0,
            negative_stability: 0.0,
        }
    }

    pub const fn on_positive(mut self, stability: f32) -> Self {
        self.positive_stability = stability;
        self
    }

    pub const fn on_negative(mut self, stability: f32) -> Self {
        self.negative_stability = stability;
        self
    }

    /// Shipped policy for each tag.
    pub fn default_for(personality: Personality) -> Self {
        match personality {
            Personality::Cheerful => Self::new(0.0, 0.0).on_negative(0.15),
            Personality::Romantic => Self::new(0.05, 0.05),
            Personality::Unhinged => Self::new(-0.2, -0.05),
            Personality::Sarcastic => Self::new(0.0, 0.0).on_positive(-0.15),
            Personality::Wise => Self::new(0.15, 0.05),
            Personality::Mysterious => Self::new(0.05, -0.05),
            Personality::Aggressive => Self::new(-0.1, 0.0).on_negative(-0.1),
            Personality::Gentle => Self::new(0.15, 0.0),
            Personality::Confident => Self::new(0.1, 0.05),
            Personality::Playful => Self::new(-0.1, 0.0),
            Personality::Melancholic => Self::new(0.0, -0.05).on_negative(-0.05),
            Personality::Authoritative => Self::new(0.2, 0.05),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParameterAdjustment {
    /// Always within `[-0.4, 0.4]`.
    pub stability_delta: f32,
    /// Always within `[-0.2, 0.2]`.
    pub similarity_delta: f32,
    pub rationale: String,
}

impl VoiceParameterAdjustment {
    /// Apply to base parameters: `clamp01(base + delta)`. The base values are untouched.
    pub fn apply(&self, base: VoiceSettings) -> VoiceSettings {
        VoiceSettings::new(
            base.stability + self.stability_delta,
            base.similarity + self.similarity_delta,
        )
    }
}

/// Recommends synthesis deltas from the sentiment of the line being spoken and the
/// speaker's personality.
#[derive(Debug, Clone, Default)]
pub struct VoiceParameterAdvisor {
    overrides: HashMap<Personality, PersonalityModifier>,
}

impl VoiceParameterAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the shipped modifier for one tag.
    pub fn with_modifier(mut self, personality: Personality, modifier: PersonalityModifier) -> Self {
        self.overrides.insert(personality, modifier);
        self
    }

    pub fn with_modifiers(
        mut self,
        modifiers: impl IntoIterator<Item = (Personality, PersonalityModifier)>,
    ) -> Self {
        self.overrides.extend(modifiers);
        self
    }

    pub fn modifier(&self, personality: Personality) -> PersonalityModifier {
        self.overrides
            .get(&personality)
            .copied()
            .unwrap_or_else(|| PersonalityModifier::default_for(personality))
    }

    pub fn recommend(
        &self,
        sentiment: &SentimentResult,
        personality: Personality,
    ) -> VoiceParameterAdjustment {
        let intensity = finite_or_zero(sentiment.intensity).clamp(0.0, 1.0);
        let mut stability = 0.0;
        let mut similarity = 0.0;
        let mut reasons = Vec::new();

        match sentiment.class {
            SentimentClass::Positive => {
                stability += intensity * 0.2;
                similarity += intensity * 0.1;
                reasons.push(format!("positive ({intensity:.2}) steadies delivery"));
            }
            SentimentClass::Negative => {
                stability -= intensity * 0.3;
                similarity -= intensity * 0.05;
                reasons.push(format!("negative ({intensity:.2}) adds strain"));
            }
            SentimentClass::Neutral => {
                stability += 0.1;
                reasons.push("neutral keeps an even tone".to_string());
            }
        }

        let m = self.modifier(personality);
        stability += finite_or_zero(m.stability);
        similarity += finite_or_zero(m.similarity);
        match sentiment.class {
            SentimentClass::Positive if m.positive_stability != 0.0 => {
                stability += finite_or_zero(m.positive_stability) * intensity;
                reasons.push(format!("{personality} shifts upbeat lines"));
            }
            SentimentClass::Negative if m.negative_stability != 0.0 => {
                stability += finite_or_zero(m.negative_stability) * intensity;
                reasons.push(format!("{personality} shifts distressed lines"));
            }
            _ => {}
        }
        if m.stability != 0.0 || m.similarity != 0.0 {
            reasons.push(format!("{personality} baseline"));
        }

        VoiceParameterAdjustment {
            stability_delta: finite_or_zero(stability).clamp(-MAX_STABILITY_DELTA, MAX_STABILITY_DELTA),
            similarity_delta: finite_or_zero(similarity)
                .clamp(-MAX_SIMILARITY_DELTA, MAX_SIMILARITY_DELTA),
            rationale: reasons.join("; "),
        }
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentiment(class: SentimentClass, intensity: f32) -> SentimentResult {
        SentimentResult {
            class,
            intensity,
            confidence: 1.0,
        }
    }

    #[test]
    fn neutral_adds_a_little_stability() {
        let adj = VoiceParameterAdvisor::new()
            .recommend(&sentiment(SentimentClass::Neutral, 0.0), Personality::Romantic);
        assert!((adj.stability_delta - 0.15).abs() < 1e-6);
        assert!((adj.similarity_delta - 0.05).abs() < 1e-6);
    }

    #[test]
    fn sarcastic_edges_only_upbeat_lines() {
        let advisor = VoiceParameterAdvisor::new();
        let up = advisor.recommend(&sentiment(SentimentClass::Positive, 1.0), Personality::Sarcastic);
        let plain = advisor.recommend(&sentiment(SentimentClass::Positive, 1.0), Personality::Confident);
        assert!((up.stability_delta - 0.05).abs() < 1e-6);
        assert!(up.stability_delta < plain.stability_delta);

        let down = advisor.recommend(&sentiment(SentimentClass::Negative, 1.0), Personality::Sarcastic);
        assert!((down.stability_delta + 0.3).abs() < 1e-6);
    }

    #[test]
    fn cheerful_softens_distress() {
        let advisor = VoiceParameterAdvisor::new();
        let cheerful = advisor.recommend(&sentiment(SentimentClass::Negative, 1.0), Personality::Cheerful);
        let neutral_tag = advisor.recommend(&sentiment(SentimentClass::Negative, 1.0), Personality::Romantic);
        assert!(cheerful.stability_delta > neutral_tag.stability_delta - 0.05);
        assert!((cheerful.stability_delta + 0.15).abs() < 1e-6);
    }

    #[test]
    fn unhinged_clamps_at_lower_bound() {
        let adj = VoiceParameterAdvisor::new()
            .recommend(&sentiment(SentimentClass::Negative, 1.0), Personality::Unhinged);
        // -0.3 - 0.2 = -0.5 -> clamped
        assert_eq!(adj.stability_delta, -MAX_STABILITY_DELTA);
    }

    #[test]
    fn overrides_replace_defaults() {
        let advisor = VoiceParameterAdvisor::new()
            .with_modifier(Personality::Wise, PersonalityModifier::new(-0.1, 0.0));
        let adj = advisor.recommend(&sentiment(SentimentClass::Neutral, 0.0), Personality::Wise);
        assert!(adj.stability_delta.abs() < 1e-6);
    }

    #[test]
    fn deltas_stay_bounded_for_pathological_inputs() {
        let advisor = VoiceParameterAdvisor::new()
            .with_modifier(Personality::Playful, PersonalityModifier::new(50.0, -50.0).on_positive(9.0))
            .with_modifier(Personality::Gentle, PersonalityModifier::new(f32::NAN, f32::INFINITY));
        let intensities = [0.0, 0.5, 1.0, 7.0, -3.0, f32::NAN, f32::INFINITY, f32::MAX];
        let classes = [SentimentClass::Positive, SentimentClass::Negative, SentimentClass::Neutral];
        for personality in Personality::ALL {
            for class in classes {
                for intensity in intensities {
                    let adj = advisor.recommend(&sentiment(class, intensity), personality);
                    assert!(
                        (-MAX_STABILITY_DELTA..=MAX_STABILITY_DELTA).contains(&adj.stability_delta),
                        "{personality} {class:?} {intensity}: {adj:?}"
                    );
                    assert!(
                        (-MAX_SIMILARITY_DELTA..=MAX_SIMILARITY_DELTA).contains(&adj.similarity_delta),
                        "{personality} {class:?} {intensity}: {adj:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn apply_clamps_into_unit_range_without_touching_base() {
        let base = VoiceSettings::new(0.9, 0.1);
        let adj = VoiceParameterAdjustment {
            stability_delta: 0.4,
            similarity_delta: -0.2,
            rationale: String::new(),
        };
        let out = adj.apply(base);
        assert_eq!(out.stability, 1.0);
        assert_eq!(out.similarity, 0.0);
        assert_eq!(base.stability, 0.9);
    }
}
