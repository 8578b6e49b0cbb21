//! Salon configuration.
//!
//! Layering: built-in defaults < TOML file (`SALON_CONFIG`, default `config/salon.toml`)
//! < environment (`SALON__SCHEDULING__HOST_PROBABILITY=0.4`, ...).
//!
//! ```toml
//! fallback_phrase = "Hmm, let me think about that."
//! thematic_directive = "A cozy mystery night"
//!
//! [scheduling]
//! min_delay_ms = 3500
//! max_delay_ms = 6000
//! host_probability = 0.25
//!
//! [host]
//! name = "Morgan"
//! voice_id = "21m00Tcm4TlvDq8ikWAM"
//!
//! [voice_modifiers.wise]
//! stability = 0.2
//!
//! [[participants]]
//! name = "Ava"
//! personality = "cheerful"
//! voice_id = "EXAVITQu4vr4xnSDxMaL"
//! ```

use crate::error::ConversationResult;
use crate::orchestrator::{OrchestratorBuilder, OrchestratorConfig};
use crate::persona::{Persona, Personality};
use crate::voice_params::{PersonalityModifier, VoiceParameterAdvisor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/salon.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Lower bound of the pause before an autonomous turn.
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Chance that the host, not a participant, takes the next autonomous turn.
    pub host_probability: f64,
    /// Pause after answering the user before the loop resumes.
    pub user_cooldown_ms: u64,
    /// Number of trailing turns sent as generation context.
    pub context_window: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 3500,
            max_delay_ms: 6000,
            host_probability: 0.25,
            user_cooldown_ms: 2000,
            context_window: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub directive_chars: usize,
    pub history_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            directive_chars: 500,
            history_chars: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub generation_secs: u64,
    pub synthesis_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation_secs: 20,
            synthesis_secs: 30,
        }
    }
}

/// The moderating voice. Not a participant; never picked as a responder to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub name: String,
    pub voice_id: String,
    pub personality: Personality,
    pub stability: f32,
    pub similarity: f32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: "Morgan".to_string(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            personality: Personality::Confident,
            stability: 0.6,
            similarity: 0.75,
        }
    }
}

impl HostConfig {
    pub fn persona(&self) -> Persona {
        Persona::new(self.name.clone(), self.personality, self.voice_id.clone())
            .with_id("host")
            .with_voice_settings(self.stability, self.similarity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalonConfig {
    pub scheduling: SchedulingConfig,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutConfig,
    pub host: HostConfig,
    /// Spoken by a participant whose generation failed or timed out.
    pub fallback_phrase: String,
    pub thematic_directive: Option<String>,
    pub historical_context: Option<String>,
    /// Per-tag overrides of the shipped voice modifiers.
    pub voice_modifiers: HashMap<Personality, PersonalityModifier>,
    pub participants: Vec<Persona>,
}

impl Default for SalonConfig {
    fn default() -> Self {
        Self {
            scheduling: SchedulingConfig::default(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
            host: HostConfig::default(),
            fallback_phrase: "Hmm, let me think about that for a second.".to_string(),
            thematic_directive: None,
            historical_context: None,
            voice_modifiers: HashMap::new(),
            participants: Vec::new(),
        }
    }
}

impl SalonConfig {
    /// Load from `SALON_CONFIG` (or `config/salon.toml` if present) and `SALON__*` env vars.
    pub fn load() -> ConversationResult<Self> {
        let config_path =
            std::env::var("SALON_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let builder = config::Config::builder();

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            info!(path = %path.display(), "loading salon config");
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("SALON").separator("__"))
            .build()?;

        Ok(built.try_deserialize::<Self>()?.normalized())
    }

    /// Parse a TOML document (no file or environment layering).
    pub fn from_toml_str(toml: &str) -> ConversationResult<Self> {
        let built = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        Ok(built.try_deserialize::<Self>()?.normalized())
    }

    /// Pull untrusted values back into range.
    pub fn normalized(mut self) -> Self {
        let s = &mut self.scheduling;
        if s.min_delay_ms > s.max_delay_ms {
            warn!(min = s.min_delay_ms, max = s.max_delay_ms, "delay window inverted; swapping");
            std::mem::swap(&mut s.min_delay_ms, &mut s.max_delay_ms);
        }
        s.host_probability = if s.host_probability.is_finite() {
            s.host_probability.clamp(0.0, 1.0)
        } else {
            SchedulingConfig::default().host_probability
        };
        s.context_window = s.context_window.max(1);
        if self.fallback_phrase.trim().is_empty() {
            self.fallback_phrase = SalonConfig::default().fallback_phrase;
        }
        self.thematic_directive = self.thematic_directive.filter(|d| !d.trim().is_empty());
        self.historical_context = self.historical_context.filter(|h| !h.trim().is_empty());
        self.participants = self
            .participants
            .into_iter()
            .map(Persona::normalized)
            .collect();
        self
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            min_delay: Duration::from_millis(self.scheduling.min_delay_ms),
            max_delay: Duration::from_millis(self.scheduling.max_delay_ms),
            host_probability: self.scheduling.host_probability,
            user_cooldown: Duration::from_millis(self.scheduling.user_cooldown_ms),
            context_window: self.scheduling.context_window,
            directive_limit: self.limits.directive_chars,
            history_limit: self.limits.history_chars,
            generation_timeout: Duration::from_secs(self.timeouts.generation_secs),
            synthesis_timeout: Duration::from_secs(self.timeouts.synthesis_secs),
            fallback_phrase: self.fallback_phrase.clone(),
        }
    }

    pub fn advisor(&self) -> VoiceParameterAdvisor {
        VoiceParameterAdvisor::new().with_modifiers(self.voice_modifiers.clone())
    }

    /// Builder pre-loaded with everything in this config; add collaborators and build.
    pub fn orchestrator_builder(&self) -> OrchestratorBuilder {
        OrchestratorBuilder::new()
            .config(self.orchestrator_config())
            .host(self.host.persona())
            .advisor(self.advisor())
            .participants(self.participants.iter().cloned().map(Arc::new).collect())
            .thematic_directive(self.thematic_directive.clone())
            .historical_context(self.historical_context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SalonConfig::default();
        let oc = cfg.orchestrator_config();
        assert_eq!(oc.min_delay, Duration::from_millis(3500));
        assert_eq!(oc.max_delay, Duration::from_millis(6000));
        assert_eq!(oc.host_probability, 0.25);
        assert_eq!(oc.context_window, 8);
        assert_eq!(oc.directive_limit, 500);
        assert_eq!(oc.history_limit, 1000);
        assert_eq!(oc.generation_timeout, Duration::from_secs(20));
        assert_eq!(oc.synthesis_timeout, Duration::from_secs(30));
    }

    #[test]
    fn toml_overrides_and_roster() {
        let cfg = SalonConfig::from_toml_str(
            r#"
            fallback_phrase = "Give me a moment."
            thematic_directive = "detective story"

            [scheduling]
            min_delay_ms = 9000
            max_delay_ms = 1000
            host_probability = 3.0

            [host]
            name = "Quinn"
            voice_id = "host-v"

            [voice_modifiers.wise]
            stability = -0.1

            [[participants]]
            name = "Ava"
            personality = "cheerful"
            voice_id = "voice-ava"

            [[participants]]
            name = "Ben"
            personality = "sarcastic"
            voice_id = "voice-ben"
            similarity = 2.0
            "#,
        )
        .expect("config");

        assert_eq!(cfg.scheduling.min_delay_ms, 1000);
        assert_eq!(cfg.scheduling.max_delay_ms, 9000);
        assert_eq!(cfg.scheduling.host_probability, 1.0);
        assert_eq!(cfg.scheduling.context_window, 8);
        assert_eq!(cfg.host.name, "Quinn");
        assert_eq!(cfg.host.persona().voice_id, "host-v");
        assert_eq!(cfg.fallback_phrase, "Give me a moment.");
        assert_eq!(cfg.participants.len(), 2);
        assert_eq!(cfg.participants[1].id, "ben");
        assert_eq!(cfg.participants[1].similarity, 1.0);

        let wise = cfg.advisor().modifier(Personality::Wise);
        assert_eq!(wise.stability, -0.1);
        assert_eq!(wise.similarity, 0.0);
    }

    #[test]
    fn blank_strings_are_dropped() {
        let cfg = SalonConfig::from_toml_str("thematic_directive = \"  \"\nfallback_phrase = \"\"")
            .expect("config");
        assert_eq!(cfg.thematic_directive, None);
        assert!(!cfg.fallback_phrase.is_empty());
    }

    #[test]
    fn shipped_example_parses() {
        let cfg = SalonConfig::from_toml_str(include_str!("../../../config/salon.example.toml"))
            .expect("example config");
        assert_eq!(cfg.host.name, "Morgan");
        assert_eq!(cfg.participants.len(), 3);
        assert_eq!(cfg.participants[2].stability, 0.7);
        assert_eq!(cfg.advisor().modifier(Personality::Wise).similarity, 0.05);
    }
}
