//! **Synthesis**: turn a line of dialogue into a playable audio resource.
//!
//! The orchestrator only sees [`SpeechSynthesizer`]; the resource it gets back is an
//! [`AudioLocator`] that the player knows how to open. [`ElevenLabsSynthesizer`] writes
//! each clip into a cache directory and hands back its path.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";
const DEFAULT_MODEL: &str = "eleven_multilingual_v2";
const OUTPUT_FORMAT: &str = "mp3_44100_128";

/// Synthesis parameters for a single utterance. Both values are kept inside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Expressive variability: low = animated, high = steady.
    pub stability: f32,
    /// Fidelity to the reference voice.
    pub similarity: f32,
}

impl VoiceSettings {
    pub fn new(stability: f32, similarity: f32) -> Self {
        Self {
            stability: clamp_unit(stability),
            similarity: clamp_unit(similarity),
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity: 0.75,
        }
    }
}

/// Clamp into `[0, 1]`; non-finite values collapse to the midpoint.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Opaque reference to a playable audio resource (file path or URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioLocator(String);

impl AudioLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the locator as a local file path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for AudioLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<PathBuf> for AudioLocator {
    fn from(path: PathBuf) -> Self {
        Self(path.to_string_lossy().into_owned())
    }
}

/// Backend that turns text into a playable resource. Implement for ElevenLabs or local TTS.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` in `voice_id` with the given settings.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        settings: VoiceSettings,
    ) -> VoiceResult<AudioLocator>;

    /// Free a clip this synthesizer produced once nothing will play it again.
    async fn release(&self, _locator: &AudioLocator) -> VoiceResult<()> {
        Ok(())
    }
}

/// Placeholder TTS: never produces audio, so every turn stays text-only.
#[derive(Debug, Default)]
pub struct PlaceholderSynthesizer;

#[async_trait]
impl SpeechSynthesizer for PlaceholderSynthesizer {
    async fn synthesize(
        &self,
        _text: &str,
        _voice_id: &str,
        _settings: VoiceSettings,
    ) -> VoiceResult<AudioLocator> {
        Err(VoiceError::Tts("placeholder synthesizer produces no audio".to_string()))
    }
}

#[derive(Serialize)]
struct ElevenLabsVoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Serialize)]
struct ElevenLabsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: ElevenLabsVoiceSettings,
}

/// Production TTS backend: ElevenLabs text-to-speech REST API.
/// Uses `ELEVENLABS_API_KEY`, optional `ELEVENLABS_API_URL`, `ELEVENLABS_MODEL` and `SALON_AUDIO_CACHE`.
#[derive(Debug, Clone)]
pub struct ElevenLabsSynthesizer {
    /// Base URL without trailing slash (e.g. https://api.elevenlabs.io).
    pub base_url: String,
    api_key: String,
    /// Model id (eleven_multilingual_v2, eleven_turbo_v2_5, ...).
    pub model: String,
    /// Directory that receives one mp3 per synthesized turn. Clips are deleted when
    /// [`SpeechSynthesizer::release`] is called for them; anything never released stays.
    pub cache_dir: PathBuf,
    client: reqwest::Client,
}

impl ElevenLabsSynthesizer {
    /// Build from environment: ELEVENLABS_API_KEY (required), ELEVENLABS_API_URL, ELEVENLABS_MODEL, SALON_AUDIO_CACHE.
    pub fn from_env() -> VoiceResult<Self> {
        let api_key = std::env::var("ELEVENLABS_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| VoiceError::Config("TTS requires ELEVENLABS_API_KEY".to_string()))?;
        let base_url = std::env::var("ELEVENLABS_API_URL")
            .unwrap_or_else(|_| ELEVENLABS_API_BASE.to_string());
        let model = std::env::var("ELEVENLABS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let cache_dir = std::env::var("SALON_AUDIO_CACHE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("salon-audio"));
        Self::new(base_url, api_key, model, cache_dir)
    }

    /// Create with explicit config (e.g. for tests or non-env wiring).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            cache_dir: cache_dir.into(),
            client,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        settings: VoiceSettings,
    ) -> VoiceResult<AudioLocator> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::Tts("nothing to synthesize".to_string()));
        }
        if voice_id.trim().is_empty() {
            return Err(VoiceError::Config("voice id is empty".to_string()));
        }

        let url = format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.base_url, voice_id, OUTPUT_FORMAT
        );
        let settings = VoiceSettings::new(settings.stability, settings.similarity);
        let body = ElevenLabsRequest {
            text,
            model_id: &self.model,
            voice_settings: ElevenLabsVoiceSettings {
                stability: settings.stability,
                similarity_boost: settings.similarity,
            },
        };
        debug!(voice_id, stability = settings.stability, similarity = settings.similarity, "requesting synthesis");

        let res = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::TtsApi { status, body });
        }
        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Err(VoiceError::Tts("TTS API returned no audio".to_string()));
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let path = self.cache_dir.join(format!("{}.mp3", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "synthesized clip cached");
        Ok(AudioLocator::from(path))
    }

    async fn release(&self, locator: &AudioLocator) -> VoiceResult<()> {
        let path = locator.as_path();
        if !path.starts_with(&self.cache_dir) {
            return Ok(());
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "released cached clip");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn voice_settings_are_clamped() {
        let s = VoiceSettings::new(1.7, -0.2);
        assert_eq!(s.stability, 1.0);
        assert_eq!(s.similarity, 0.0);
        assert_eq!(VoiceSettings::new(f32::NAN, 0.3).stability, 0.5);
    }

    #[tokio::test]
    async fn placeholder_synthesizer_never_yields_audio() {
        let tts = PlaceholderSynthesizer;
        assert_err!(tts.synthesize("hello", "voice", VoiceSettings::default()).await);
    }

    #[tokio::test]
    async fn elevenlabs_writes_clip_to_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-123"))
            .and(header("xi-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "text": "Hello there",
                "voice_settings": { "stability": 0.25 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let tts = ElevenLabsSynthesizer::new(server.uri(), "test-key", DEFAULT_MODEL, dir.path())
            .expect("client");
        let locator = tts
            .synthesize("  Hello there ", "voice-123", VoiceSettings::new(0.25, 0.8))
            .await
            .expect("synthesize");

        assert!(locator.as_path().starts_with(dir.path()));
        let written = std::fs::read(locator.as_path()).expect("clip on disk");
        assert_eq!(written, vec![1u8, 2, 3, 4]);

        tts.release(&locator).await.expect("release");
        assert!(!locator.as_path().exists());
        // Releasing twice is harmless.
        tts.release(&locator).await.expect("second release");
    }

    #[tokio::test]
    async fn release_ignores_files_outside_the_cache() {
        let cache = tempfile::tempdir().expect("cache");
        let elsewhere = tempfile::tempdir().expect("elsewhere");
        let foreign = elsewhere.path().join("keep.mp3");
        std::fs::write(&foreign, b"mp3").expect("write");

        let tts = ElevenLabsSynthesizer::new("http://127.0.0.1:9", "k", DEFAULT_MODEL, cache.path())
            .expect("client");
        tts.release(&AudioLocator::from(foreign.clone())).await.expect("release");
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn elevenlabs_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let tts = ElevenLabsSynthesizer::new(server.uri(), "nope", DEFAULT_MODEL, dir.path())
            .expect("client");
        let err = tts
            .synthesize("Hello", "voice-123", VoiceSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::TtsApi { status: 401, .. }));
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_a_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tts = ElevenLabsSynthesizer::new("http://127.0.0.1:9", "k", DEFAULT_MODEL, dir.path())
            .expect("client");
        assert_err!(tts.synthesize("   ", "voice", VoiceSettings::default()).await);
    }
}
