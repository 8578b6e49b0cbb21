//! Text generation seam.
//!
//! The orchestrator hands a [`GenerationRequest`] to whatever [`ResponseGenerator`] it
//! was built with and bounds the call with its own timeout. Two implementations ship:
//! [`OpenRouterGenerator`] (OpenAI-compatible chat completions, `OPENROUTER_API_KEY`)
//! and [`PlaceholderGenerator`] for offline runs.

use crate::error::GenerationError;
use crate::persona::{Persona, Personality};
use crate::prompts::render_window;
use crate::sentiment::SentimentResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";

/// Who is about to speak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerProfile {
    pub name: String,
    pub personality: Personality,
    pub description: String,
    pub is_host: bool,
}

impl SpeakerProfile {
    pub fn for_persona(persona: &Persona) -> Self {
        Self {
            name: persona.name.clone(),
            personality: persona.personality,
            description: persona.personality.description().to_string(),
            is_host: false,
        }
    }

    pub fn for_host(host: &Persona) -> Self {
        Self {
            is_host: true,
            ..Self::for_persona(host)
        }
    }
}

/// Everything a generator gets for one line of dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub speaker: SpeakerProfile,
    /// Trailing transcript window, oldest first, as `(speaker_label, text)`.
    pub recent_window: Vec<(String, String)>,
    pub prompt: String,
    /// Already truncated by the orchestrator.
    pub thematic_directive: Option<String>,
    /// Already truncated by the orchestrator.
    pub historical_context: Option<String>,
    /// Present when answering the user.
    pub user_sentiment: Option<SentimentResult>,
}

impl GenerationRequest {
    /// System message: persona voice plus directive/context framing.
    pub fn system_prompt(&self) -> String {
        let mut out = if self.speaker.is_host {
            format!(
                "You are {}, the host of a lively spoken group conversation. {}",
                self.speaker.name, self.speaker.description
            )
        } else {
            format!(
                "You are {}, one voice in a spoken group conversation. Personality: {}",
                self.speaker.name, self.speaker.description
            )
        };
        out.push_str(" Speak naturally, as if out loud. No stage directions, no name prefix.");
        if let Some(directive) = &self.thematic_directive {
            out.push_str("\n\nTheme of the conversation: ");
            out.push_str(directive);
        }
        if let Some(history) = &self.historical_context {
            out.push_str("\n\nBackground:\n");
            out.push_str(history);
        }
        out
    }

    /// User message: transcript window, optional mood hint and the instruction.
    pub fn user_prompt(&self) -> String {
        let mut out = String::new();
        if !self.recent_window.is_empty() {
            out.push_str("Conversation so far:\n");
            out.push_str(&render_window(&self.recent_window));
            out.push_str("\n\n");
        }
        if let Some(sentiment) = &self.user_sentiment {
            out.push_str(&format!(
                "The user sounds {} (intensity {:.2}).\n",
                sentiment.class.as_str(),
                sentiment.intensity
            ));
        }
        out.push_str(&self.prompt);
        out
    }
}

/// Produces one line of dialogue for a speaker.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

// OpenAI-compatible request/response for OpenRouter
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// OpenRouter chat-completions backend.
pub struct OpenRouterGenerator {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenRouterGenerator {
    /// Uses `OPENROUTER_API_KEY`, optional `OPENROUTER_API_URL` and `OPENROUTER_MODEL`.
    /// Returns `None` if no key is set.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("OPENROUTER_API_KEY").ok()?.trim().to_string();
        if key.is_empty() {
            return None;
        }
        let mut generator = Self::new(key);
        if let Ok(url) = std::env::var("OPENROUTER_API_URL") {
            generator = generator.with_base_url(&url);
        }
        if let Ok(model) = std::env::var("OPENROUTER_MODEL") {
            if !model.trim().is_empty() {
                generator = generator.with_model(model.trim());
            }
        }
        Some(generator)
    }

    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            base_url: OPENROUTER_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ResponseGenerator for OpenRouterGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt(),
                },
            ],
            temperature: Some(0.9),
            max_tokens: Some(160),
        };

        debug!(speaker = %request.speaker.name, model = %self.model, "OpenRouter request");
        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", "https://salon.local")
            .header("X-Title", "Salon")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status, body });
        }

        let parsed: ChatResponse = res.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| clean_line(&text, &request.speaker.name))
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::Empty)
    }
}

/// Strip surrounding quotes and a leading "Name:" that models like to add.
fn clean_line(text: &str, speaker: &str) -> String {
    let mut line = text.trim();
    if let Some(rest) = line
        .strip_prefix(speaker)
        .and_then(|rest| rest.strip_prefix(':'))
    {
        line = rest.trim_start();
    }
    line.trim_matches('"').trim().to_string()
}

/// Offline generator: a canned line per personality, rotated by transcript length.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderGenerator;

impl PlaceholderGenerator {
    fn lines(personality: Personality) -> [&'static str; 2] {
        match personality {
            Personality::Cheerful => ["Oh, I love that!", "That honestly made my day."],
            Personality::Romantic => [
                "There's something beautiful in that.",
                "It reminds me of a summer evening.",
            ],
            Personality::Unhinged => [
                "What if the moon is listening right now?",
                "Okay but hear me out: penguins.",
            ],
            Personality::Sarcastic => ["Oh, fascinating. Truly.", "Wow, never heard that one before."],
            Personality::Wise => [
                "Perhaps the question matters more than the answer.",
                "Every ending is a beginning, in its way.",
            ],
            Personality::Mysterious => ["Are you sure that's what happened?", "Some things are better left unsaid."],
            Personality::Aggressive => ["No, that's just wrong.", "Prove it."],
            Personality::Gentle => ["That sounds hard. Take your time.", "I'm glad you shared that."],
            Personality::Confident => ["Here's what we should do.", "I know exactly how this goes."],
            Personality::Playful => ["Race you to the next topic!", "Ten points if you can guess what I'm thinking."],
            Personality::Melancholic => ["It all passes, doesn't it.", "I miss how things used to be."],
            Personality::Authoritative => ["Let's focus.", "To summarize where we are."],
        }
    }
}

#[async_trait]
impl ResponseGenerator for PlaceholderGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let lines = Self::lines(request.speaker.personality);
        Ok(lines[request.recent_window.len() % lines.len()].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::SentimentClass;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        let ava = Persona::new("Ava", Personality::Cheerful, "voice-ava");
        GenerationRequest {
            speaker: SpeakerProfile::for_persona(&ava),
            recent_window: vec![("User".into(), "I hate this".into())],
            prompt: "Reply to the user.".into(),
            thematic_directive: Some("rainy days".into()),
            historical_context: None,
            user_sentiment: Some(SentimentResult {
                class: SentimentClass::Negative,
                intensity: 1.0,
                confidence: 1.0,
            }),
        }
    }

    #[test]
    fn prompts_carry_context() {
        let req = request();
        let system = req.system_prompt();
        assert!(system.contains("Ava"));
        assert!(system.contains("rainy days"));
        assert!(!system.contains("Background"));
        let user = req.user_prompt();
        assert!(user.contains("User: I hate this"));
        assert!(user.contains("negative"));
        assert!(user.ends_with("Reply to the user."));
    }

    #[test]
    fn model_prefixes_are_stripped() {
        assert_eq!(clean_line("  Ava: \"Hello there\" ", "Ava"), "Hello there");
        assert_eq!(clean_line("Hello", "Ava"), "Hello");
    }

    #[tokio::test]
    async fn placeholder_is_in_character() {
        let text = PlaceholderGenerator.generate(&request()).await.unwrap();
        assert!(!text.is_empty());
    }

    #[tokio::test]
    async fn openrouter_parses_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "Ava: Chin up!" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OpenRouterGenerator::new("test-key".into()).with_base_url(&server.uri());
        let text = generator.generate(&request()).await.unwrap();
        assert_eq!(text, "Chin up!");
    }

    #[tokio::test]
    async fn openrouter_maps_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;
        let generator = OpenRouterGenerator::new("k".into()).with_base_url(&server.uri());
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Api { status: 429, .. }));

        let empty = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&empty)
            .await;
        let generator = OpenRouterGenerator::new("k".into()).with_base_url(&empty.uri());
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Empty));
    }
}
