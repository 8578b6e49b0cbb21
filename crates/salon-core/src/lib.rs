//! # Salon Core - conversation orchestration for spoken multi-persona chat
//!
//! A small cast of personas, a moderating host and a human user share one spoken
//! conversation. This crate owns the part that has to stay consistent while
//! generation, synthesis and playback run concurrently and sometimes fail:
//!
//! - [`ConversationOrchestrator`]: turn scheduling, user pre-emption, epoch discipline
//! - [`PlaybackSequencer`]: single-flight playback, at most one turn audible
//! - [`SentimentAnalyzer`]: deterministic lexical sentiment
//! - [`VoiceParameterAdvisor`]: sentiment + personality → bounded voice deltas
//!
//! Text generation is consumed through [`ResponseGenerator`]; speech synthesis and the
//! audio device through `salon_voice`.
//!
//! ## Example
//!
//! ```no_run
//! use salon_core::{ConversationOrchestrator, Persona, Personality};
//!
//! # async fn demo() -> salon_core::ConversationResult<()> {
//! let salon = ConversationOrchestrator::builder()
//!     .participant(Persona::new("Ava", Personality::Cheerful, "voice-ava"))
//!     .participant(Persona::new("Ben", Personality::Sarcastic, "voice-ben"))
//!     .build();
//! salon.set_observer(|snapshot| println!("{} turns", snapshot.turns.len()));
//! salon.start_conversation()?;
//! let exchange = salon.add_user_message("Ben, be nice for once").await?;
//! println!("user sounded {}", exchange.user_sentiment.class.as_str());
//! salon.stop_conversation();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod persona;
pub mod playback;
pub mod prompts;
pub mod sentiment;
pub mod session;
pub mod voice_params;

pub use config::{HostConfig, LimitsConfig, SalonConfig, SchedulingConfig, TimeoutConfig};
pub use error::{ConversationError, ConversationResult, GenerationError};
pub use generator::{
    GenerationRequest, OpenRouterGenerator, PlaceholderGenerator, ResponseGenerator, SpeakerProfile,
};
pub use orchestrator::{
    ConversationOrchestrator, OrchestratorBuilder, OrchestratorConfig, SnapshotObserver, UserExchange,
};
pub use persona::{Persona, Personality};
pub use playback::{PlaybackObserver, PlaybackOutcome, PlaybackSequencer};
pub use sentiment::{LexicalScore, SentimentAnalyzer, SentimentClass, SentimentResult};
pub use session::{Session, SessionSnapshot, SpeakerKind, Turn, TurnId};
pub use voice_params::{PersonalityModifier, VoiceParameterAdjustment, VoiceParameterAdvisor};

pub use salon_voice;
