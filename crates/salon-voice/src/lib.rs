//! # Salon Voice - speech synthesis and playback seams
//!
//! The conversation core talks to two traits from this crate:
//!
//! ```text
//!  text + VoiceSettings ──► SpeechSynthesizer ──► AudioLocator ──► AudioPlayer ──► speaker
//!                           (ElevenLabs / none)                   (rodio / silent)
//! ```
//!
//! Everything here is stateless with respect to the conversation; single-flight
//! sequencing of clips lives in `salon-core`.

pub mod error;
pub mod player;
pub mod synth;

pub use error::{VoiceError, VoiceResult};
pub use player::{AudioPlayer, SilentPlayer};
#[cfg(feature = "rodio")]
pub use player::RodioPlayer;
pub use synth::{
    clamp_unit, AudioLocator, ElevenLabsSynthesizer, PlaceholderSynthesizer, SpeechSynthesizer,
    VoiceSettings,
};
