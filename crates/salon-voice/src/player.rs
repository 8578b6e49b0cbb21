//! Audio playback behind a small async seam.
//!
//! The sequencer above this layer decides *what* plays; an [`AudioPlayer`] only knows how
//! to play one locator to completion and how to fall silent on `stop()`.

use crate::error::VoiceResult;
use crate::synth::AudioLocator;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Plays synthesized clips on some output.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play `locator` and resolve when it has finished (or failed).
    async fn play(&self, locator: &AudioLocator) -> VoiceResult<()>;

    /// Silence whatever is playing right now. Must not block.
    fn stop(&self);
}

/// Player with no device: each clip "plays" for a fixed duration and then completes.
/// Use in headless runs and tests.
#[derive(Debug, Clone, Default)]
pub struct SilentPlayer {
    duration: Duration,
}

impl SilentPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate clips lasting `duration` so scheduling behaves like real speech.
    pub fn with_duration(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, locator: &AudioLocator) -> VoiceResult<()> {
        info!(%locator, "SilentPlayer: clip");
        if !self.duration.is_zero() {
            tokio::time::sleep(self.duration).await;
        }
        Ok(())
    }

    fn stop(&self) {}
}

#[cfg(feature = "rodio")]
pub use rodio_player::RodioPlayer;

#[cfg(feature = "rodio")]
mod rodio_player {
    use super::*;
    use crate::error::VoiceError;
    use rodio::{OutputStream, Sink, Source};
    use std::io::Cursor;
    use std::sync::{mpsc, Arc};
    use std::thread;

    /// Plays clips on the default output device through a single `rodio::Sink`.
    ///
    /// `OutputStream` is not `Send`, so it lives on a parked thread for the lifetime of
    /// the player; the sink itself is shared.
    pub struct RodioPlayer {
        sink: Arc<Sink>,
        _keepalive: mpsc::Sender<()>,
    }

    impl RodioPlayer {
        /// Open the default output device.
        pub fn new() -> VoiceResult<Self> {
            let (ready_tx, ready_rx) = mpsc::channel::<VoiceResult<Arc<Sink>>>();
            let (keepalive_tx, keepalive_rx) = mpsc::channel::<()>();

            thread::Builder::new()
                .name("salon-audio-out".to_string())
                .spawn(move || {
                    let (stream, handle) = match OutputStream::try_default() {
                        Ok(pair) => pair,
                        Err(e) => {
                            let _ = ready_tx.send(Err(VoiceError::AudioDevice(e.to_string())));
                            return;
                        }
                    };
                    match Sink::try_new(&handle) {
                        Ok(sink) => {
                            let _ = ready_tx.send(Ok(Arc::new(sink)));
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(VoiceError::Playback(e.to_string())));
                            return;
                        }
                    }
                    // Blocks until the player is dropped.
                    let _ = keepalive_rx.recv();
                    drop(stream);
                })?;

            let sink = ready_rx
                .recv()
                .map_err(|_| VoiceError::AudioDevice("audio thread exited during setup".to_string()))??;
            info!("RodioPlayer: sink ready for playback");
            Ok(Self {
                sink,
                _keepalive: keepalive_tx,
            })
        }
    }

    #[async_trait]
    impl AudioPlayer for RodioPlayer {
        async fn play(&self, locator: &AudioLocator) -> VoiceResult<()> {
            let bytes = tokio::fs::read(locator.as_path()).await?;
            let source = rodio::Decoder::new(Cursor::new(bytes))
                .map_err(|e| VoiceError::Playback(format!("Decode failed: {}", e)))?;
            self.sink.append(source.convert_samples::<f32>());

            let sink = Arc::clone(&self.sink);
            tokio::task::spawn_blocking(move || sink.sleep_until_end())
                .await
                .map_err(|e| VoiceError::Playback(e.to_string()))
        }

        fn stop(&self) {
            self.sink.stop();
            info!("RodioPlayer: stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test(start_paused = true)]
    async fn silent_player_waits_for_simulated_duration() {
        let player = SilentPlayer::with_duration(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        assert_ok!(player.play(&AudioLocator::new("clip.mp3")).await);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn silent_player_defaults_to_instant() {
        let player = SilentPlayer::new();
        assert_ok!(player.play(&AudioLocator::new("clip.mp3")).await);
        player.stop();
    }
}
