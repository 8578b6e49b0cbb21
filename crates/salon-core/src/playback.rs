//! Single-flight playback: at most one turn is audible at any instant.
//!
//! Starting a clip first tears down whatever is playing (player stopped, waiter
//! cancelled, flag cleared and reported) before the new turn's flag is raised. A clip
//! that was pre-empted never touches the flag of the one that replaced it.

use crate::session::TurnId;
use salon_voice::{AudioLocator, AudioPlayer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Receives `is_playing` transitions. Called while the sequencer's lock is held, so
/// implementations must not call back into the sequencer.
pub trait PlaybackObserver: Send + Sync {
    fn playback_changed(&self, turn: TurnId, playing: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Clip played to the end.
    Finished,
    /// Player reported an error; the turn is kept and the flag cleared.
    Failed(String),
    /// Another clip (or `stop_current`) took over.
    Interrupted,
    /// The start guard refused; nothing was played.
    Skipped,
}

struct ActivePlayback {
    ticket: u64,
    turn: TurnId,
    cancel: oneshot::Sender<()>,
}

pub struct PlaybackSequencer {
    player: Arc<dyn AudioPlayer>,
    current: Mutex<Option<ActivePlayback>>,
    tickets: AtomicU64,
}

impl PlaybackSequencer {
    pub fn new(player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            player,
            current: Mutex::new(None),
            tickets: AtomicU64::new(0),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<ActivePlayback>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_turn(&self) -> Option<TurnId> {
        self.current().as_ref().map(|active| active.turn)
    }

    pub async fn play(
        &self,
        turn: TurnId,
        locator: &AudioLocator,
        observer: &dyn PlaybackObserver,
    ) -> PlaybackOutcome {
        self.play_guarded(turn, locator, observer, || true).await
    }

    /// Like [`play`](Self::play), but `guard` is evaluated atomically with pre-emption;
    /// when it returns false nothing is stopped and nothing starts.
    pub async fn play_guarded<G>(
        &self,
        turn: TurnId,
        locator: &AudioLocator,
        observer: &dyn PlaybackObserver,
        guard: G,
    ) -> PlaybackOutcome
    where
        G: FnOnce() -> bool + Send,
    {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut current = self.current();
            if !guard() {
                debug!(%turn, "playback skipped: guard refused");
                return PlaybackOutcome::Skipped;
            }
            if let Some(previous) = current.take() {
                self.interrupt(previous, observer);
            }
            observer.playback_changed(turn, true);
            *current = Some(ActivePlayback {
                ticket,
                turn,
                cancel: cancel_tx,
            });
        }

        let result = tokio::select! {
            res = self.player.play(locator) => Some(res),
            _ = cancel_rx => None,
        };

        let Some(result) = result else {
            return PlaybackOutcome::Interrupted;
        };

        let mut current = self.current();
        if !current.as_ref().is_some_and(|active| active.ticket == ticket) {
            return PlaybackOutcome::Interrupted;
        }
        current.take();
        observer.playback_changed(turn, false);
        match result {
            Ok(()) => PlaybackOutcome::Finished,
            Err(e) => {
                warn!(%turn, %locator, error = %e, "playback failed");
                PlaybackOutcome::Failed(e.to_string())
            }
        }
    }

    /// Stop whatever is playing. Returns the interrupted turn, if any.
    pub fn stop_current(&self, observer: &dyn PlaybackObserver) -> Option<TurnId> {
        let mut current = self.current();
        let previous = current.take()?;
        let turn = previous.turn;
        self.interrupt(previous, observer);
        Some(turn)
    }

    fn interrupt(&self, previous: ActivePlayback, observer: &dyn PlaybackObserver) {
        debug!(turn = %previous.turn, "interrupting playback");
        self.player.stop();
        let _ = previous.cancel.send(());
        observer.playback_changed(previous.turn, false);
    }
}
