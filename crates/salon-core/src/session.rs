//! Session state: participants, transcript, epoch and the pending next-turn timer.

use crate::persona::Persona;
use chrono::{DateTime, Utc};
use salon_voice::AudioLocator;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub type TurnId = Uuid;

/// Label used for user turns in generation context and snapshots.
pub const USER_LABEL: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeakerKind {
    User,
    Host,
    Persona,
}

/// One utterance in the transcript.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: TurnId,
    pub kind: SpeakerKind,
    /// Present iff `kind == SpeakerKind::Persona`.
    pub persona: Option<Arc<Persona>>,
    /// Display name of whoever spoke.
    pub speaker_label: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub audio: Option<AudioLocator>,
    pub is_playing: bool,
}

impl Turn {
    fn new(kind: SpeakerKind, persona: Option<Arc<Persona>>, label: String, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            persona,
            speaker_label: label,
            text,
            created_at: Utc::now(),
            audio: None,
            is_playing: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(SpeakerKind::User, None, USER_LABEL.to_string(), text.into())
    }

    pub fn host(host_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(SpeakerKind::Host, None, host_name.into(), text.into())
    }

    pub fn persona(persona: Arc<Persona>, text: impl Into<String>) -> Self {
        let label = persona.name.clone();
        Self::new(SpeakerKind::Persona, Some(persona), label, text.into())
    }
}

/// The single live conversation owned by an orchestrator.
///
/// Never cleared piecemeal: [`Session::replace`] swaps in a successor that keeps the
/// participants, the directive/context strings and the epoch counter.
#[derive(Debug, Default)]
pub struct Session {
    pub participants: Vec<Arc<Persona>>,
    pub turns: Vec<Turn>,
    pub is_active: bool,
    pub last_speaker_label: Option<String>,
    pub epoch: u64,
    pub thematic_directive: Option<String>,
    pub historical_context: Option<String>,
    next_turn: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(participants: Vec<Arc<Persona>>) -> Self {
        Self {
            participants,
            ..Self::default()
        }
    }

    fn successor(&mut self) -> Self {
        Self {
            participants: std::mem::take(&mut self.participants),
            epoch: self.epoch,
            thematic_directive: self.thematic_directive.take(),
            historical_context: self.historical_context.take(),
            ..Self::default()
        }
    }

    /// Swap in a fresh, inactive session. Any armed timer is aborted first.
    ///
    /// Returns the audio clips of the discarded transcript so their owner can release them.
    pub fn replace(&mut self) -> Vec<AudioLocator> {
        self.cancel_next_turn();
        let mut previous = std::mem::take(self);
        *self = previous.successor();
        previous.turns.into_iter().filter_map(|t| t.audio).collect()
    }

    /// Advance the epoch; every in-flight result captured under an older value is now stale.
    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// True while results captured at `epoch` may still be applied.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.is_active && self.epoch == epoch
    }

    pub fn push(&mut self, turn: Turn) -> TurnId {
        let id = turn.id;
        self.last_speaker_label = Some(turn.speaker_label.clone());
        self.turns.push(turn);
        id
    }

    pub fn turn(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    pub fn turn_mut(&mut self, id: TurnId) -> Option<&mut Turn> {
        self.turns.iter_mut().find(|t| t.id == id)
    }

    /// Returns false when the turn is gone (session replaced) or already in that state.
    pub fn set_playing(&mut self, id: TurnId, playing: bool) -> bool {
        if playing {
            for other in self.turns.iter_mut().filter(|t| t.id != id) {
                other.is_playing = false;
            }
        }
        match self.turn_mut(id) {
            Some(turn) if turn.is_playing != playing => {
                turn.is_playing = playing;
                true
            }
            _ => false,
        }
    }

    /// Trailing `k` turns as `(speaker_label, text)`, oldest first.
    pub fn recent_window(&self, k: usize) -> Vec<(String, String)> {
        let start = self.turns.len().saturating_sub(k);
        self.turns[start..]
            .iter()
            .map(|t| (t.speaker_label.clone(), t.text.clone()))
            .collect()
    }

    pub fn arm_next_turn(&mut self, handle: JoinHandle<()>) {
        self.cancel_next_turn();
        self.next_turn = Some(handle);
    }

    /// Abort the pending timer, if any.
    pub fn cancel_next_turn(&mut self) {
        if let Some(handle) = self.next_turn.take() {
            handle.abort();
        }
    }

    /// Forget the timer handle without aborting it (the timer task calls this on itself).
    pub fn detach_next_turn(&mut self) {
        self.next_turn.take();
    }

    pub fn next_turn_scheduled(&self) -> bool {
        self.next_turn.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_active: self.is_active,
            participants: self.participants.clone(),
            turns: self.turns.clone(),
            last_speaker_label: self.last_speaker_label.clone(),
            epoch: self.epoch,
            next_turn_scheduled: self.next_turn_scheduled(),
            thematic_directive: self.thematic_directive.clone(),
        }
    }
}

/// Immutable copy of the observable session, handed to the observer after each mutation.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub is_active: bool,
    pub participants: Vec<Arc<Persona>>,
    pub turns: Vec<Turn>,
    pub last_speaker_label: Option<String>,
    pub epoch: u64,
    pub next_turn_scheduled: bool,
    pub thematic_directive: Option<String>,
}

impl SessionSnapshot {
    pub fn turn(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    pub fn playing_count(&self) -> usize {
        self.turns.iter().filter(|t| t.is_playing).count()
    }

    pub fn playing_turn(&self) -> Option<&Turn> {
        self.turns.iter().find(|t| t.is_playing)
    }
}
