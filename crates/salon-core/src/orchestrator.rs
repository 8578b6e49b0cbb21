//! Conversation Orchestrator - turn scheduling, user pre-emption and playback hand-off.
//!
//! One orchestrator owns one [`Session`]. All session mutation happens in short critical
//! sections on a single `std::sync::Mutex` that is never held across an `.await`;
//! generation, synthesis and playback run outside it and re-enter only to apply their
//! result, and only if the epoch they captured is still current.
//!
//! ```text
//!  start ──► greeting ──► voice ──► [delay] ──► pick speaker ──► generate ──► append
//!                                      ▲                                        │
//!                                      └──────── play ◄── attach ◄── synthesize ┘
//!  user message: epoch += 1, abort timer, stop audio, reply, cooldown, re-arm
//! ```

use crate::error::{ConversationError, ConversationResult, GenerationError};
use crate::generator::{GenerationRequest, PlaceholderGenerator, ResponseGenerator, SpeakerProfile};
use crate::persona::Persona;
use crate::playback::{PlaybackObserver, PlaybackOutcome, PlaybackSequencer};
use crate::prompts;
use crate::sentiment::{SentimentAnalyzer, SentimentResult};
use crate::session::{Session, SessionSnapshot, Turn, TurnId};
use crate::voice_params::VoiceParameterAdvisor;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use salon_voice::{AudioLocator, AudioPlayer, PlaceholderSynthesizer, SilentPlayer, SpeechSynthesizer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Receives a full snapshot after every session mutation. Runs inside the session
/// lock: it must return quickly and must not call back into the orchestrator.
pub type SnapshotObserver = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;

/// Scheduling and limit knobs. See [`SalonConfig`](crate::config::SalonConfig) for the
/// file/env form.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub host_probability: f64,
    pub user_cooldown: Duration,
    pub context_window: usize,
    pub directive_limit: usize,
    pub history_limit: usize,
    pub generation_timeout: Duration,
    pub synthesis_timeout: Duration,
    pub fallback_phrase: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        crate::config::SalonConfig::default().orchestrator_config()
    }
}

/// Result of [`ConversationOrchestrator::add_user_message`].
#[derive(Debug, Clone)]
pub struct UserExchange {
    pub user_turn: TurnId,
    /// `None` when the reply went stale (another user message or a stop overtook it).
    pub reply_turn: Option<TurnId>,
    pub user_sentiment: SentimentResult,
}

/// Who takes an autonomous turn.
enum Speaker {
    Host,
    Participant(Arc<Persona>),
}

struct SessionState {
    session: Session,
    observer: Option<SnapshotObserver>,
}

impl SessionState {
    fn emit(&self) {
        if let Some(observer) = &self.observer {
            observer(&self.session.snapshot());
        }
    }
}

struct Inner {
    config: OrchestratorConfig,
    host: Arc<Persona>,
    generator: Arc<dyn ResponseGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sequencer: PlaybackSequencer,
    analyzer: SentimentAnalyzer,
    advisor: VoiceParameterAdvisor,
    rng: Mutex<Box<dyn RngCore + Send>>,
    state: Mutex<SessionState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rng(&self) -> MutexGuard<'_, Box<dyn RngCore + Send>> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accepts(&self, epoch: u64) -> bool {
        self.state().session.accepts(epoch)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.session.cancel_next_turn();
    }
}

impl PlaybackObserver for Inner {
    fn playback_changed(&self, turn: TurnId, playing: bool) {
        let mut state = self.state();
        if state.session.set_playing(turn, playing) {
            debug!(%turn, playing, "playback flag changed");
            state.emit();
        }
    }
}

/// Handle to the conversation. Cheap to clone; all clones drive the same session.
///
/// Pending timers only hold a weak reference: once the last handle is dropped the loop
/// ends at its next scheduled turn. A turn already generating or playing finishes first.
#[derive(Clone)]
pub struct ConversationOrchestrator {
    inner: Arc<Inner>,
}

impl ConversationOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn host(&self) -> &Persona {
        &self.inner.host
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state().session.snapshot()
    }

    pub fn set_observer<F>(&self, observer: F)
    where
        F: Fn(&SessionSnapshot) + Send + Sync + 'static,
    {
        self.inner.state().observer = Some(Arc::new(observer));
    }

    pub fn clear_observer(&self) {
        self.inner.state().observer = None;
    }

    /// Swap the participant set. Transcript and epoch are untouched.
    pub fn update_participants(&self, participants: Vec<Arc<Persona>>) {
        let mut state = self.inner.state();
        info!(count = participants.len(), "participants updated");
        state.session.participants = participants;
        state.emit();
    }

    pub fn set_thematic_directive(&self, directive: Option<String>) {
        let directive = directive.filter(|d| !d.trim().is_empty());
        self.inner.state().session.thematic_directive = directive;
    }

    pub fn set_historical_context(&self, context: Option<String>) {
        let context = context.filter(|c| !c.trim().is_empty());
        self.inner.state().session.historical_context = context;
    }

    /// Replace the session, greet everyone and arm the autonomous loop.
    ///
    /// Returns the greeting turn. Fails with `EmptyParticipants`, or `NoRuntime` outside a
    /// Tokio runtime, without touching state.
    pub fn start_conversation(&self) -> ConversationResult<TurnId> {
        let runtime = current_runtime()?;
        let (epoch, greeting_id, greeting, released) = {
            let mut state = self.inner.state();
            if state.session.participants.is_empty() {
                return Err(ConversationError::EmptyParticipants);
            }
            let released = state.session.replace();
            let epoch = state.session.bump_epoch();
            state.session.is_active = true;

            let session = &state.session;
            let greeting = prompts::greeting(
                &self.inner.host.name,
                &session.participants,
                session.thematic_directive.as_deref(),
            );
            let greeting_id = state
                .session
                .push(Turn::host(self.inner.host.name.clone(), greeting.clone()));
            state.emit();
            (epoch, greeting_id, greeting, released)
        };
        info!(epoch, "🎙️ conversation started");

        // A clip from a previous session may still be audible.
        self.inner.sequencer.stop_current(self.inner.as_ref());
        self.release_clips(released);

        let this = self.clone();
        runtime.spawn(async move {
            let host = this.inner.host.clone();
            this.voice_turn(epoch, greeting_id, &host, &greeting).await;
            this.arm_next_turn(epoch, this.draw_delay());
        });
        Ok(greeting_id)
    }

    /// Ingest a user line, pre-empting the loop, and wait for one persona's reply to be
    /// generated, voiced and played.
    ///
    /// The reply runs on its own task. Dropping the returned future only stops waiting:
    /// the reply still settles its playback and re-arms the loop.
    pub async fn add_user_message(&self, text: &str) -> ConversationResult<UserExchange> {
        let runtime = current_runtime()?;
        let user_sentiment = self.inner.analyzer.analyze(text);
        let (epoch, user_turn, responder, request) = {
            let mut state = self.inner.state();
            if state.session.participants.is_empty() {
                return Err(ConversationError::EmptyParticipants);
            }
            state.session.is_active = true;
            let epoch = state.session.bump_epoch();
            state.session.cancel_next_turn();
            let user_turn = state.session.push(Turn::user(text));
            state.emit();

            let responder = self.pick_responder(&state.session.participants, text);
            let request = self.request_for(
                &state.session,
                SpeakerProfile::for_persona(&responder),
                prompts::user_reply_prompt(text),
                Some(user_sentiment),
            );
            (epoch, user_turn, responder, request)
        };
        info!(
            epoch,
            %user_turn,
            sentiment = user_sentiment.class.as_str(),
            responder = %responder.name,
            "user message"
        );

        self.inner.sequencer.stop_current(self.inner.as_ref());

        let this = self.clone();
        let reply = runtime.spawn(async move { this.reply_to_user(epoch, responder, request).await });
        let reply_turn = match reply.await {
            Ok(reply_turn) => reply_turn,
            Err(e) => {
                warn!(epoch, error = %e, "reply task did not complete");
                None
            }
        };

        Ok(UserExchange {
            user_turn,
            reply_turn,
            user_sentiment,
        })
    }

    /// Deactivate, cancel everything pending, silence playback and replace the session.
    pub fn stop_conversation(&self) {
        let epoch = {
            let mut state = self.inner.state();
            state.session.is_active = false;
            state.session.cancel_next_turn();
            state.session.bump_epoch()
        };

        self.inner.sequencer.stop_current(self.inner.as_ref());

        let released = {
            let mut state = self.inner.state();
            let released = state.session.replace();
            state.emit();
            released
        };
        self.release_clips(released);
        info!(epoch, "🛑 conversation stopped");
    }

    /// (Re)play a turn's audio, pre-empting whatever is audible.
    pub async fn play_message_audio(&self, turn_id: TurnId) -> ConversationResult<PlaybackOutcome> {
        let locator = {
            let state = self.inner.state();
            let turn = state
                .session
                .turn(turn_id)
                .ok_or(ConversationError::TurnNotFound(turn_id))?;
            turn.audio
                .clone()
                .ok_or(ConversationError::AudioUnavailable(turn_id))?
        };
        let outcome = self
            .inner
            .sequencer
            .play(turn_id, &locator, self.inner.as_ref())
            .await;
        debug!(%turn_id, ?outcome, "manual playback settled");
        Ok(outcome)
    }

    // ---------------------------------------------------------------------
    // Autonomous loop
    // ---------------------------------------------------------------------

    fn draw_delay(&self) -> Duration {
        let (min, max) = (self.inner.config.min_delay, self.inner.config.max_delay);
        if max <= min {
            return min;
        }
        let ms = self
            .inner
            .rng()
            .gen_range(min.as_millis() as u64..=max.as_millis() as u64);
        Duration::from_millis(ms)
    }

    /// Schedule the next autonomous turn after `delay`, if `epoch` is still live.
    fn arm_next_turn(&self, epoch: u64, delay: Duration) {
        let mut state = self.inner.state();
        if !state.session.accepts(epoch) {
            debug!(epoch, current = state.session.epoch, "not re-arming: epoch is stale");
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                debug!(epoch, "orchestrator dropped; timer exits");
                return;
            };
            let this = ConversationOrchestrator { inner };
            if !this.detach_timer(epoch) {
                return;
            }
            this.autonomous_turn(epoch).await;
        });
        state.session.arm_next_turn(handle);
        debug!(epoch, delay_ms = delay.as_millis() as u64, "next turn armed");
    }

    /// Called by a timer that fired: drop our own handle so nothing aborts the turn now.
    fn detach_timer(&self, epoch: u64) -> bool {
        let mut state = self.inner.state();
        if !state.session.accepts(epoch) {
            return false;
        }
        state.session.detach_next_turn();
        true
    }

    async fn autonomous_turn(&self, epoch: u64) {
        let plan = {
            let state = self.inner.state();
            if !state.session.accepts(epoch) {
                return;
            }
            let (speaker, profile, prompt) = match self.pick_speaker(&state.session.participants) {
                Speaker::Host => (
                    Speaker::Host,
                    SpeakerProfile::for_host(&self.inner.host),
                    prompts::host_prompt(&self.inner.host.name),
                ),
                Speaker::Participant(p) => {
                    let profile = SpeakerProfile::for_persona(&p);
                    let prompt = prompts::autonomous_prompt(&p.name);
                    (Speaker::Participant(p), profile, prompt)
                }
            };
            let request = self.request_for(&state.session, profile, prompt, None);
            let last_speaker = state.session.last_speaker_label.clone();
            (speaker, request, last_speaker)
        };
        let (speaker, request, last_speaker) = plan;

        let text = match self.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(epoch, speaker = %request.speaker.name, error = %e, "generation failed; using fallback");
                match &speaker {
                    Speaker::Host => prompts::host_transition(last_speaker.as_deref()),
                    Speaker::Participant(_) => self.inner.config.fallback_phrase.clone(),
                }
            }
        };

        let (turn, voice) = match speaker {
            Speaker::Host => (
                Turn::host(self.inner.host.name.clone(), text.clone()),
                self.inner.host.clone(),
            ),
            Speaker::Participant(p) => (Turn::persona(p.clone(), text.clone()), p),
        };
        let Some(turn_id) = self.append_if_current(epoch, turn) else {
            return;
        };
        self.voice_turn(epoch, turn_id, &voice, &text).await;
        self.arm_next_turn(epoch, self.draw_delay());
    }

    /// Answer the user at `epoch`, then hand back to the loop after the cooldown.
    async fn reply_to_user(
        &self,
        epoch: u64,
        responder: Arc<Persona>,
        request: GenerationRequest,
    ) -> Option<TurnId> {
        let reply = match self.generate(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(epoch, speaker = %responder.name, error = %e, "generation failed; using fallback");
                self.inner.config.fallback_phrase.clone()
            }
        };

        let reply_turn = self.append_if_current(epoch, Turn::persona(responder.clone(), reply.clone()));
        if let Some(reply_turn) = reply_turn {
            self.voice_turn(epoch, reply_turn, &responder, &reply).await;
        }
        self.arm_next_turn(epoch, self.inner.config.user_cooldown);
        reply_turn
    }

    fn pick_speaker(&self, participants: &[Arc<Persona>]) -> Speaker {
        let p_host = self.inner.config.host_probability;
        let p_host = if p_host.is_finite() { p_host.clamp(0.0, 1.0) } else { 0.0 };
        let mut rng = self.inner.rng();
        if participants.is_empty() || rng.gen_bool(p_host) {
            return Speaker::Host;
        }
        let index = rng.gen_range(0..participants.len());
        Speaker::Participant(participants[index].clone())
    }

    /// The first participant named in `text`, else a random one. `participants` is non-empty.
    fn pick_responder(&self, participants: &[Arc<Persona>], text: &str) -> Arc<Persona> {
        if let Some(named) = participants.iter().find(|p| prompts::mentions(text, &p.name)) {
            return named.clone();
        }
        let index = self.inner.rng().gen_range(0..participants.len());
        participants[index].clone()
    }

    // ---------------------------------------------------------------------
    // Generation / synthesis / playback
    // ---------------------------------------------------------------------

    fn request_for(
        &self,
        session: &Session,
        speaker: SpeakerProfile,
        prompt: String,
        user_sentiment: Option<SentimentResult>,
    ) -> GenerationRequest {
        let config = &self.inner.config;
        GenerationRequest {
            speaker,
            recent_window: session.recent_window(config.context_window),
            prompt,
            thematic_directive: session
                .thematic_directive
                .as_deref()
                .map(|d| prompts::truncate_chars(d, config.directive_limit)),
            historical_context: session
                .historical_context
                .as_deref()
                .map(|h| prompts::truncate_chars(h, config.history_limit)),
            user_sentiment,
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let limit = self.inner.config.generation_timeout;
        match tokio::time::timeout(limit, self.inner.generator.generate(request)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(Ok(_)) => Err(GenerationError::Empty),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GenerationError::Timeout(limit)),
        }
    }

    fn append_if_current(&self, epoch: u64, turn: Turn) -> Option<TurnId> {
        let mut state = self.inner.state();
        if !state.session.accepts(epoch) {
            debug!(epoch, current = state.session.epoch, speaker = %turn.speaker_label, "stale generation discarded");
            return None;
        }
        let id = state.session.push(turn);
        state.emit();
        Some(id)
    }

    /// Synthesize `text` in `speaker`'s voice, attach the clip and play it.
    /// Returns `None` when the turn stayed silent.
    async fn voice_turn(
        &self,
        epoch: u64,
        turn_id: TurnId,
        speaker: &Persona,
        text: &str,
    ) -> Option<PlaybackOutcome> {
        let sentiment = self.inner.analyzer.analyze(text);
        let adjustment = self.inner.advisor.recommend(&sentiment, speaker.personality);
        let settings = adjustment.apply(speaker.base_settings());
        debug!(
            %turn_id,
            speaker = %speaker.name,
            stability = settings.stability,
            similarity = settings.similarity,
            rationale = %adjustment.rationale,
            "voice parameters"
        );

        let limit = self.inner.config.synthesis_timeout;
        let synthesis = tokio::time::timeout(
            limit,
            self.inner.synthesizer.synthesize(text, &speaker.voice_id, settings),
        )
        .await;
        let locator = match synthesis {
            Ok(Ok(locator)) => locator,
            Ok(Err(e)) => {
                warn!(%turn_id, speaker = %speaker.name, error = %e, "synthesis failed; turn stays text-only");
                return None;
            }
            Err(_) => {
                warn!(%turn_id, speaker = %speaker.name, ?limit, "synthesis timed out; turn stays text-only");
                return None;
            }
        };

        let attached = {
            let mut state = self.inner.state();
            if !state.session.accepts(epoch) {
                debug!(epoch, %turn_id, "stale synthesis discarded");
                false
            } else if let Some(turn) = state.session.turn_mut(turn_id) {
                turn.audio = Some(locator.clone());
                state.emit();
                true
            } else {
                false
            }
        };
        if !attached {
            self.release_clips(vec![locator]);
            return None;
        }

        let inner = self.inner.as_ref();
        let outcome = inner
            .sequencer
            .play_guarded(turn_id, &locator, inner, || inner.accepts(epoch))
            .await;
        debug!(%turn_id, ?outcome, "playback settled");
        Some(outcome)
    }

    /// Hand clips nobody can replay any more back to the synthesizer.
    fn release_clips(&self, clips: Vec<AudioLocator>) {
        if clips.is_empty() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            debug!(count = clips.len(), "no runtime; clips left in place");
            return;
        };
        let synthesizer = self.inner.synthesizer.clone();
        runtime.spawn(async move {
            for clip in clips {
                if let Err(e) = synthesizer.release(&clip).await {
                    warn!(%clip, error = %e, "could not release clip");
                }
            }
        });
    }
}

fn current_runtime() -> ConversationResult<Handle> {
    Handle::try_current().map_err(|_| ConversationError::NoRuntime)
}

/// Assembles a [`ConversationOrchestrator`]. Every collaborator has an offline default.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    host: Persona,
    generator: Option<Arc<dyn ResponseGenerator>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    player: Option<Arc<dyn AudioPlayer>>,
    advisor: VoiceParameterAdvisor,
    rng: Option<Box<dyn RngCore + Send>>,
    participants: Vec<Arc<Persona>>,
    thematic_directive: Option<String>,
    historical_context: Option<String>,
    observer: Option<SnapshotObserver>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            host: crate::config::HostConfig::default().persona(),
            generator: None,
            synthesizer: None,
            player: None,
            advisor: VoiceParameterAdvisor::new(),
            rng: None,
            participants: Vec::new(),
            thematic_directive: None,
            historical_context: None,
            observer: None,
        }
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: Persona) -> Self {
        self.host = host;
        self
    }

    pub fn generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn player(mut self, player: Arc<dyn AudioPlayer>) -> Self {
        self.player = Some(player);
        self
    }

    pub fn advisor(mut self, advisor: VoiceParameterAdvisor) -> Self {
        self.advisor = advisor;
        self
    }

    /// Source of randomness for speaker and delay selection.
    pub fn rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }

    pub fn seed(self, seed: u64) -> Self {
        self.rng(StdRng::seed_from_u64(seed))
    }

    pub fn participants(mut self, participants: Vec<Arc<Persona>>) -> Self {
        self.participants = participants;
        self
    }

    pub fn participant(mut self, persona: Persona) -> Self {
        self.participants.push(Arc::new(persona));
        self
    }

    pub fn thematic_directive(mut self, directive: Option<String>) -> Self {
        self.thematic_directive = directive;
        self
    }

    pub fn historical_context(mut self, context: Option<String>) -> Self {
        self.historical_context = context;
        self
    }

    pub fn observer(mut self, observer: SnapshotObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> ConversationOrchestrator {
        let mut session = Session::new(self.participants);
        session.thematic_directive = self.thematic_directive.filter(|d| !d.trim().is_empty());
        session.historical_context = self.historical_context.filter(|h| !h.trim().is_empty());

        let player = self
            .player
            .unwrap_or_else(|| Arc::new(SilentPlayer::new()) as Arc<dyn AudioPlayer>);
        let rng = self
            .rng
            .unwrap_or_else(|| Box::new(StdRng::from_entropy()) as Box<dyn RngCore + Send>);

        ConversationOrchestrator {
            inner: Arc::new(Inner {
                config: self.config,
                host: Arc::new(self.host.normalized()),
                generator: self
                    .generator
                    .unwrap_or_else(|| Arc::new(PlaceholderGenerator) as Arc<dyn ResponseGenerator>),
                synthesizer: self.synthesizer.unwrap_or_else(|| {
                    Arc::new(PlaceholderSynthesizer) as Arc<dyn SpeechSynthesizer>
                }),
                sequencer: PlaybackSequencer::new(player),
                analyzer: SentimentAnalyzer::new(),
                advisor: self.advisor,
                rng: Mutex::new(rng),
                state: Mutex::new(SessionState {
                    session,
                    observer: self.observer,
                }),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Personality;

    fn orchestrator() -> ConversationOrchestrator {
        ConversationOrchestrator::builder()
            .seed(7)
            .participant(Persona::new("Ava", Personality::Cheerful, "voice-ava"))
            .participant(Persona::new("Ben", Personality::Sarcastic, "voice-ben"))
            .build()
    }

    #[test]
    fn responder_prefers_named_participant() {
        let orch = orchestrator();
        let participants = orch.snapshot().participants;
        for _ in 0..20 {
            let picked = orch.pick_responder(&participants, "ben, what do you think?");
            assert_eq!(picked.name, "Ben");
        }
    }

    #[test]
    fn delays_stay_inside_window() {
        let orch = orchestrator();
        for _ in 0..200 {
            let delay = orch.draw_delay();
            assert!(delay >= Duration::from_millis(3500) && delay <= Duration::from_millis(6000));
        }
    }

    #[test]
    fn host_probability_extremes() {
        let mut config = OrchestratorConfig::default();
        config.host_probability = 1.0;
        let orch = ConversationOrchestrator::builder()
            .config(config)
            .seed(1)
            .participant(Persona::new("Ava", Personality::Wise, "v"))
            .build();
        let participants = orch.snapshot().participants;
        for _ in 0..20 {
            assert!(matches!(orch.pick_speaker(&participants), Speaker::Host));
        }
        assert!(matches!(orch.pick_speaker(&[]), Speaker::Host));
    }

    #[test]
    fn requests_truncate_directive_and_history() {
        let orch = ConversationOrchestrator::builder()
            .seed(3)
            .participant(Persona::new("Ava", Personality::Wise, "v"))
            .thematic_directive(Some("d".repeat(800)))
            .historical_context(Some("h".repeat(5000)))
            .build();
        let state = orch.inner.state();
        let request = orch.request_for(
            &state.session,
            SpeakerProfile::for_host(&orch.inner.host),
            "go".into(),
            None,
        );
        assert_eq!(request.thematic_directive.map(|d| d.len()), Some(500));
        assert_eq!(request.historical_context.map(|h| h.len()), Some(1000));
        assert!(request.speaker.is_host);
    }

    #[test]
    fn start_outside_runtime_is_an_error() {
        let orch = orchestrator();
        assert!(matches!(orch.start_conversation(), Err(ConversationError::NoRuntime)));
        let snap = orch.snapshot();
        assert_eq!(snap.epoch, 0);
        assert!(!snap.is_active);
        assert!(snap.turns.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_last_handle_ends_the_loop() {
        let orch = orchestrator();
        let weak = Arc::downgrade(&orch.inner);
        orch.start_conversation().expect("start");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(orch.snapshot().next_turn_scheduled);

        drop(orch);
        assert!(weak.upgrade().is_none());
        // the aborted timer never resurrects the session
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(weak.upgrade().is_none());
    }
}
