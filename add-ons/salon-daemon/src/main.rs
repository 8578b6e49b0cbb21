//! Salon daemon: drive a spoken multi-persona conversation from the terminal.
//!
//! Commands (one per line on stdin):
//!   /start              greet everyone and start the autonomous loop
//!   /stop               stop and clear the session
//!   /play <n>           replay turn number n (1-based)
//!   /directive <text>   set the thematic directive ("/directive" alone clears it)
//!   /quit               exit
//! Anything else is spoken to the room as the user.

use salon_core::{
    ConversationOrchestrator, OpenRouterGenerator, Persona, Personality, PlaceholderGenerator,
    ResponseGenerator, SalonConfig, SessionSnapshot, SpeakerKind, TurnId,
};
use salon_voice::{AudioPlayer, ElevenLabsSynthesizer, PlaceholderSynthesizer, SpeechSynthesizer};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[salon-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = SalonConfig::load()?;
    if config.participants.is_empty() {
        tracing::warn!("no participants configured; using the demo cast");
        config.participants = demo_cast();
    }

    let generator: Arc<dyn ResponseGenerator> = match OpenRouterGenerator::from_env() {
        Some(g) => {
            tracing::info!(model = g.model(), "text generation via OpenRouter");
            Arc::new(g)
        }
        None => {
            tracing::info!("OPENROUTER_API_KEY not set; using placeholder lines");
            Arc::new(PlaceholderGenerator)
        }
    };
    let synthesizer: Arc<dyn SpeechSynthesizer> = match ElevenLabsSynthesizer::from_env() {
        Ok(s) => {
            tracing::info!(cache = %s.cache_dir.display(), "speech via ElevenLabs");
            Arc::new(s)
        }
        Err(e) => {
            tracing::info!(reason = %e, "speech synthesis disabled; turns stay text-only");
            Arc::new(PlaceholderSynthesizer)
        }
    };

    let salon = config
        .orchestrator_builder()
        .generator(generator)
        .synthesizer(synthesizer)
        .player(player())
        .build();
    salon.set_observer(transcript_printer());

    tracing::info!(
        participants = config.participants.len(),
        host = %config.host.name,
        "Salon daemon ready; type /start"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(&salon, line.trim()).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down");
                break;
            }
        }
    }

    salon.stop_conversation();
    Ok(())
}

/// Returns false when the daemon should exit.
async fn handle_line(salon: &ConversationOrchestrator, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };
    match command {
        "/quit" | "/exit" => return false,
        "/start" => {
            if let Err(e) = salon.start_conversation() {
                tracing::warn!(error = %e, "cannot start");
            }
        }
        "/stop" => salon.stop_conversation(),
        "/directive" => {
            let directive = (!arg.is_empty()).then(|| arg.to_string());
            tracing::info!(directive = ?directive, "thematic directive set");
            salon.set_thematic_directive(directive);
        }
        "/play" => match arg.parse::<usize>() {
            Ok(n) if n >= 1 => {
                let Some(turn) = salon.snapshot().turns.get(n - 1).map(|t| t.id) else {
                    tracing::warn!(n, "no such turn");
                    return true;
                };
                let salon = salon.clone();
                tokio::spawn(async move {
                    if let Err(e) = salon.play_message_audio(turn).await {
                        tracing::warn!(error = %e, "replay failed");
                    }
                });
            }
            _ => tracing::warn!("usage: /play <turn number>"),
        },
        _ if command.starts_with('/') => tracing::warn!(command, "unknown command"),
        _ => {
            let salon = salon.clone();
            let text = line.to_string();
            tokio::spawn(async move {
                match salon.add_user_message(&text).await {
                    Ok(exchange) => tracing::debug!(
                        sentiment = exchange.user_sentiment.class.as_str(),
                        replied = exchange.reply_turn.is_some(),
                        "exchange finished"
                    ),
                    Err(e) => tracing::warn!(error = %e, "message rejected"),
                }
            });
        }
    }
    true
}

/// Print each turn once, the first time it shows up in a snapshot.
fn transcript_printer() -> impl Fn(&SessionSnapshot) + Send + Sync + 'static {
    let seen: Mutex<HashSet<TurnId>> = Mutex::new(HashSet::new());
    move |snapshot| {
        let mut seen = seen.lock().unwrap_or_else(|e| e.into_inner());
        if snapshot.turns.is_empty() {
            seen.clear();
        }
        for (i, turn) in snapshot.turns.iter().enumerate() {
            if seen.insert(turn.id) {
                let marker = match turn.kind {
                    SpeakerKind::User => ">",
                    SpeakerKind::Host => "*",
                    SpeakerKind::Persona => "-",
                };
                println!("{:>3} {} {}: {}", i + 1, marker, turn.speaker_label, turn.text);
            }
        }
    }
}

#[cfg(feature = "audio")]
fn player() -> Arc<dyn AudioPlayer> {
    match salon_voice::RodioPlayer::new() {
        Ok(p) => Arc::new(p),
        Err(e) => {
            tracing::warn!(error = %e, "no audio device; playing silently");
            Arc::new(salon_voice::SilentPlayer::new())
        }
    }
}

#[cfg(not(feature = "audio"))]
fn player() -> Arc<dyn AudioPlayer> {
    Arc::new(salon_voice::SilentPlayer::new())
}

fn demo_cast() -> Vec<Persona> {
    vec![
        Persona::new("Ava", Personality::Cheerful, "EXAVITQu4vr4xnSDxMaL"),
        Persona::new("Ben", Personality::Sarcastic, "TxGEqnHWrfWFTfGW9XjX"),
        Persona::new("Cleo", Personality::Wise, "XB0fDUnXU5powFXDhCwa"),
    ]
}
