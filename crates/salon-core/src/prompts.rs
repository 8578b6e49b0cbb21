//! Greeting/transition templates and prompt helpers.

use crate::persona::Persona;
use std::sync::Arc;

/// Theme of the thematic directive; picks the greeting template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveTheme {
    /// Emotional support, venting, coping.
    Support,
    /// Work, interviews, meetings, strategy.
    Professional,
    /// Stories, role-play, adventures.
    Narrative,
    /// Banter, hanging out.
    Casual,
}

/// Keyword classifier over the directive; a keyword matches the start of a word.
/// Support wins over Professional, which wins over Narrative, which wins over Casual.
/// `None` when nothing matches.
pub fn classify_directive(directive: Option<&str>) -> Option<DirectiveTheme> {
    let s = directive?.trim().to_lowercase();
    let words: Vec<&str> = s
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }
    let support = [
        "support", "therapy", "grief", "stress", "anxiety", "anxious", "lonely", "cope",
        "coping", "vent", "comfort", "heal", "feelings", "sad", "overwhelm",
    ];
    let professional = [
        "interview", "meeting", "business", "career", "negotiat", "presentation", "pitch",
        "strategy", "project", "client", "professional", "debate", "review", "standup",
    ];
    let narrative = [
        "story", "stories", "tale", "adventure", "quest", "role-play", "roleplay", "fantasy",
        "mystery", "detective", "legend", "campaign", "narrat", "myth",
    ];
    let casual = [
        "casual", "chat", "hang", "fun", "banter", "gossip", "party", "chill", "weekend",
        "coffee", "joke", "laugh", "relax",
    ];
    let matches = |keys: &[&str]| keys.iter().any(|k| words.iter().any(|w| w.starts_with(k)));
    if matches(&support) {
        Some(DirectiveTheme::Support)
    } else if matches(&professional) {
        Some(DirectiveTheme::Professional)
    } else if matches(&narrative) {
        Some(DirectiveTheme::Narrative)
    } else if matches(&casual) {
        Some(DirectiveTheme::Casual)
    } else {
        None
    }
}

/// "Ava", "Ava and Ben", "Ava, Ben and Cy".
pub fn join_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [only] => (*only).to_string(),
        [rest @ .., last] => format!("{} and {}", rest.join(", "), last),
    }
}

/// Host's opening line. Always names every participant.
pub fn greeting(host_name: &str, participants: &[Arc<Persona>], directive: Option<&str>) -> String {
    let names: Vec<&str> = participants.iter().map(|p| p.name.as_str()).collect();
    let who = join_names(&names);
    match classify_directive(directive) {
        Some(DirectiveTheme::Support) => format!(
            "Hi, I'm {host_name}. This is a safe, unhurried space, and with us to listen \
             are {who}. Share whatever is on your mind."
        ),
        Some(DirectiveTheme::Professional) => format!(
            "Good to have you. I'm {host_name}, and I'll keep us on track today. Joining us \
             are {who}. Let's get straight to it."
        ),
        Some(DirectiveTheme::Narrative) => format!(
            "Gather round. I'm {host_name}, your narrator. Our story begins with {who}, \
             and where it goes next is up to all of you."
        ),
        Some(DirectiveTheme::Casual) => format!(
            "Hey hey! {host_name} here. Kick back, {who} just dropped in. What's everyone up to?"
        ),
        None => format!(
            "Welcome, everyone! I'm {host_name}, your host. Today we have {who} with us. \
             Jump in whenever you like."
        ),
    }
}

/// Host fallback when generation fails: a transition that names the last speaker.
pub fn host_transition(last_speaker: Option<&str>) -> String {
    match last_speaker {
        Some(name) => format!("Thanks, {name}. Who wants to pick that up?"),
        None => "So, who wants to go first?".to_string(),
    }
}

/// Prompt for a persona answering the user directly.
pub fn user_reply_prompt(user_text: &str) -> String {
    format!(
        "The user just said: \"{user_text}\". Reply to them directly in one or two spoken sentences."
    )
}

/// Prompt for an unprompted persona turn.
pub fn autonomous_prompt(speaker_name: &str) -> String {
    format!(
        "You are {speaker_name}. Continue the conversation naturally in one or two spoken \
         sentences, reacting to what was said most recently."
    )
}

/// Prompt for a host transition turn.
pub fn host_prompt(host_name: &str) -> String {
    format!(
        "You are {host_name}, the host. Briefly bridge what was just said and invite someone \
         else to respond. One sentence."
    )
}

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Render `(speaker, text)` pairs as a transcript block.
pub fn render_window(window: &[(String, String)]) -> String {
    window
        .iter()
        .map(|(speaker, text)| format!("{speaker}: {text}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whole-word, case-insensitive mention of `name` in `text`.
pub fn mentions(text: &str, name: &str) -> bool {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return false;
    }
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .any(|word| word == name)
}
