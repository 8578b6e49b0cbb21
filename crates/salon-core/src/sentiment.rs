//! Lexical sentiment scoring.
//!
//! Deterministic bag-of-words scorer: fixed positive/negative lexicons, with each hit
//! weighted by the word right before it (intensifier 1.5, diminisher 0.7).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const INTENSIFIER_WEIGHT: f32 = 1.5;
const DIMINISHER_WEIGHT: f32 = 0.7;
/// |ratio| at or below this is reported as neutral.
const POLARITY_THRESHOLD: f32 = 0.2;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").expect("static regex"));

static POSITIVE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "amazing", "awesome", "beautiful", "best", "brilliant", "calm", "cool", "delight",
        "delighted", "delightful", "enjoy", "enjoyed", "excellent", "excited", "exciting",
        "fantastic", "fascinating", "fun", "glad", "good", "grateful", "great", "happy",
        "hope", "hopeful", "incredible", "inspiring", "interesting", "joy", "kind", "laugh",
        "love", "loved", "lovely", "nice", "peaceful", "perfect", "pleased", "proud",
        "sweet", "thank", "thanks", "thrilled", "wonderful", "yay",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "afraid", "angry", "annoyed", "annoying", "anxious", "awful", "bad", "boring",
        "broken", "cry", "depressed", "disappointed", "disappointing", "disgusting", "dreadful",
        "fail", "failed", "fear", "frustrated", "frustrating", "furious", "hate", "hated",
        "horrible", "hurt", "lonely", "mad", "miserable", "pain", "sad", "scared", "sick",
        "stupid", "terrible", "tired", "ugly", "upset", "useless", "worried", "worse",
        "worst", "wrong",
    ]
    .into_iter()
    .collect()
});

static INTENSIFIERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "absolutely", "completely", "deeply", "extremely", "highly", "incredibly", "really",
        "so", "super", "totally", "truly", "utterly", "very",
    ]
    .into_iter()
    .collect()
});

static DIMINISHERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["barely", "hardly", "kinda", "mildly", "partly", "slightly", "somewhat"]
        .into_iter()
        .collect()
});

/// Two-word diminishers, matched against the two tokens before a hit.
const DIMINISHER_PHRASES: [(&str, &str); 3] = [("a", "bit"), ("a", "little"), ("kind", "of")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentClass {
    Positive,
    Negative,
    Neutral,
}

impl SentimentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentClass::Positive => "positive",
            SentimentClass::Negative => "negative",
            SentimentClass::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub class: SentimentClass,
    /// Strength of the polarity, `[0, 1]`.
    pub intensity: f32,
    /// How much lexical evidence backs the call, `[0, 1]`.
    pub confidence: f32,
}

impl SentimentResult {
    pub fn neutral() -> Self {
        Self {
            class: SentimentClass::Neutral,
            intensity: 0.0,
            confidence: 0.5,
        }
    }
}

/// Raw weighted lexicon hits for one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalScore {
    pub positive: f32,
    pub negative: f32,
    pub word_count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, text: &str) -> LexicalScore {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = WORD.find_iter(&lowered).map(|m| m.as_str()).collect();

        let mut positive = 0.0;
        let mut negative = 0.0;
        for (i, token) in tokens.iter().enumerate() {
            let is_positive = POSITIVE.contains(token);
            let is_negative = NEGATIVE.contains(token);
            if !is_positive && !is_negative {
                continue;
            }
            let weight = modifier_weight(&tokens[..i]);
            if is_positive {
                positive += weight;
            } else {
                negative += weight;
            }
        }

        LexicalScore {
            positive,
            negative,
            word_count: tokens.len(),
        }
    }

    pub fn analyze(&self, text: &str) -> SentimentResult {
        let score = self.score(text);
        let total = score.positive + score.negative;
        if total <= 0.0 {
            return SentimentResult::neutral();
        }

        let net = score.positive - score.negative;
        let ratio = net / total;
        let confidence = (total / (score.word_count as f32 * 0.1).max(1.0)).min(1.0);

        let (class, intensity) = if ratio > POLARITY_THRESHOLD {
            (SentimentClass::Positive, ratio.min(1.0))
        } else if ratio < -POLARITY_THRESHOLD {
            (SentimentClass::Negative, ratio.abs().min(1.0))
        } else {
            (SentimentClass::Neutral, ratio.abs())
        };

        SentimentResult {
            class,
            intensity: round2(intensity),
            confidence: round2(confidence),
        }
    }
}

/// Weight contributed by whatever precedes a lexicon hit.
fn modifier_weight(preceding: &[&str]) -> f32 {
    let Some(&prev) = preceding.last() else {
        return 1.0;
    };
    if preceding.len() >= 2 {
        let before = preceding[preceding.len() - 2];
        if DIMINISHER_PHRASES
            .iter()
            .any(|&(first, second)| first == before && second == prev)
        {
            return DIMINISHER_WEIGHT;
        }
    }
    if INTENSIFIERS.contains(prev) {
        INTENSIFIER_WEIGHT
    } else if DIMINISHERS.contains(prev) {
        DIMINISHER_WEIGHT
    } else {
        1.0
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
