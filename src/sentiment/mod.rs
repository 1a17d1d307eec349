//! Keyword and emoji sentiment tagging.
//!
//! Thread replies are scored word by word (+1 per positive word, -1 per
//! negative word) and labelled positive at `>= 2`, negative at `<= -2`.
//! Reactions score +1, -1 or 0 by emoji name.

pub mod handler;

pub use handler::SentimentHandler;

use regex::Regex;
use serde_json::{json, Value};
use std::fmt;
use std::sync::OnceLock;

/// Score at or above which text is positive.
pub const POSITIVE_THRESHOLD: i32 = 2;

/// Score at or below which text is negative.
pub const NEGATIVE_THRESHOLD: i32 = -2;

const POSITIVE_WORDS: &[&str] = &[
    "awesome", "great", "good", "nice", "thanks", "thank", "love", "helpful", "excellent",
    "perfect", "amazing", "yes", "yup", "sure", "happy",
];

// "can't" is listed but punctuation is stripped before lookup, so it never matches.
const NEGATIVE_WORDS: &[&str] = &[
    "bad", "sad", "angry", "upset", "hate", "issue", "problem", "bug", "wrong", "no", "not",
    "can't", "cannot", "fail", "failure", "delay",
];

const POSITIVE_REACTIONS: &[&str] = &[
    "+1",
    "thumbsup",
    "white_check_mark",
    "heavy_check_mark",
    "tada",
    "partyparrot",
    "clap",
    "raised_hands",
    "sparkles",
    "smile",
    "grinning",
    "heart",
    "green_heart",
];

const NEGATIVE_REACTIONS: &[&str] = &[
    "thumbsdown",
    "-1",
    "x",
    "no_entry",
    "angry",
    "cry",
    "sob",
    "weary",
    "confused",
    "face_with_symbols_on_mouth",
];

/// Sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Normal,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Normal => "normal",
        }
    }

    /// Slack emoji shown next to the headline.
    pub fn icon(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => ":large_green_circle:",
            SentimentLabel::Negative => ":red_circle:",
            SentimentLabel::Normal => ":white_circle:",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: i32,
}

fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\s]").expect("punctuation pattern is valid"))
}

/// Classify free text.
pub fn classify_text(text: &str) -> Sentiment {
    let lowered = text.to_lowercase();
    let cleaned = punctuation().replace_all(&lowered, "");

    let mut score = 0i32;
    for word in cleaned.split_whitespace() {
        if POSITIVE_WORDS.contains(&word) {
            score += 1;
        }
        if NEGATIVE_WORDS.contains(&word) {
            score -= 1;
        }
    }

    let label = if score >= POSITIVE_THRESHOLD {
        SentimentLabel::Positive
    } else if score <= NEGATIVE_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Normal
    };

    Sentiment { label, score }
}

/// Classify a reaction by its emoji name (without colons).
pub fn classify_reaction(name: &str) -> Sentiment {
    let normalized = name.to_lowercase();
    let normalized = normalized.as_str();

    if POSITIVE_REACTIONS.contains(&normalized) {
        Sentiment {
            label: SentimentLabel::Positive,
            score: 1,
        }
    } else if NEGATIVE_REACTIONS.contains(&normalized) {
        Sentiment {
            label: SentimentLabel::Negative,
            score: -1,
        }
    } else {
        Sentiment {
            label: SentimentLabel::Normal,
            score: 0,
        }
    }
}

/// Render a one-section summary: icon and bold headline, then body lines,
/// then an "Open thread" link when a permalink is known.
pub fn summary_blocks(
    headline: &str,
    label: SentimentLabel,
    body_lines: &[String],
    link: Option<&str>,
) -> Vec<Value> {
    let mut lines = vec![format!("{} *{}*", label.icon(), headline)];
    lines.extend(body_lines.iter().filter(|l| !l.is_empty()).cloned());
    if let Some(link) = link.filter(|l| !l.is_empty()) {
        lines.push(format!("<{}|Open thread>", link));
    }

    vec![json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": lines.join("\n") }
    })]
}
