// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic reply classification.
//!
//! Keyword rules with no network call. Quoted text (`>` lines and anything
//! after an `On ... wrote:` marker) is ignored so the classifier reads the
//! prospect's words, not our original email.

use async_trait::async_trait;
use cadence_core::types::{AdapterType, Classification, HealthStatus, Sentiment};
use cadence_core::{CadenceError, PluginAdapter, ReplyClassifier};

/// Checked first: an unsubscribe request wins over everything else.
const UNSUBSCRIBE: &[&str] = &[
    "unsubscribe", "remove me", "take me off", "opt out", "opt-out",
    "stop emailing", "stop sending", "do not contact", "don't contact",
    "do not email", "don't email",
];

const OUT_OF_OFFICE: &[&str] = &[
    "out of office", "out of the office", "on vacation", "on holiday",
    "on leave", "automatic reply", "auto-reply", "autoreply",
    "limited access to email", "away until",
];

const NOT_INTERESTED: &[&str] = &[
    "not interested", "uninterested", "no thanks", "no thank you", "not a fit",
    "not a good fit", "all set", "already have a solution", "already use",
    "not the right time", "not a priority", "pass on this",
];

const NEGATIVE: &[&str] = &[
    "spam", "annoying", "stop", "waste of time", "how did you get",
    "reported", "harassment", "leave me alone",
];

const POSITIVE: &[&str] = &[
    "interested", "sounds great", "sounds good", "let's talk", "lets talk",
    "let's chat", "book a call", "schedule a call", "set up a call",
    "send me more", "love to", "happy to chat", "keen", "tell me more",
    "count me in",
];

/// Phrases that raise the intent score.
const BUYING_SIGNALS: &[&str] = &[
    "call", "demo", "pricing", "price", "cost", "meeting", "calendar",
    "this week", "next week", "tomorrow", "budget", "trial", "proposal",
    "contract",
];

const QUESTION_STARTS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can", "could",
    "does", "do", "is", "are", "would", "will",
];

/// Built-in keyword classifier.
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify without going through the trait.
    pub fn classify_text(&self, subject: &str, body: &str) -> Classification {
        let fresh = strip_quoted(body);
        let text = format!("{} {}", strip_reply_prefix(subject), fresh).to_lowercase();
        let text = text.trim();

        if text.is_empty() {
            return Classification {
                sentiment: Sentiment::Neutral,
                intent_score: 0,
                confidence: 0.3,
            };
        }

        let signals = count_matches(text, BUYING_SIGNALS);

        let (sentiment, hits) = if let Some(n) = matches(text, UNSUBSCRIBE) {
            (Sentiment::Unsubscribe, n)
        } else if let Some(n) = matches(text, OUT_OF_OFFICE) {
            (Sentiment::OutOfOffice, n)
        } else if let Some(n) = matches(text, NOT_INTERESTED) {
            (Sentiment::NotInterested, n)
        } else if let Some(n) = matches(text, NEGATIVE) {
            (Sentiment::Negative, n)
        } else if let Some(n) = matches(text, POSITIVE) {
            (Sentiment::Positive, n)
        } else if is_question(&fresh) {
            (Sentiment::Question, 1)
        } else {
            (Sentiment::Neutral, 0)
        };

        let intent = match sentiment {
            Sentiment::Positive => 6 + signals,
            Sentiment::Question => 3 + signals,
            Sentiment::Neutral => (1 + signals).min(4),
            _ => 0,
        };

        let confidence = if hits == 0 {
            0.4
        } else {
            (0.6 + 0.1 * hits as f32).min(0.95)
        };

        Classification {
            sentiment,
            intent_score: intent.min(10) as u8,
            confidence,
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn count_matches(text: &str, patterns: &[&str]) -> usize {
    patterns.iter().filter(|p| text.contains(*p)).count()
}

fn matches(text: &str, patterns: &[&str]) -> Option<usize> {
    match count_matches(text, patterns) {
        0 => None,
        n => Some(n),
    }
}

fn is_question(body: &str) -> bool {
    if body.contains('?') {
        return true;
    }
    let lower = body.trim_start().to_lowercase();
    let first = lower.split_whitespace().next().unwrap_or_default();
    QUESTION_STARTS.contains(&first)
}

fn strip_reply_prefix(subject: &str) -> &str {
    let mut s = subject.trim();
    loop {
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("re:") || lower.starts_with("fw:") {
            s = s[3..].trim_start();
        } else if lower.starts_with("fwd:") {
            s = s[4..].trim_start();
        } else {
            return s;
        }
    }
}

/// The part of a reply body written by the sender.
fn strip_quoted(body: &str) -> String {
    let mut kept = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("On ") && trimmed.ends_with("wrote:") {
            break;
        }
        if trimmed.starts_with("-----Original Message-----") {
            break;
        }
        if trimmed.starts_with('>') {
            continue;
        }
        kept.push(line);
    }
    kept.join("\n")
}

#[async_trait]
impl PluginAdapter for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ReplyClassifier for KeywordClassifier {
    async fn classify(&self, subject: &str, body: &str) -> Result<Classification, CadenceError> {
        Ok(self.classify_text(subject, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentiment(body: &str) -> Sentiment {
        KeywordClassifier::new().classify_text("Re: Quick question", body).sentiment
    }

    #[test]
    fn unsubscribe_wins() {
        assert_eq!(sentiment("Please unsubscribe me"), Sentiment::Unsubscribe);
        assert_eq!(
            sentiment("Not interested, remove me from your list"),
            Sentiment::Unsubscribe
        );
    }

    #[test]
    fn not_interested_is_not_positive() {
        assert_eq!(sentiment("Thanks but we're not interested."), Sentiment::NotInterested);
        assert_eq!(sentiment("We're all set for now"), Sentiment::NotInterested);
    }

    #[test]
    fn out_of_office() {
        assert_eq!(
            sentiment("I am out of the office until Monday with limited access to email."),
            Sentiment::OutOfOffice
        );
    }

    #[test]
    fn positive_with_buying_signals_scores_high() {
        let c = KeywordClassifier::new()
            .classify_text("Re: hi", "Sounds great, can we book a call next week to see a demo?");
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert!(c.intent_score >= 8, "intent {}", c.intent_score);
        assert!(c.confidence > 0.6);
    }

    #[test]
    fn questions_and_neutral() {
        assert_eq!(sentiment("What does this cost?"), Sentiment::Question);
        assert_eq!(sentiment("Does it integrate with our CRM"), Sentiment::Question);
        let c = KeywordClassifier::new().classify_text("Re: hi", "Received.");
        assert_eq!(c.sentiment, Sentiment::Neutral);
        assert!(c.intent_score < 3);
    }

    #[test]
    fn negative() {
        assert_eq!(sentiment("This is spam, leave me alone"), Sentiment::Negative);
    }

    #[test]
    fn quoted_original_is_ignored() {
        let body = "Sounds good, tell me more.\n\nOn Mon, Mar 2, 2026 at 9:00 AM Sales wrote:\n> Reply unsubscribe to opt out";
        assert_eq!(sentiment(body), Sentiment::Positive);
        let body = "Not for us.\n> Interested in a demo?";
        assert_ne!(sentiment(body), Sentiment::Positive);
    }

    #[test]
    fn empty_reply_is_low_confidence_neutral() {
        let c = KeywordClassifier::new().classify_text("", "   ");
        assert_eq!(c.sentiment, Sentiment::Neutral);
        assert!(c.confidence < 0.5);
    }

    #[test]
    fn reply_prefixes_are_stripped() {
        assert_eq!(strip_reply_prefix("RE: Fwd: hello"), "hello");
    }
}
