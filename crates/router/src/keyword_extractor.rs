//! Tokenisation, stop-word filtering, n-gram phrases, intent and entity
//! extraction over a raw user message (spec §4.4).

use regex::Regex;
use std::sync::OnceLock;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "to", "of", "in", "on", "at", "for", "with", "is",
    "are", "was", "were", "be", "been", "i", "you", "it", "my", "me", "this", "that", "please",
    "can", "could", "would",
];

/// Symbolic intent tags. Advisory only — they feed routing scores, never
/// execution (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Log,
    Query,
    Statistics,
    Delete,
    CheckIn,
    Create,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Log => "log",
            Intent::Query => "query",
            Intent::Statistics => "statistics",
            Intent::Delete => "delete",
            Intent::CheckIn => "check-in",
            Intent::Create => "create",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedMessage {
    pub keywords: Vec<String>,
    pub phrases: Vec<String>,
    pub intents: Vec<Intent>,
    pub entities: Vec<String>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn keep_for_phrase(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| t.len() >= 3 && !STOP_WORDS.contains(&t.as_str()))
        .cloned()
        .collect()
}

/// N-grams of length 2 and 3 built from `kept` tokens, in order.
fn ngrams(kept: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for n in 2..=3usize {
        if kept.len() < n {
            continue;
        }
        for window in kept.windows(n) {
            out.push(window.join(" "));
        }
    }
    out
}

const INTENT_TRIGGERS: &[(&[&str], Intent)] = &[
    (&["log", "track", "record"], Intent::Log),
    (&["show", "query", "list"], Intent::Query),
    (&["stat", "stats", "streak", "summary"], Intent::Statistics),
    (&["delete", "remove"], Intent::Delete),
    (&["check"], Intent::CheckIn), // combined with "in" below
    (&["create", "add"], Intent::Create),
];

fn detect_intents(text_lower: &str, tokens: &[String]) -> Vec<Intent> {
    let mut intents = Vec::new();
    if text_lower.contains("check in") || text_lower.contains("check-in") {
        intents.push(Intent::CheckIn);
    }
    for (triggers, intent) in INTENT_TRIGGERS {
        if *intent == Intent::CheckIn {
            continue; // handled above via phrase match, not single-token
        }
        if tokens.iter().any(|t| triggers.contains(&t.as_str())) {
            intents.push(*intent);
        }
    }
    intents.sort_by_key(|i| i.as_str());
    intents.dedup();
    intents
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap())
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b\d{1,2}(:\d{2})?\s?(am|pm)\b|\b([01]?\d|2[0-3]):[0-5]\d\b").unwrap())
}

const RELATIVE_DATES: &[&str] = &["today", "yesterday", "tomorrow", "last week", "this week"];

/// Heuristic entity extraction: dates, times, and capitalised words that
/// look like proper nouns (people/project names). Advisory only.
fn extract_entities(original: &str, text_lower: &str) -> Vec<String> {
    let mut entities = Vec::new();

    for m in date_regex().find_iter(original) {
        entities.push(m.as_str().to_string());
    }
    for m in time_regex().find_iter(original) {
        entities.push(m.as_str().to_string());
    }
    for rel in RELATIVE_DATES {
        if text_lower.contains(rel) {
            entities.push((*rel).to_string());
        }
    }
    for word in original.split_whitespace() {
        let cleaned: String = word.chars().filter(|c| c.is_alphabetic()).collect();
        if cleaned.len() >= 2 {
            let first = cleaned.chars().next().unwrap();
            if first.is_uppercase() && !entities.contains(&cleaned) {
                entities.push(cleaned);
            }
        }
    }
    entities
}

/// Extracts keywords, n-gram phrases, intents and entities from a raw
/// user message. Entities/intents feed routing scores only — never
/// execution.
pub fn extract(message: &str) -> ExtractedMessage {
    let tokens = tokenize(message);
    let kept = keep_for_phrase(&tokens);
    let text_lower = message.to_lowercase();

    ExtractedMessage {
        keywords: kept.clone(),
        phrases: ngrams(&kept),
        intents: detect_intents(&text_lower, &tokens),
        entities: extract_entities(message, &text_lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_keywords_and_drops_stop_words() {
        let r = extract("Log coding from 2pm to 4pm");
        assert!(r.keywords.contains(&"log".to_string()));
        assert!(r.keywords.contains(&"coding".to_string()));
        assert!(!r.keywords.contains(&"to".to_string()));
    }

    #[test]
    fn builds_two_and_three_word_phrases() {
        let r = extract("show my habit statistics please");
        assert!(r.phrases.iter().any(|p| p.split(' ').count() == 2));
    }

    #[test]
    fn detects_log_intent() {
        let r = extract("Log coding from 2pm to 4pm");
        assert!(r.intents.contains(&Intent::Log));
    }

    #[test]
    fn detects_check_in_phrase_intent() {
        let r = extract("check in my habit");
        assert!(r.intents.contains(&Intent::CheckIn));
    }

    #[test]
    fn detects_query_and_statistics_intent() {
        let r = extract("show my stats and streak");
        assert!(r.intents.contains(&Intent::Query));
        assert!(r.intents.contains(&Intent::Statistics));
    }

    #[test]
    fn extracts_iso_date_entity() {
        let r = extract("Delete all my records for 2026-01-25");
        assert!(r.entities.contains(&"2026-01-25".to_string()));
    }

    #[test]
    fn extracts_relative_date_entity() {
        let r = extract("what did I log today");
        assert!(r.entities.contains(&"today".to_string()));
    }

    #[test]
    fn extracts_time_entity() {
        let r = extract("Log coding from 2pm to 4pm");
        assert!(r.entities.iter().any(|e| e.eq_ignore_ascii_case("2pm")));
    }
}
