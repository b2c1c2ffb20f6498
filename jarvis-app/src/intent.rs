//! Local keyword gate run before any model call.
//!
//! The gate is deliberately conservative: text it cannot place is a query,
//! and a query never executes tools no matter what the model returns.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Query,
    Action,
    Automation,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Query => "query",
            Intent::Action => "action",
            Intent::Automation => "automation",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "query" => Some(Intent::Query),
            "action" => Some(Intent::Action),
            "automation" => Some(Intent::Automation),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const WAKE_WORDS: &[&str] = &["hey jarvis", "ok jarvis", "okay jarvis", "jarvis"];

const AUTOMATION_CUES: &[&str] = &["and then", "after that", "routine", "workflow", "sequence"];

const POLITE_PREFIXES: &[&str] = &["can you ", "could you ", "would you ", "please "];

const QUERY_PREFIXES: &[&str] = &[
    "what",
    "which",
    "how",
    "why",
    "when",
    "where",
    "who",
    "can you explain",
    "tell me",
    "help me understand",
];

const QUERY_CUES: &[&str] = &[
    "what command",
    "which command",
    "how do i",
    "how to",
    "what should i",
    "explain",
    "difference between",
];

const ACTION_VERBS: &[&str] = &[
    "open", "close", "quit", "exit", "launch", "start", "create", "make", "list", "show", "find",
    "add", "set", "complete", "finish", "remind", "schedule", "play", "save", "remember",
];

fn normalize(text: &str) -> String {
    let mut t = text.trim().to_lowercase();
    for wake in WAKE_WORDS {
        if let Some(rest) = t.strip_prefix(wake) {
            // Only a whole wake word: "jarvisx" stays as is.
            if rest.is_empty() || !rest.starts_with(|c: char| c.is_alphanumeric()) {
                t = rest.to_string();
                break;
            }
        }
    }
    t.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | ':' | ';'))
        .to_string()
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
}

fn has_action_verb(text: &str) -> bool {
    words(text).any(|w| ACTION_VERBS.contains(&w))
}

fn starts_with_action_verb(text: &str) -> bool {
    words(text).next().is_some_and(|w| ACTION_VERBS.contains(&w))
}

/// Classify a raw command. Pure; no I/O.
pub fn classify(text: &str) -> Intent {
    let t = normalize(text);
    if t.is_empty() {
        return Intent::Query;
    }

    if AUTOMATION_CUES.iter().any(|c| t.contains(c)) && has_action_verb(&t) {
        return Intent::Automation;
    }

    // "can you open safari?" is a request, "can you explain how to open X" is not.
    if let Some(rest) = POLITE_PREFIXES.iter().find_map(|p| t.strip_prefix(p)) {
        if starts_with_action_verb(rest) {
            return Intent::Action;
        }
    }

    if QUERY_PREFIXES.iter().any(|p| t.starts_with(p)) || QUERY_CUES.iter().any(|c| t.contains(c)) {
        return Intent::Query;
    }

    if has_action_verb(&t) {
        return Intent::Action;
    }
    Intent::Query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_commands_are_actions() {
        assert_eq!(classify("Close Terminal"), Intent::Action);
        assert_eq!(classify("open YouTube and Spotify"), Intent::Action);
        assert_eq!(classify("Jarvis, play some lofi"), Intent::Action);
        assert_eq!(classify("remind me to call mom tomorrow at 6 PM"), Intent::Action);
        assert_eq!(classify("Can you open Safari?"), Intent::Action);
        assert_eq!(classify("please add task buy milk"), Intent::Action);
    }

    #[test]
    fn questions_are_queries() {
        assert_eq!(classify("Which command clears terminal on Mac?"), Intent::Query);
        assert_eq!(classify("How do I close an app?"), Intent::Query);
        assert_eq!(classify("can you explain how to open a terminal"), Intent::Query);
        assert_eq!(classify("tell me a joke"), Intent::Query);
        assert_eq!(classify("what's the difference between rm and rmdir"), Intent::Query);
    }

    #[test]
    fn ambiguous_text_defaults_to_query() {
        assert_eq!(classify(""), Intent::Query);
        assert_eq!(classify("   jarvis   "), Intent::Query);
        assert_eq!(classify("good morning"), Intent::Query);
        assert_eq!(classify("the opener was great"), Intent::Query);
    }

    #[test]
    fn multi_step_requests_are_automation() {
        assert_eq!(
            classify("open Spotify and then play my focus playlist"),
            Intent::Automation
        );
        assert_eq!(classify("run my morning routine"), Intent::Query);
        assert_eq!(classify("start my morning routine"), Intent::Automation);
    }

    #[test]
    fn intent_names_round_trip() {
        for intent in [Intent::Query, Intent::Action, Intent::Automation] {
            assert_eq!(Intent::parse(intent.as_str()), Some(intent));
        }
        assert_eq!(Intent::parse(" ACTION "), Some(Intent::Action));
        assert_eq!(Intent::parse("chat"), None);
    }
}
