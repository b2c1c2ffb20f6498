//! Per-turn decision on whether the completion may call tools.

use crate::config::RouterMode;
use crate::intent::Intent;
use jarvis_llm::{ChatBackend, ChatMessage, ChatOptions, ToolChoice};
use serde::Serialize;

const ROUTER_SYSTEM_PROMPT: &str = "You are the intent router for a desktop assistant. \
Decide whether the user wants an explanation in text or wants something done right now. \
Reply with STRICT JSON only, with exactly the keys intent and should_use_tools. \
intent must be one of query, action, automation. \
Questions such as 'which command should I use' get should_use_tools=false. \
Direct or polite requests such as 'open capcut' or 'can you open capcut?' get should_use_tools=true.";

const ROUTER_MAX_TOKENS: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouterDecision {
    pub intent: Intent,
    pub should_use_tools: bool,
}

impl RouterDecision {
    /// The decision the gate alone would make.
    pub fn from_gate(gate: Intent) -> Self {
        Self {
            intent: gate,
            should_use_tools: gate != Intent::Query,
        }
    }

    fn no_tools(intent: Intent) -> Self {
        Self {
            intent,
            should_use_tools: false,
        }
    }
}

fn first_json_object(raw: &str) -> Option<serde_json::Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1")
        }
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

/// Interpret the router's reply. Anything unusable means "no tools".
pub fn parse_router_output(raw: &str, gate: Intent) -> RouterDecision {
    let trimmed = raw.trim();
    let parsed = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .filter(serde_json::Value::is_object)
        .or_else(|| first_json_object(trimmed));
    let Some(serde_json::Value::Object(obj)) = parsed else {
        return RouterDecision::no_tools(gate);
    };

    let intent = obj
        .get("intent")
        .and_then(serde_json::Value::as_str)
        .and_then(Intent::parse)
        .unwrap_or(gate);
    let should_use_tools = obj.get("should_use_tools").is_some_and(truthy);
    RouterDecision {
        intent,
        should_use_tools,
    }
}

/// Decide tool usage for one command. Never fails: errors fall back to no tools.
#[tracing::instrument(level = "info", skip(backend, command), fields(gate = %gate))]
pub async fn route(
    backend: &dyn ChatBackend,
    mode: RouterMode,
    command: &str,
    gate: Intent,
) -> RouterDecision {
    if gate == Intent::Query {
        return RouterDecision::no_tools(Intent::Query);
    }
    if mode == RouterMode::Local {
        return RouterDecision::from_gate(gate);
    }

    let messages = [
        ChatMessage::system(ROUTER_SYSTEM_PROMPT),
        ChatMessage::user(command),
    ];
    let options = ChatOptions {
        tool_choice: ToolChoice::None,
        temperature: Some(0.0),
        max_tokens: Some(ROUTER_MAX_TOKENS),
        top_p: Some(1.0),
    };
    match backend.chat(&messages, &[], &options).await {
        Ok(resp) => {
            let decision = parse_router_output(&resp.message.content, gate);
            tracing::debug!(intent = %decision.intent, should_use_tools = decision.should_use_tools, "router decided");
            decision
        }
        Err(e) => {
            tracing::warn!(error = %e, "router request failed; tools disabled for this turn");
            RouterDecision::no_tools(gate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_is_read_directly() {
        let d = parse_router_output(r#"{"intent":"action","should_use_tools":true}"#, Intent::Query);
        assert_eq!(d.intent, Intent::Action);
        assert!(d.should_use_tools);
    }

    #[test]
    fn json_inside_prose_is_found() {
        let raw = "Sure! Here you go:\n```json\n{\"intent\": \"automation\", \"should_use_tools\": \"yes\"}\n```";
        let d = parse_router_output(raw, Intent::Action);
        assert_eq!(d.intent, Intent::Automation);
        assert!(d.should_use_tools);
    }

    #[test]
    fn malformed_output_disables_tools() {
        let d = parse_router_output("I think you want to open an app", Intent::Action);
        assert_eq!(d, RouterDecision { intent: Intent::Action, should_use_tools: false });

        let d = parse_router_output(r#"{"intent":"action"}"#, Intent::Action);
        assert!(!d.should_use_tools);

        let d = parse_router_output(r#"{"intent":"chitchat","should_use_tools":"maybe"}"#, Intent::Action);
        assert_eq!(d.intent, Intent::Action);
        assert!(!d.should_use_tools);

        let d = parse_router_output(r#"["action", true]"#, Intent::Action);
        assert!(!d.should_use_tools);
    }

    #[test]
    fn string_and_numeric_flags() {
        for (flag, expected) in [("\"true\"", true), ("\"1\"", true), ("\"no\"", false), ("1", true), ("0", false)] {
            let raw = format!(r#"{{"intent":"action","should_use_tools":{flag}}}"#);
            assert_eq!(parse_router_output(&raw, Intent::Action).should_use_tools, expected, "{flag}");
        }
    }

    #[test]
    fn gate_decision_mirrors_intent() {
        assert!(!RouterDecision::from_gate(Intent::Query).should_use_tools);
        assert!(RouterDecision::from_gate(Intent::Automation).should_use_tools);
    }
}
