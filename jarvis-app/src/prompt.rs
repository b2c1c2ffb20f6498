use crate::intent::Intent;
use crate::router::RouterDecision;
use crate::session::Session;
use jarvis_llm::ChatMessage;
use jarvis_tools::{Locations, MemoryRecord, ToolKind};

const RULES: &str = "\
TOOL RULES:
- \"open <app>\" uses open_app and \"close <app>\" or \"quit <app>\" uses close_app. Never use find_file for apps.
- \"open YouTube\" style site names use open_website; \"close tab\" uses close_website.
- \"open <folder> on desktop/documents/downloads\" always uses open_folder.
- \"what's on my desktop\" or \"how many folders in downloads\" uses list_contents.
- Battery, disk, time, wifi and running apps use system_info.
- Task phrasing (\"add task\", \"what are my tasks\", \"complete task 2\") uses add_task, list_tasks, complete_task.
- \"remind me to X at T\" uses add_reminder; \"show my reminders\" uses list_reminders.
- \"add to calendar\" uses add_calendar_event.
- \"my music taste is X\" uses set_music_preference; \"play some music\" uses play_music.
- Never invent absolute paths or usernames; use the runtime context below.
- Return native tool calls only. Never write tool calls as text or tags.
- Several tool calls are fine when one request names several actions.

INTENT ALGORITHM (MANDATORY):
1. Classify the request as QUERY (what/which/how/why, explanations, command syntax, advice), \
ACTION (a direct instruction to do something now) or AUTOMATION (several explicit steps).
2. QUERY: answer in concise text and call no tools. ACTION: call the tools needed. \
AUTOMATION: call tools only for steps the user spelled out.

EXAMPLES:
- \"Which command clears terminal on Mac?\" is QUERY: answer `clear` or Cmd+K in text, no tools.
- \"How do I close an app?\" is QUERY: explain, no tools.
- \"Close Terminal\" is ACTION: close_app.
- \"Open YouTube and Spotify\" is ACTION: two open_website calls or one with both sites.";

/// The main system prompt: personality, tool rules, memory and runtime context.
pub fn system_prompt(assistant_name: &str, memory: &MemoryRecord, locations: &Locations) -> String {
    let tools: Vec<&str> = ToolKind::ALL.iter().map(|k| k.name()).collect();
    let memory_lines = memory.context_lines();
    let memory_context = if memory_lines.is_empty() {
        "Nothing stored yet.".to_string()
    } else {
        memory_lines.join("; ")
    };
    let home = locations.home();
    format!(
        "You are {assistant_name}, a precise and courteous desktop assistant. \
Be direct, polished and brief; no filler.\n\n\
AVAILABLE TOOLS: {}\n\n{RULES}\n\n\
MEMORY:\n{memory_context}\n\n\
RUNTIME CONTEXT:\nOS={} | Home={} | Desktop={} | Documents={} | Downloads={}",
        tools.join(", "),
        std::env::consts::OS,
        home.display(),
        home.join("Desktop").display(),
        home.join("Documents").display(),
        home.join("Downloads").display(),
    )
}

pub fn decision_hint(gate: Intent, decision: RouterDecision) -> String {
    format!(
        "INTENT_HINT={gate}. ROUTER_DECISION intent={} should_use_tools={}. Follow the intent algorithm exactly.",
        decision.intent, decision.should_use_tools
    )
}

/// System prompt, routing hint, replayed exchanges, then the command.
pub fn build_messages(
    system: String,
    gate: Intent,
    decision: RouterDecision,
    session: &Session,
    replay: usize,
    command: &str,
) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage::system(system),
        ChatMessage::system(decision_hint(gate, decision)),
    ];
    for exchange in session.recent(replay) {
        messages.push(ChatMessage::user(exchange.user.clone()));
        messages.push(ChatMessage::assistant(exchange.assistant.clone()));
    }
    messages.push(ChatMessage::user(command));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_llm::Role;

    #[test]
    fn messages_replay_recent_exchanges_in_order() {
        let mut session = Session::new();
        for i in 0..5 {
            session.record(&format!("u{i}"), &format!("a{i}"), Vec::new());
        }
        let decision = RouterDecision { intent: Intent::Action, should_use_tools: true };
        let msgs = build_messages("sys".to_string(), Intent::Action, decision, &session, 3, "open notes");

        assert_eq!(msgs.len(), 2 + 6 + 1);
        assert_eq!(msgs[1].content, "INTENT_HINT=action. ROUTER_DECISION intent=action should_use_tools=true. Follow the intent algorithm exactly.");
        assert_eq!(msgs[2].content, "u2");
        assert_eq!(msgs[3].role, Role::Assistant);
        assert_eq!(msgs[8].content, "open notes");
    }

    #[test]
    fn system_prompt_carries_memory_and_paths() {
        let mut memory = MemoryRecord::default();
        memory.user_info.insert("name".to_string(), "Tony".to_string());
        let prompt = system_prompt("Jarvis", &memory, &Locations::new("/Users/tony"));
        assert!(prompt.starts_with("You are Jarvis"));
        assert!(prompt.contains("User name: Tony"));
        assert!(prompt.contains("Desktop=/Users/tony/Desktop"));
        assert!(prompt.contains("close_app"));
    }
}
