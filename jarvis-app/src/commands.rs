//! Slash commands handled before the assistant pipeline.

use crate::session::Session;
use std::path::Path;
use std::time::Duration;

/// What `/status` reports about the running assistant.
#[derive(Debug, Clone)]
pub struct StatusInfo<'a> {
    pub model: &'a str,
    pub router_mode: &'a str,
    pub data_dir: &'a Path,
    pub uptime: Duration,
}

const HELP: &str = "\
Commands:
  /new     start a fresh conversation
  /status  model, router mode, data directory and uptime
  /tools   list the tools I can use
  /help    this message
Say `exit` or `quit` to leave.";

/// `None` when the input is not a slash command and should go to the assistant.
pub fn handle_command(status: &StatusInfo<'_>, session: &mut Session, input: &str) -> Option<String> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let command = trimmed.split_whitespace().next().unwrap_or(trimmed);
    match command.to_ascii_lowercase().as_str() {
        "/new" => {
            session.reset();
            Some("Session reset.".to_string())
        }
        "/status" => Some(format!(
            "model={}\nrouter_mode={}\ndata_dir={}\nuptime_seconds={}",
            status.model,
            status.router_mode,
            status.data_dir.display(),
            status.uptime.as_secs()
        )),
        "/tools" => Some(format!("tools={}", jarvis_tools::tool_names().join(","))),
        "/help" => Some(HELP.to_string()),
        _ => Some("Unknown command. Supported: /new /status /tools /help".to_string()),
    }
}
