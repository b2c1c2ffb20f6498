use crate::invocation::ToolKind;
use jarvis_llm::ToolDefinition;
use serde_json::{Value, json};

const LOCATION_HINT: &str =
    "'desktop', 'downloads', 'documents', 'home', 'pictures', 'movies', 'music', or a full path";

/// Schema advertised to the model for one tool.
pub fn tool_definition(kind: ToolKind) -> ToolDefinition {
    let (description, parameters) = describe(kind);
    ToolDefinition {
        name: kind.name().to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// Every tool, in registry order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.into_iter().map(tool_definition).collect()
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn describe(kind: ToolKind) -> (&'static str, Value) {
    match kind {
        ToolKind::OpenWebsite => (
            "Open one or more websites in the default browser. Accepts site names or full URLs.",
            object(
                json!({
                    "sites": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Website names or URLs, e.g. ['YouTube', 'github.com']"
                    }
                }),
                &["sites"],
            ),
        ),
        ToolKind::CloseWebsite => (
            "Close the browser tab most recently opened by the assistant.",
            object(json!({}), &[]),
        ),
        ToolKind::OpenApp => (
            "Open or launch an application on the Mac, e.g. Safari, Notes, Spotify, VS Code.",
            object(
                json!({
                    "app_name": {"type": "string", "description": "Application name, e.g. 'Spotify'"}
                }),
                &["app_name"],
            ),
        ),
        ToolKind::CloseApp => (
            "Quit a running application on the Mac. Use for 'close Terminal' or 'quit Spotify'.",
            object(
                json!({
                    "app_name": {"type": "string", "description": "Application to quit, e.g. 'Terminal'"}
                }),
                &["app_name"],
            ),
        ),
        ToolKind::FindFile => (
            "Search for a file or folder by name and report where it is.",
            object(
                json!({
                    "filename": {"type": "string", "description": "Full or partial name, e.g. 'resume.pdf'"},
                    "search_path": {"type": "string", "description": format!("Optional place to search: {LOCATION_HINT}")}
                }),
                &["filename"],
            ),
        ),
        ToolKind::CreateFolder => (
            "Create a new folder. Defaults to the Desktop.",
            object(
                json!({
                    "folder_name": {"type": "string", "description": "Name of the folder to create"},
                    "location": {"type": "string", "description": format!("Optional parent: {LOCATION_HINT}")}
                }),
                &["folder_name"],
            ),
        ),
        ToolKind::OpenFolder => (
            "Open a folder in Finder, e.g. 'open the Jarvis folder on desktop'.",
            object(
                json!({
                    "folder_name": {"type": "string", "description": "Folder name or path, e.g. 'Jarvis'"},
                    "location": {"type": "string", "description": format!("Optional parent: {LOCATION_HINT}")}
                }),
                &["folder_name"],
            ),
        ),
        ToolKind::SystemInfo => (
            "Report battery, disk space, the current time, running apps or Wi-Fi network.",
            object(
                json!({
                    "info_type": {
                        "type": "string",
                        "enum": ["battery", "disk", "time", "running_apps", "wifi", "all"]
                    }
                }),
                &["info_type"],
            ),
        ),
        ToolKind::ListContents => (
            "List the files and folders inside a directory, e.g. 'what's on my desktop'.",
            object(
                json!({
                    "location": {"type": "string", "description": format!("Folder to list: {LOCATION_HINT}. Default desktop.")}
                }),
                &["location"],
            ),
        ),
        ToolKind::AddTask => (
            "Add a task to the to-do list.",
            object(
                json!({
                    "description": {"type": "string", "description": "The task, e.g. 'Buy milk'"}
                }),
                &["description"],
            ),
        ),
        ToolKind::ListTasks => ("List pending tasks.", object(json!({}), &[])),
        ToolKind::CompleteTask => (
            "Mark a task as done by its id.",
            object(
                json!({
                    "task_id": {"type": "integer", "description": "Task id as shown by list_tasks"}
                }),
                &["task_id"],
            ),
        ),
        ToolKind::AddReminder => (
            "Create a reminder for a specific time.",
            object(
                json!({
                    "description": {"type": "string", "description": "What to be reminded about"},
                    "time_str": {"type": "string", "description": "When, e.g. 'tomorrow at 6 PM' or 'in 20 minutes'"}
                }),
                &["description", "time_str"],
            ),
        ),
        ToolKind::ListReminders => ("List upcoming reminders.", object(json!({}), &[])),
        ToolKind::AddCalendarEvent => (
            "Add an event to the user's Google Calendar.",
            object(
                json!({
                    "summary": {"type": "string", "description": "Event title, e.g. 'Meeting with Tony'"},
                    "time_str": {"type": "string", "description": "When, e.g. 'tomorrow at 5pm'"},
                    "duration_minutes": {"type": "integer", "description": "Duration in minutes. Default 60."}
                }),
                &["summary", "time_str"],
            ),
        ),
        ToolKind::SetMusicPreference => (
            "Save the user's music taste (genre, artist or vibe).",
            object(
                json!({
                    "preference": {"type": "string", "description": "e.g. 'lofi and chillhop'"}
                }),
                &["preference"],
            ),
        ),
        ToolKind::PlayMusic => (
            "Play music for a requested song, artist or vibe, or the saved preference.",
            object(
                json!({
                    "query": {"type": "string", "description": "Optional song, artist, genre or vibe"},
                    "platform": {"type": "string", "enum": ["spotify", "youtube"]}
                }),
                &[],
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_tool_with_valid_names() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), ToolKind::ALL.len());
        for def in &defs {
            jarvis_llm::validate_tool_name(&def.name).unwrap();
            assert_eq!(def.parameters["type"], "object");
        }
    }

    #[test]
    fn required_fields_exist_in_properties() {
        for def in tool_definitions() {
            let props = def.parameters["properties"].as_object().unwrap();
            for req in def.parameters["required"].as_array().unwrap() {
                let key = req.as_str().unwrap();
                assert!(props.contains_key(key), "{} requires {key}", def.name);
            }
        }
    }
}
