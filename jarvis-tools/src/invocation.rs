//! The closed set of tools the assistant can run, with typed arguments.
//!
//! Model output arrives as `(name, json-string)` pairs. [`ToolInvocation::parse`]
//! is the only way to turn one into something executable, so an unknown name or
//! a malformed argument object is rejected before any handler runs.

use crate::error::{Result, ToolError};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    OpenWebsite,
    CloseWebsite,
    OpenApp,
    CloseApp,
    FindFile,
    CreateFolder,
    OpenFolder,
    SystemInfo,
    ListContents,
    AddTask,
    ListTasks,
    CompleteTask,
    AddReminder,
    ListReminders,
    AddCalendarEvent,
    SetMusicPreference,
    PlayMusic,
}

impl ToolKind {
    pub const ALL: [ToolKind; 17] = [
        ToolKind::OpenWebsite,
        ToolKind::CloseWebsite,
        ToolKind::OpenApp,
        ToolKind::CloseApp,
        ToolKind::FindFile,
        ToolKind::CreateFolder,
        ToolKind::OpenFolder,
        ToolKind::SystemInfo,
        ToolKind::ListContents,
        ToolKind::AddTask,
        ToolKind::ListTasks,
        ToolKind::CompleteTask,
        ToolKind::AddReminder,
        ToolKind::ListReminders,
        ToolKind::AddCalendarEvent,
        ToolKind::SetMusicPreference,
        ToolKind::PlayMusic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::OpenWebsite => "open_website",
            ToolKind::CloseWebsite => "close_website",
            ToolKind::OpenApp => "open_app",
            ToolKind::CloseApp => "close_app",
            ToolKind::FindFile => "find_file",
            ToolKind::CreateFolder => "create_folder",
            ToolKind::OpenFolder => "open_folder",
            ToolKind::SystemInfo => "system_info",
            ToolKind::ListContents => "list_contents",
            ToolKind::AddTask => "add_task",
            ToolKind::ListTasks => "list_tasks",
            ToolKind::CompleteTask => "complete_task",
            ToolKind::AddReminder => "add_reminder",
            ToolKind::ListReminders => "list_reminders",
            ToolKind::AddCalendarEvent => "add_calendar_event",
            ToolKind::SetMusicPreference => "set_music_preference",
            ToolKind::PlayMusic => "play_music",
        }
    }

    /// Tools whose result text is the answer itself, as opposed to an action to confirm.
    pub fn is_informational(self) -> bool {
        matches!(
            self,
            ToolKind::FindFile
                | ToolKind::ListContents
                | ToolKind::SystemInfo
                | ToolKind::ListTasks
                | ToolKind::ListReminders
                | ToolKind::AddReminder
        )
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolKind {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self> {
        ToolKind::ALL
            .into_iter()
            .find(|k| k.name() == s.trim())
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpenWebsiteArgs {
    #[serde(alias = "site", alias = "urls", deserialize_with = "one_or_many")]
    pub sites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppArgs {
    #[serde(alias = "name", alias = "app")]
    pub app_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FindFileArgs {
    #[serde(alias = "name")]
    pub filename: String,
    #[serde(default)]
    pub search_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FolderArgs {
    #[serde(alias = "name")]
    pub folder_name: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoType {
    Battery,
    Disk,
    Time,
    RunningApps,
    Wifi,
    #[default]
    All,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemInfoArgs {
    #[serde(default)]
    pub info_type: InfoType,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListContentsArgs {
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddTaskArgs {
    #[serde(alias = "task")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompleteTaskArgs {
    #[serde(alias = "id", deserialize_with = "positive_id")]
    pub task_id: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddReminderArgs {
    #[serde(alias = "text")]
    pub description: String,
    #[serde(alias = "time")]
    pub time_str: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalendarEventArgs {
    #[serde(alias = "title")]
    pub summary: String,
    #[serde(alias = "time")]
    pub time_str: String,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
}

fn default_duration_minutes() -> u32 {
    60
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MusicPreferenceArgs {
    pub preference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicPlatform {
    #[default]
    Spotify,
    Youtube,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayMusicArgs {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub platform: MusicPlatform,
}

/// A validated tool call, ready for [`crate::ToolBox::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    OpenWebsite(OpenWebsiteArgs),
    CloseWebsite,
    OpenApp(AppArgs),
    CloseApp(AppArgs),
    FindFile(FindFileArgs),
    CreateFolder(FolderArgs),
    OpenFolder(FolderArgs),
    SystemInfo(SystemInfoArgs),
    ListContents(ListContentsArgs),
    AddTask(AddTaskArgs),
    ListTasks,
    CompleteTask(CompleteTaskArgs),
    AddReminder(AddReminderArgs),
    ListReminders,
    AddCalendarEvent(CalendarEventArgs),
    SetMusicPreference(MusicPreferenceArgs),
    PlayMusic(PlayMusicArgs),
}

impl ToolInvocation {
    /// Validate a tool name against the closed set and decode its JSON arguments.
    pub fn parse(name: &str, arguments: &str) -> Result<Self> {
        let kind: ToolKind = name.parse()?;
        let value = parse_arguments(arguments)?;
        Self::from_value(kind, value)
    }

    pub fn from_value(kind: ToolKind, value: serde_json::Value) -> Result<Self> {
        fn args<T: for<'de> Deserialize<'de>>(kind: ToolKind, v: serde_json::Value) -> Result<T> {
            serde_json::from_value(v)
                .map_err(|e| ToolError::InvalidArguments(format!("{}: {e}", kind.name())))
        }

        Ok(match kind {
            ToolKind::OpenWebsite => ToolInvocation::OpenWebsite(args(kind, value)?),
            ToolKind::CloseWebsite => ToolInvocation::CloseWebsite,
            ToolKind::OpenApp => ToolInvocation::OpenApp(args(kind, value)?),
            ToolKind::CloseApp => ToolInvocation::CloseApp(args(kind, value)?),
            ToolKind::FindFile => ToolInvocation::FindFile(args(kind, value)?),
            ToolKind::CreateFolder => ToolInvocation::CreateFolder(args(kind, value)?),
            ToolKind::OpenFolder => ToolInvocation::OpenFolder(args(kind, value)?),
            ToolKind::SystemInfo => ToolInvocation::SystemInfo(args(kind, value)?),
            ToolKind::ListContents => ToolInvocation::ListContents(args(kind, value)?),
            ToolKind::AddTask => ToolInvocation::AddTask(args(kind, value)?),
            ToolKind::ListTasks => ToolInvocation::ListTasks,
            ToolKind::CompleteTask => ToolInvocation::CompleteTask(args(kind, value)?),
            ToolKind::AddReminder => ToolInvocation::AddReminder(args(kind, value)?),
            ToolKind::ListReminders => ToolInvocation::ListReminders,
            ToolKind::AddCalendarEvent => ToolInvocation::AddCalendarEvent(args(kind, value)?),
            ToolKind::SetMusicPreference => {
                ToolInvocation::SetMusicPreference(args(kind, value)?)
            }
            ToolKind::PlayMusic => ToolInvocation::PlayMusic(args(kind, value)?),
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolInvocation::OpenWebsite(_) => ToolKind::OpenWebsite,
            ToolInvocation::CloseWebsite => ToolKind::CloseWebsite,
            ToolInvocation::OpenApp(_) => ToolKind::OpenApp,
            ToolInvocation::CloseApp(_) => ToolKind::CloseApp,
            ToolInvocation::FindFile(_) => ToolKind::FindFile,
            ToolInvocation::CreateFolder(_) => ToolKind::CreateFolder,
            ToolInvocation::OpenFolder(_) => ToolKind::OpenFolder,
            ToolInvocation::SystemInfo(_) => ToolKind::SystemInfo,
            ToolInvocation::ListContents(_) => ToolKind::ListContents,
            ToolInvocation::AddTask(_) => ToolKind::AddTask,
            ToolInvocation::ListTasks => ToolKind::ListTasks,
            ToolInvocation::CompleteTask(_) => ToolKind::CompleteTask,
            ToolInvocation::AddReminder(_) => ToolKind::AddReminder,
            ToolInvocation::ListReminders => ToolKind::ListReminders,
            ToolInvocation::AddCalendarEvent(_) => ToolKind::AddCalendarEvent,
            ToolInvocation::SetMusicPreference(_) => ToolKind::SetMusicPreference,
            ToolInvocation::PlayMusic(_) => ToolKind::PlayMusic,
        }
    }
}

/// Decode a model-produced argument string. Blank input and `null` mean "no arguments".
pub fn parse_arguments(raw: &str) -> Result<serde_json::Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))?;
    match value {
        serde_json::Value::Null => Ok(serde_json::Value::Object(Default::default())),
        serde_json::Value::Object(_) => Ok(value),
        other => Err(ToolError::InvalidArguments(format!(
            "arguments must be a JSON object, got {other}"
        ))),
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let sites = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    };
    let sites: Vec<String> = sites
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if sites.is_empty() {
        return Err(de::Error::custom("at least one site is required"));
    }
    Ok(sites)
}

fn positive_id<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(i64),
        Text(String),
    }

    let id = match NumOrText::deserialize(deserializer)? {
        NumOrText::Num(n) => n,
        NumOrText::Text(s) => s
            .trim()
            .trim_start_matches('#')
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("task_id {s:?} is not a number")))?,
    };
    if id <= 0 {
        return Err(de::Error::custom("task_id must be a positive integer"));
    }
    Ok(id as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in ToolKind::ALL {
            assert_eq!(kind.name().parse::<ToolKind>().unwrap(), kind);
        }
        assert!(matches!(
            "run_shell".parse::<ToolKind>(),
            Err(ToolError::UnknownTool(_))
        ));
    }

    #[test]
    fn close_app_accepts_name_alias() {
        let inv = ToolInvocation::parse("close_app", r#"{"name":"Terminal"}"#).unwrap();
        assert_eq!(
            inv,
            ToolInvocation::CloseApp(AppArgs {
                app_name: "Terminal".to_string()
            })
        );
        assert_eq!(inv.kind(), ToolKind::CloseApp);
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let err = ToolInvocation::parse("open_app", "{}").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("open_app"));
    }

    #[test]
    fn blank_and_null_arguments_mean_empty_object() {
        assert_eq!(
            ToolInvocation::parse("list_tasks", "").unwrap(),
            ToolInvocation::ListTasks
        );
        assert_eq!(
            ToolInvocation::parse("close_website", "null").unwrap(),
            ToolInvocation::CloseWebsite
        );
        assert!(ToolInvocation::parse("list_tasks", "[1,2]").is_err());
        assert!(ToolInvocation::parse("list_tasks", "{not json").is_err());
    }

    #[test]
    fn sites_accept_a_single_string() {
        let inv = ToolInvocation::parse("open_website", r#"{"sites":"YouTube"}"#).unwrap();
        let ToolInvocation::OpenWebsite(args) = inv else {
            panic!("expected open_website");
        };
        assert_eq!(args.sites, vec!["YouTube".to_string()]);
        assert!(ToolInvocation::parse("open_website", r#"{"sites":[]}"#).is_err());
    }

    #[test]
    fn task_id_accepts_numeric_strings_and_rejects_non_positive() {
        let inv = ToolInvocation::parse("complete_task", r#"{"task_id":"3"}"#).unwrap();
        assert_eq!(
            inv,
            ToolInvocation::CompleteTask(CompleteTaskArgs { task_id: 3 })
        );
        assert!(ToolInvocation::parse("complete_task", r#"{"task_id":0}"#).is_err());
        assert!(ToolInvocation::parse("complete_task", r#"{"task_id":"three"}"#).is_err());
    }

    #[test]
    fn enum_arguments_use_defaults_and_reject_unknown_values() {
        let inv = ToolInvocation::parse("system_info", "{}").unwrap();
        assert_eq!(
            inv,
            ToolInvocation::SystemInfo(SystemInfoArgs {
                info_type: InfoType::All
            })
        );
        let inv = ToolInvocation::parse("system_info", r#"{"info_type":"running_apps"}"#).unwrap();
        assert_eq!(
            inv,
            ToolInvocation::SystemInfo(SystemInfoArgs {
                info_type: InfoType::RunningApps
            })
        );
        assert!(ToolInvocation::parse("play_music", r#"{"platform":"tidal"}"#).is_err());

        let inv = ToolInvocation::parse("add_calendar_event", r#"{"summary":"Sync","time_str":"tomorrow 5pm"}"#)
            .unwrap();
        let ToolInvocation::AddCalendarEvent(args) = inv else {
            panic!("expected add_calendar_event");
        };
        assert_eq!(args.duration_minutes, 60);
    }
}
