//! Handler table: one [`ToolInvocation`] in, one [`ToolOutcome`] out.

use crate::apps;
use crate::automation::Automation;
use crate::calendar::CalendarClient;
use crate::error::{Result, ToolError};
use crate::files::{self, Locations};
use crate::invocation::{ToolInvocation, ToolKind};
use crate::memory::{self, MUSIC_PREFERENCE, MemoryRecord, MemoryStore};
use crate::reminders::{self, Reminder, ReminderPolicy, ReminderStore};
use crate::store::JsonStore;
use crate::system;
use crate::tasks::{self, Task, TaskStore};
use crate::timeparse::parse_when;
use crate::web::{self, MusicRequest};
use chrono::{Duration, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a successful tool run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub data: serde_json::Value,
}

impl ToolOutcome {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            details: None,
            data,
        }
    }

    pub(crate) fn app(message: impl Into<String>, app: &str) -> Self {
        Self::with_data(message, serde_json::json!({ "app": app }))
    }

    pub fn details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

/// The three JSON documents, shared by every front end in the process.
#[derive(Debug, Clone)]
pub struct Stores {
    pub memory: MemoryStore,
    pub tasks: TaskStore,
    pub reminders: ReminderStore,
}

impl Stores {
    pub fn open(data_dir: &Path) -> Self {
        Self {
            memory: JsonStore::<MemoryRecord>::new(data_dir.join("memory.json")),
            tasks: JsonStore::<Vec<Task>>::new(data_dir.join("tasks.json")),
            reminders: JsonStore::<Vec<Reminder>>::new(data_dir.join("reminders.json")),
        }
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.tasks.path().parent().map(Path::to_path_buf)
    }
}

pub struct ToolBox {
    automation: Arc<dyn Automation>,
    stores: Stores,
    locations: Locations,
    calendar: Option<CalendarClient>,
    reminder_policy: ReminderPolicy,
    http: Option<reqwest::Client>,
    tabs: Mutex<Vec<String>>,
}

impl ToolBox {
    pub fn new(automation: Arc<dyn Automation>, stores: Stores, locations: Locations) -> Self {
        Self {
            automation,
            stores,
            locations,
            calendar: None,
            reminder_policy: ReminderPolicy::default(),
            http: None,
            tabs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_calendar(mut self, calendar: CalendarClient) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_reminder_policy(mut self, policy: ReminderPolicy) -> Self {
        self.reminder_policy = policy;
        self
    }

    /// Enables resolving YouTube searches to a direct video link.
    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn locations(&self) -> &Locations {
        &self.locations
    }

    pub fn has_calendar(&self) -> bool {
        self.calendar.is_some()
    }

    #[tracing::instrument(level = "info", skip(self, invocation), fields(tool = %invocation.kind()))]
    pub async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        let automation = self.automation.as_ref();
        let outcome = match invocation {
            ToolInvocation::OpenWebsite(a) => {
                web::open_websites(automation, &self.tabs, &a.sites).await
            }
            ToolInvocation::CloseWebsite => web::close_website(automation, &self.tabs).await,
            ToolInvocation::OpenApp(a) => apps::open_app(automation, &a.app_name).await,
            ToolInvocation::CloseApp(a) => apps::close_app(automation, &a.app_name).await,
            ToolInvocation::FindFile(a) => {
                files::find_file(automation, &self.locations, &a.filename, a.search_path.as_deref())
                    .await
            }
            ToolInvocation::CreateFolder(a) => {
                files::create_folder(&self.locations, &a.folder_name, a.location.as_deref()).await
            }
            ToolInvocation::OpenFolder(a) => {
                files::open_folder(automation, &self.locations, &a.folder_name, a.location.as_deref())
                    .await
            }
            ToolInvocation::SystemInfo(a) => Ok(system::system_info(automation, a.info_type).await),
            ToolInvocation::ListContents(a) => {
                files::list_contents(&self.locations, a.location.as_deref()).await
            }
            ToolInvocation::AddTask(a) => tasks::add(&self.stores.tasks, &a.description).await,
            ToolInvocation::ListTasks => tasks::list(&self.stores.tasks).await,
            ToolInvocation::CompleteTask(a) => tasks::complete(&self.stores.tasks, a.task_id).await,
            ToolInvocation::AddReminder(a) => {
                reminders::add(
                    &self.stores.reminders,
                    self.calendar.as_ref(),
                    self.reminder_policy,
                    &a.description,
                    &a.time_str,
                )
                .await
            }
            ToolInvocation::ListReminders => reminders::list(&self.stores.reminders).await,
            ToolInvocation::AddCalendarEvent(a) => {
                self.add_calendar_event(&a.summary, &a.time_str, a.duration_minutes)
                    .await
            }
            ToolInvocation::SetMusicPreference(a) => {
                memory::set_music_preference(&self.stores.memory, &a.preference).await
            }
            ToolInvocation::PlayMusic(a) => {
                let saved = self.stores.memory.load().await;
                let request = MusicRequest {
                    requested: a.query.as_deref(),
                    saved_preference: saved.preference(MUSIC_PREFERENCE),
                    platform: a.platform,
                };
                web::play_music(automation, &self.tabs, self.http.as_ref(), request).await
            }
        };

        match &outcome {
            Ok(out) => tracing::info!(message = %out.message, "tool succeeded"),
            Err(e) => tracing::warn!(error = %e, "tool failed"),
        }
        outcome
    }

    async fn add_calendar_event(
        &self,
        summary: &str,
        time_str: &str,
        duration_minutes: u32,
    ) -> Result<ToolOutcome> {
        let Some(calendar) = &self.calendar else {
            return Err(ToolError::Unsupported(
                "Calendar integration is not configured.".to_string(),
            ));
        };
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(ToolError::InvalidArguments(
                "The event needs a title.".to_string(),
            ));
        }
        let Some(start) = parse_when(time_str, &Local::now()) else {
            return Err(ToolError::InvalidArguments(format!(
                "I couldn't understand the time '{time_str}'."
            )));
        };
        let minutes = duration_minutes.clamp(1, 24 * 60);
        let event = calendar
            .create_event(summary, &start, Duration::minutes(i64::from(minutes)))
            .await?;
        Ok(ToolOutcome::with_data(
            format!(
                "Added '{summary}' to your calendar at {}.",
                start.format("%I:%M %p on %b %d, %Y")
            ),
            serde_json::json!({ "event_id": event.id, "link": event.html_link }),
        ))
    }
}

/// Tool names in the order they are advertised.
pub fn tool_names() -> Vec<&'static str> {
    ToolKind::ALL.iter().map(|k| k.name()).collect()
}
