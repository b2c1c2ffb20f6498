use crate::calendar::{CalendarClient, CreatedEvent};
use crate::error::{Result, ToolError};
use crate::store::JsonStore;
use crate::timeparse::parse_when;
use crate::toolbox::ToolOutcome;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: u64,
    pub description: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub remind_at: DateTime<Utc>,
    #[serde(default)]
    pub reminded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_event_link: Option<String>,
}

pub type ReminderStore = JsonStore<Vec<Reminder>>;

/// How add_reminder treats the calendar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub sync_to_calendar: bool,
    pub require_calendar_sync: bool,
}

pub fn describe_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%I:%M %p on %b %d, %Y").to_string()
}

impl JsonStore<Vec<Reminder>> {
    pub async fn add_reminder(
        &self,
        description: &str,
        remind_at: DateTime<Utc>,
        event: Option<&CreatedEvent>,
    ) -> Result<Reminder> {
        self.update(|reminders| {
            let id = reminders.iter().map(|r| r.id).max().unwrap_or(0) + 1;
            let reminder = Reminder {
                id,
                description: description.to_string(),
                created_at: Utc::now(),
                remind_at,
                reminded: false,
                reminded_at: None,
                calendar_event_id: event.map(|e| e.id.clone()),
                calendar_event_link: event.and_then(|e| e.html_link.clone()),
            };
            reminders.push(reminder.clone());
            Ok(reminder)
        })
        .await
    }

    /// Reminders not yet delivered, soonest first.
    pub async fn pending_reminders(&self) -> Vec<Reminder> {
        let mut pending: Vec<Reminder> = self
            .load()
            .await
            .into_iter()
            .filter(|r| !r.reminded)
            .collect();
        pending.sort_by_key(|r| r.remind_at);
        pending
    }

    /// Mark every pending reminder due at `now` as delivered and return them.
    pub async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        // Skip the write entirely on the common empty tick.
        if !self
            .load()
            .await
            .iter()
            .any(|r| !r.reminded && r.remind_at <= now)
        {
            return Ok(Vec::new());
        }
        self.update(|reminders| {
            let mut due = Vec::new();
            for r in reminders.iter_mut().filter(|r| !r.reminded && r.remind_at <= now) {
                r.reminded = true;
                r.reminded_at = Some(now);
                due.push(r.clone());
            }
            due.sort_by_key(|r| r.remind_at);
            Ok(due)
        })
        .await
    }
}

#[tracing::instrument(level = "info", skip(store, calendar))]
pub(crate) async fn add(
    store: &ReminderStore,
    calendar: Option<&CalendarClient>,
    policy: ReminderPolicy,
    description: &str,
    time_str: &str,
) -> Result<ToolOutcome> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ToolError::InvalidArguments(
            "Reminder description cannot be empty.".to_string(),
        ));
    }
    let Some(when) = parse_when(time_str, &Local::now()) else {
        return Err(ToolError::InvalidArguments(format!(
            "I couldn't understand the time '{time_str}'. Try something like 'in 20 minutes' or 'tomorrow at 6 PM'."
        )));
    };
    if when <= Local::now() {
        return Err(ToolError::InvalidArguments(
            "Reminder time must be in the future.".to_string(),
        ));
    }

    let mut event = None;
    if policy.sync_to_calendar || policy.require_calendar_sync {
        match calendar {
            Some(client) => match client.create_reminder_event(description, &when).await {
                Ok(created) => event = Some(created),
                Err(e) if policy.require_calendar_sync => {
                    return Err(ToolError::ExecutionFailed(format!(
                        "Reminder was not saved because calendar sync failed: {}",
                        e.user_message()
                    )));
                }
                Err(e) => tracing::warn!(error = %e, "reminder calendar sync failed; saving locally"),
            },
            None if policy.require_calendar_sync => {
                return Err(ToolError::Unsupported(
                    "Reminder was not saved because calendar integration is unavailable."
                        .to_string(),
                ));
            }
            None => {}
        }
    }

    let reminder = store
        .add_reminder(description, when.with_timezone(&Utc), event.as_ref())
        .await?;
    let shown = describe_time(&reminder.remind_at);
    let message = if reminder.calendar_event_id.is_some() {
        format!(
            "Reminder saved and synced to Google Calendar. I will remind you to {} at {shown}.",
            reminder.description
        )
    } else {
        format!(
            "Reminder saved. I will remind you to {} at {shown}.",
            reminder.description
        )
    };
    Ok(ToolOutcome::with_data(
        message,
        serde_json::json!({
            "reminder_id": reminder.id,
            "remind_at": reminder.remind_at,
            "calendar_event_link": reminder.calendar_event_link,
        }),
    ))
}

pub(crate) async fn list(store: &ReminderStore) -> Result<ToolOutcome> {
    let pending = store.pending_reminders().await;
    if pending.is_empty() {
        return Ok(ToolOutcome::with_data(
            "You have no pending reminders.".to_string(),
            serde_json::json!({ "reminders": [] }),
        ));
    }
    let lines: Vec<String> = pending
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} at {}", i + 1, r.description, describe_time(&r.remind_at)))
        .collect();
    let noun = if pending.len() == 1 { "reminder" } else { "reminders" };
    Ok(ToolOutcome::with_data(
        format!("You have {} pending {noun}:\n{}", pending.len(), lines.join("\n")),
        serde_json::json!({ "reminders": pending }),
    ))
}
