//! Google Calendar event insertion.
//!
//! Only the REST call lives here. The bearer token is read from a JSON file
//! written by whatever OAuth helper the user runs; refreshing it is not our job.

use crate::error::{Result, ToolError};
use chrono::{DateTime, Duration, TimeZone};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const REMINDER_EVENT_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct CalendarSettings {
    pub calendar_id: String,
    pub token_file: PathBuf,
    pub popup_minutes: Option<u32>,
    pub email_minutes: Option<u32>,
    pub use_default_notifications: bool,
}

impl CalendarSettings {
    pub fn new(token_file: impl Into<PathBuf>) -> Self {
        Self {
            calendar_id: "primary".to_string(),
            token_file: token_file.into(),
            popup_minutes: Some(0),
            email_minutes: None,
            use_default_notifications: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    #[serde(alias = "token")]
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    id: String,
    #[serde(default)]
    html_link: Option<String>,
}

pub async fn read_access_token(path: &Path) -> Result<String> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        ToolError::Unsupported(format!(
            "calendar token file {} is unreadable: {e}",
            path.display()
        ))
    })?;
    let parsed: TokenFile = serde_json::from_str(&raw).map_err(|e| {
        ToolError::Unsupported(format!(
            "calendar token file {} is malformed: {e}",
            path.display()
        ))
    })?;
    let token = parsed.access_token.trim().to_string();
    if token.is_empty() {
        return Err(ToolError::Unsupported(
            "calendar token file has an empty access token".to_string(),
        ));
    }
    Ok(token)
}

pub fn event_body<Tz: TimeZone>(summary: &str, start: &DateTime<Tz>, duration: Duration) -> serde_json::Value
where
    Tz::Offset: std::fmt::Display,
{
    let end = start.clone() + duration;
    json!({
        "summary": summary,
        "start": { "dateTime": start.to_rfc3339() },
        "end": { "dateTime": end.to_rfc3339() },
    })
}

/// Body for the short event that mirrors a reminder, with notification overrides.
pub fn reminder_event_body<Tz: TimeZone>(
    settings: &CalendarSettings,
    description: &str,
    at: &DateTime<Tz>,
) -> serde_json::Value
where
    Tz::Offset: std::fmt::Display,
{
    let mut body = event_body(
        &format!("Jarvis Reminder: {description}"),
        at,
        Duration::minutes(REMINDER_EVENT_MINUTES),
    );
    body["description"] = json!(format!("Reminder created by Jarvis: {description}"));

    let mut overrides = Vec::new();
    if let Some(m) = settings.popup_minutes {
        overrides.push(json!({ "method": "popup", "minutes": m }));
    }
    if let Some(m) = settings.email_minutes {
        overrides.push(json!({ "method": "email", "minutes": m }));
    }
    body["reminders"] = if settings.use_default_notifications || overrides.is_empty() {
        json!({ "useDefault": true })
    } else {
        json!({ "useDefault": false, "overrides": overrides })
    };
    body
}

#[derive(Debug, Clone)]
pub struct CalendarClient {
    http: reqwest::Client,
    settings: CalendarSettings,
    base_url: String,
}

impl CalendarClient {
    pub fn new(http: reqwest::Client, settings: CalendarSettings) -> Self {
        Self {
            http,
            settings,
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn settings(&self) -> &CalendarSettings {
        &self.settings
    }

    fn events_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ToolError::ExecutionFailed(format!("invalid calendar url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ToolError::ExecutionFailed("invalid calendar url".to_string()))?
            .extend(["calendars", self.settings.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    #[tracing::instrument(level = "info", skip(self, body))]
    async fn insert(&self, body: serde_json::Value) -> Result<CreatedEvent> {
        let token = read_access_token(&self.settings.token_file).await?;
        let response = self
            .http
            .post(self.events_url()?)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response body>".to_string());
            return Err(ToolError::ExecutionFailed(format!(
                "calendar insert failed: status={status} body={body}"
            )));
        }

        let created: EventResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("calendar response: {e}")))?;
        tracing::info!(event_id = %created.id, "calendar event created");
        Ok(CreatedEvent {
            id: created.id,
            html_link: created.html_link,
        })
    }

    pub async fn create_event<Tz: TimeZone>(
        &self,
        summary: &str,
        start: &DateTime<Tz>,
        duration: Duration,
    ) -> Result<CreatedEvent>
    where
        Tz::Offset: std::fmt::Display,
    {
        self.insert(event_body(summary, start, duration)).await
    }

    pub async fn create_reminder_event<Tz: TimeZone>(
        &self,
        description: &str,
        at: &DateTime<Tz>,
    ) -> Result<CreatedEvent>
    where
        Tz::Offset: std::fmt::Display,
    {
        self.insert(reminder_event_body(&self.settings, description, at))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn start() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 5, 18, 0, 0)
            .unwrap()
    }

    #[test]
    fn event_body_spans_the_duration() {
        let body = event_body("Dentist", &start(), Duration::minutes(45));
        assert_eq!(body["summary"], "Dentist");
        assert_eq!(body["start"]["dateTime"], "2026-03-05T18:00:00+02:00");
        assert_eq!(body["end"]["dateTime"], "2026-03-05T18:45:00+02:00");
    }

    #[test]
    fn reminder_body_carries_overrides() {
        let mut settings = CalendarSettings::new("/tmp/token.json");
        settings.email_minutes = Some(10);
        let body = reminder_event_body(&settings, "stretch", &start());
        assert_eq!(body["summary"], "Jarvis Reminder: stretch");
        assert_eq!(body["end"]["dateTime"], "2026-03-05T18:05:00+02:00");
        assert_eq!(body["reminders"]["useDefault"], false);
        assert_eq!(body["reminders"]["overrides"].as_array().unwrap().len(), 2);

        settings.use_default_notifications = true;
        let body = reminder_event_body(&settings, "stretch", &start());
        assert_eq!(body["reminders"], json!({ "useDefault": true }));
    }

    #[test]
    fn events_url_escapes_calendar_id() {
        let mut settings = CalendarSettings::new("/tmp/token.json");
        settings.calendar_id = "team@group.calendar.google.com".to_string();
        let client = CalendarClient::new(reqwest::Client::new(), settings);
        assert_eq!(
            client.events_url().unwrap().as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@group.calendar.google.com/events"
        );
    }

    #[tokio::test]
    async fn token_file_accepts_either_key() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.json");
        std::fs::write(&path, r#"{"token": " abc "}"#).unwrap();
        assert_eq!(read_access_token(&path).await.unwrap(), "abc");

        std::fs::write(&path, r#"{"access_token": ""}"#).unwrap();
        assert!(read_access_token(&path).await.is_err());
        assert!(read_access_token(&tmp.path().join("missing.json")).await.is_err());
    }
}
