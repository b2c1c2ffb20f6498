use crate::error::{Result, ToolError};
use crate::store::{Document, JsonStore};
use crate::toolbox::ToolOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MUSIC_PREFERENCE: &str = "music";

/// What the assistant knows about its user. Keys are overwritten, never versioned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(default)]
    pub user_info: BTreeMap<String, String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    pub fn user_name(&self) -> Option<&str> {
        self.user_info.get("name").map(String::as_str)
    }

    pub fn preference(&self, key: &str) -> Option<&str> {
        self.preferences.get(key).map(String::as_str)
    }

    /// Compact summary for the system prompt; empty when nothing is known.
    pub fn context_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (k, v) in &self.user_info {
            lines.push(format!("User {k}: {v}"));
        }
        for (k, v) in &self.preferences {
            lines.push(format!("Preference {k}: {v}"));
        }
        for fact in self.facts.iter().rev().take(5) {
            lines.push(format!("Fact: {fact}"));
        }
        lines
    }
}

impl Document for MemoryRecord {}

pub type MemoryStore = JsonStore<MemoryRecord>;

impl JsonStore<MemoryRecord> {
    pub async fn set_user_info(&self, key: &str, value: &str) -> Result<()> {
        self.update(|m| {
            m.user_info.insert(key.to_string(), value.to_string());
            m.last_updated = Some(Utc::now());
            Ok(())
        })
        .await
    }

    pub async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        self.update(|m| {
            m.preferences.insert(key.to_string(), value.to_string());
            m.last_updated = Some(Utc::now());
            Ok(())
        })
        .await
    }

    /// Append a fact unless an equal one (ignoring case) is already stored.
    pub async fn remember_fact(&self, fact: &str) -> Result<bool> {
        let fact = fact.trim();
        if fact.is_empty() {
            return Ok(false);
        }
        let known = |m: &MemoryRecord| m.facts.iter().any(|f| f.eq_ignore_ascii_case(fact));
        if known(&self.load().await) {
            return Ok(false);
        }
        // Checked again under the lock; another writer may have added it meanwhile.
        self.update(|m| {
            if known(m) {
                return Ok(false);
            }
            m.facts.push(fact.to_string());
            m.last_updated = Some(Utc::now());
            Ok(true)
        })
        .await
    }
}

#[tracing::instrument(level = "info", skip(store))]
pub(crate) async fn set_music_preference(store: &MemoryStore, preference: &str) -> Result<ToolOutcome> {
    let preference = preference.trim();
    if preference.is_empty() {
        return Err(ToolError::InvalidArguments(
            "Please tell me what kind of music you like.".to_string(),
        ));
    }
    store.set_preference(MUSIC_PREFERENCE, preference).await?;
    Ok(ToolOutcome::with_data(
        format!("Done. I saved your music taste as {preference}."),
        serde_json::json!({ "preference": preference }),
    ))
}
