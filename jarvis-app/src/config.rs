//! Jarvis configuration loader.
//!
//! `~/.jarvis/config.toml` (or `--config`), then environment overrides, then
//! validation. A missing default file means built-in defaults.

use anyhow::{Result, anyhow};
use jarvis_llm::Provider;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JarvisConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    /// Used for the greeting until the assistant learns a name itself.
    #[serde(default)]
    pub user_name: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            user_name: None,
        }
    }
}

fn default_assistant_name() -> String {
    "Jarvis".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
    /// Ask the model for a routing decision on every non-query turn.
    #[default]
    Llm,
    /// Derive the decision from the local intent gate alone.
    Local,
}

impl RouterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RouterMode::Llm => "llm",
            RouterMode::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// "groq" or "openai". Detected from the model name when unset.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub router_mode: RouterMode,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Exchanges replayed to the model each turn.
    #[serde(default = "default_history_exchanges")]
    pub history_exchanges: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: default_model(),
            base_url: None,
            router_mode: RouterMode::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            history_exchanges: default_history_exchanges(),
        }
    }
}

fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    300
}

fn default_top_p() -> f32 {
    0.9
}

fn default_history_exchanges() -> usize {
    3
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysConfig {
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Directory holding memory.json, tasks.json and reminders.json.
    #[serde(default)]
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// JSON file with an `access_token` produced by an external OAuth helper.
    #[serde(default = "default_token_file")]
    pub token_file: String,
    #[serde(default)]
    pub auto_create_events_for_reminders: bool,
    #[serde(default)]
    pub require_sync_for_reminders: bool,
    #[serde(default = "default_popup_minutes")]
    pub popup_minutes: Option<u32>,
    #[serde(default)]
    pub email_minutes: Option<u32>,
    #[serde(default)]
    pub use_default_notifications: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            calendar_id: default_calendar_id(),
            token_file: default_token_file(),
            auto_create_events_for_reminders: false,
            require_sync_for_reminders: false,
            popup_minutes: default_popup_minutes(),
            email_minutes: None,
            use_default_notifications: false,
        }
    }
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_token_file() -> String {
    "~/.jarvis/google_token.json".to_string()
}

fn default_popup_minutes() -> Option<u32> {
    Some(0)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    /// Record OS actions instead of running them.
    #[serde(default)]
    pub dry_run: bool,
    /// Resolve YouTube music searches to the first video.
    #[serde(default = "default_true")]
    pub resolve_youtube_videos: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            resolve_youtube_videos: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl JarvisConfig {
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let explicit = path.is_some();
        let path = match path {
            Some(p) => p,
            None => default_config_path()?,
        };

        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::from_toml_str(&contents)
                .map_err(|e| anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("JARVIS_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("JARVIS_PROVIDER") {
            self.llm.provider = Some(v);
        }
        if let Some(v) = get("JARVIS_DATA_DIR") {
            self.storage.data_dir = Some(v);
        }
        if let Some(v) = get("GROQ_API_KEY").or_else(|| get("GROQ_APIKEY")) {
            self.keys.groq_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.keys.openai_api_key = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(anyhow!("llm.model is required"));
        }
        self.provider()?;
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("llm.temperature must be between 0 and 2"));
        }
        if !(0.0..=1.0).contains(&self.llm.top_p) || self.llm.top_p == 0.0 {
            return Err(anyhow!("llm.top_p must be in (0, 1]"));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be > 0"));
        }
        if self.reminders.poll_interval_secs == 0 {
            return Err(anyhow!("reminders.poll_interval_secs must be > 0"));
        }
        if self.calendar.enabled && self.calendar.calendar_id.trim().is_empty() {
            return Err(anyhow!("calendar.calendar_id is required when calendar is enabled"));
        }
        Ok(())
    }

    pub fn provider(&self) -> Result<Provider> {
        match self.llm.provider.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p.parse().map_err(|e| anyhow!("llm.provider: {e}")),
            _ => Ok(Provider::detect(&self.llm.model)),
        }
    }

    pub fn api_key(&self) -> Option<String> {
        let key = match self.provider().ok()? {
            Provider::Groq => self.keys.groq_api_key.clone(),
            Provider::OpenAi => self.keys.openai_api_key.clone(),
        };
        key.filter(|k| !k.trim().is_empty())
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match self.storage.data_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => expand_home(dir.trim()),
            _ => default_data_dir(),
        }
    }

    pub fn calendar_token_file(&self) -> Result<PathBuf> {
        expand_home(self.calendar.token_file.trim())
    }
}

fn home_dir() -> Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| anyhow!("HOME is not set"))
}

fn expand_home(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return home_dir();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }
    Ok(PathBuf::from(path))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".jarvis").join("config.toml"))
}

pub fn default_data_dir() -> Result<PathBuf> {
    Ok(Path::new(&home_dir()?).join(".jarvis").join("data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = JarvisConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.llm.model, "llama-3.1-8b-instant");
        assert_eq!(cfg.llm.router_mode, RouterMode::Llm);
        assert_eq!(cfg.llm.max_tokens, 300);
        assert_eq!(cfg.reminders.poll_interval_secs, 15);
        assert!(cfg.automation.resolve_youtube_videos);
        assert_eq!(cfg.provider().unwrap(), Provider::Groq);
        cfg.validate().unwrap();
    }

    #[test]
    fn sections_parse() {
        let cfg = JarvisConfig::from_toml_str(
            r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
router_mode = "local"

[keys]
openai_api_key = "sk-test"

[calendar]
enabled = true
require_sync_for_reminders = true

[automation]
dry_run = true
"#,
        )
        .unwrap();
        assert_eq!(cfg.provider().unwrap(), Provider::OpenAi);
        assert_eq!(cfg.llm.router_mode, RouterMode::Local);
        assert_eq!(cfg.api_key().as_deref(), Some("sk-test"));
        assert!(cfg.calendar.require_sync_for_reminders);
        assert_eq!(cfg.calendar.popup_minutes, Some(0));
        assert!(cfg.automation.dry_run);
    }

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("JARVIS_MODEL", "llama-3.3-70b-versatile"),
            ("GROQ_APIKEY", "gsk-legacy"),
            ("OPENAI_API_KEY", "  "),
            ("JARVIS_DATA_DIR", "/tmp/jarvis-test-data"),
        ]);
        let mut cfg = JarvisConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(cfg.api_key().as_deref(), Some("gsk-legacy"));
        assert!(cfg.keys.openai_api_key.is_none());
        assert_eq!(cfg.data_dir().unwrap(), PathBuf::from("/tmp/jarvis-test-data"));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = JarvisConfig::default();
        cfg.llm.provider = Some("anthropic".to_string());
        assert!(cfg.validate().is_err());

        let mut cfg = JarvisConfig::default();
        cfg.llm.top_p = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = JarvisConfig::default();
        cfg.reminders.poll_interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn explicit_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(JarvisConfig::load(Some(tmp.path().join("nope.toml"))).await.is_err());

        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[llm]\nmodel = \"gpt-4o\"\n").unwrap();
        let cfg = JarvisConfig::load(Some(path)).await.unwrap();
        assert!(!cfg.llm.model.is_empty());
    }
}
