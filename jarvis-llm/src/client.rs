use crate::error::{LlmError, Result};
use crate::openai::OpenAiClient;
use crate::types::{ChatMessage, ChatOptions, ChatResponse, ToolChoice, ToolDefinition};
use async_trait::async_trait;
use std::str::FromStr;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Groq,
    OpenAi,
}

impl Provider {
    /// Guess the provider from a model id when the config does not name one.
    pub fn detect(model: &str) -> Self {
        let m = model.to_ascii_lowercase();
        if m.starts_with("gpt-") || m.starts_with("o1") || m.starts_with("o3") || m.starts_with("o4")
        {
            return Provider::OpenAi;
        }
        Provider::Groq
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::OpenAi => "openai",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::Groq => GROQ_BASE_URL,
            Provider::OpenAi => OPENAI_BASE_URL,
        }
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAi),
            other => Err(LlmError::InvalidInput(format!(
                "unknown provider {other:?}; expected groq or openai"
            ))),
        }
    }
}

/// Anything that can answer a chat-completion request.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model(&self) -> &str;

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ChatResponse>;
}

#[derive(Clone)]
pub struct LlmClient {
    provider: Provider,
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl LlmClient {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(provider: Provider, api_key: &str, model: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(provider.as_str().to_string()));
        }
        if model.trim().is_empty() {
            return Err(LlmError::InvalidInput("model is required".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Ok(Self {
            provider,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: provider.default_base_url().to_string(),
            client,
        })
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.base_url = trimmed.to_string();
        }
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = self.provider.as_str(), model = %self.model))]
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        if messages.is_empty() {
            return Err(LlmError::InvalidInput("messages must not be empty".to_string()));
        }
        let tools = match options.tool_choice {
            ToolChoice::Auto => tools,
            ToolChoice::None => &[],
        };
        for t in tools {
            validate_tool_name(&t.name)?;
        }

        let endpoint = format!("{}/chat/completions", self.base_url);
        let c = OpenAiClient::new(self.client.clone(), &self.api_key, &self.model, &endpoint);
        c.chat(messages, tools, options).await
    }
}

/// Tool names must match `^[a-zA-Z0-9_-]{1,64}$` on every supported provider.
pub fn validate_tool_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(LlmError::InvalidInput(format!(
            "tool name {name:?} must be 1..=64 characters"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(LlmError::InvalidInput(format!(
            "tool name {name:?} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_detection_prefers_groq_for_open_models() {
        assert_eq!(Provider::detect("llama-3.1-8b-instant"), Provider::Groq);
        assert_eq!(Provider::detect("gpt-4o-mini"), Provider::OpenAi);
        assert_eq!(Provider::detect("o3-mini"), Provider::OpenAi);
    }

    #[test]
    fn provider_parses_from_config_strings() {
        assert_eq!("GROQ".parse::<Provider>().unwrap(), Provider::Groq);
        assert_eq!(" openai ".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!("anthropic".parse::<Provider>().is_err());
    }

    #[test]
    fn tool_names_are_validated() {
        assert!(validate_tool_name("close_app").is_ok());
        assert!(validate_tool_name("open-website").is_ok());
        assert!(validate_tool_name("shell.execute").is_err());
        assert!(validate_tool_name("").is_err());
        assert!(validate_tool_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn client_requires_key_and_model() {
        assert!(matches!(
            LlmClient::new(Provider::Groq, "  ", "llama-3.1-8b-instant"),
            Err(LlmError::MissingApiKey(_))
        ));
        assert!(LlmClient::new(Provider::Groq, "k", "").is_err());

        let c = LlmClient::new(Provider::Groq, "k", "llama-3.1-8b-instant")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(c.base_url(), "http://localhost:8080/v1");
        assert_eq!(c.model(), "llama-3.1-8b-instant");
    }
}
