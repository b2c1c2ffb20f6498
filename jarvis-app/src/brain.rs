//! Router decision plus one chat completion per turn.

use crate::config::{LlmConfig, RouterMode};
use crate::intent::Intent;
use crate::prompt;
use crate::router::{self, RouterDecision};
use crate::session::Session;
use jarvis_llm::{ChatBackend, ChatOptions, ToolCall, ToolChoice, ToolDefinition};
use std::sync::Arc;

pub const DEGRADED_REPLY: &str = "I ran into a processing issue. Please repeat that once.";
const EMPTY_REPLY: &str = "I don't have an answer for that yet.";

#[derive(Debug, Clone, PartialEq)]
pub enum BrainReply {
    Text(String),
    ToolCalls { calls: Vec<ToolCall>, text: String },
    /// The model could not be reached; the text is safe to show as is.
    Degraded(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub history_exchanges: usize,
}

impl From<&LlmConfig> for CompletionSettings {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            top_p: cfg.top_p,
            history_exchanges: cfg.history_exchanges,
        }
    }
}

pub struct Brain {
    backend: Arc<dyn ChatBackend>,
    router_mode: RouterMode,
    settings: CompletionSettings,
    tools: Vec<ToolDefinition>,
}

impl Brain {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        router_mode: RouterMode,
        settings: CompletionSettings,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            backend,
            router_mode,
            settings,
            tools,
        }
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    pub fn router_mode(&self) -> RouterMode {
        self.router_mode
    }

    pub async fn route(&self, command: &str, gate: Intent) -> RouterDecision {
        router::route(self.backend.as_ref(), self.router_mode, command, gate).await
    }

    fn options(&self, decision: RouterDecision) -> ChatOptions {
        ChatOptions {
            tool_choice: if decision.should_use_tools {
                ToolChoice::Auto
            } else {
                ToolChoice::None
            },
            temperature: Some(self.settings.temperature),
            max_tokens: Some(self.settings.max_tokens),
            top_p: Some(self.settings.top_p),
        }
    }

    /// One completion. Tools are only offered when the decision allows them.
    #[tracing::instrument(level = "info", skip_all, fields(intent = %decision.intent, tools = decision.should_use_tools))]
    pub async fn respond(
        &self,
        system_prompt: String,
        gate: Intent,
        decision: RouterDecision,
        session: &Session,
        command: &str,
    ) -> BrainReply {
        let messages = prompt::build_messages(
            system_prompt,
            gate,
            decision,
            session,
            self.settings.history_exchanges,
            command,
        );
        let tools: &[ToolDefinition] = if decision.should_use_tools {
            &self.tools
        } else {
            &[]
        };

        let resp = match self
            .backend
            .chat(&messages, tools, &self.options(decision))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "completion failed");
                return BrainReply::Degraded(DEGRADED_REPLY.to_string());
            }
        };
        tracing::debug!(
            prompt_tokens = resp.usage.prompt_tokens,
            completion_tokens = resp.usage.completion_tokens,
            finish_reason = %resp.finish_reason,
            tool_calls = resp.message.tool_calls.len(),
            "completion received"
        );

        let text = resp.message.content.trim().to_string();
        if !resp.message.tool_calls.is_empty() {
            return BrainReply::ToolCalls {
                calls: resp.message.tool_calls,
                text,
            };
        }
        if text.is_empty() {
            return BrainReply::Text(EMPTY_REPLY.to_string());
        }
        BrainReply::Text(text)
    }
}
