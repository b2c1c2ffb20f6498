//! Chat-completion client for Jarvis.
//!
//! Speaks the OpenAI-compatible `/chat/completions` wire format used by both
//! Groq and OpenAI. Callers program against [`ChatBackend`] so the assistant
//! pipeline can be driven by a scripted backend in tests.

mod client;
mod error;
mod openai;
mod types;

pub use client::{ChatBackend, LlmClient, Provider, validate_tool_name};
pub use error::{LlmError, Result};
pub use types::{
    ChatMessage, ChatOptions, ChatResponse, Role, ToolCall, ToolChoice, ToolDefinition, Usage,
};
