//! Scripted chat backend for pipeline tests.

use async_trait::async_trait;
use jarvis_llm::{
    ChatBackend, ChatMessage, ChatOptions, ChatResponse, LlmError, Role, ToolCall, ToolDefinition,
    Usage,
};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub tool_count: usize,
    pub options: ChatOptions,
}

/// Answers requests from a queue; an empty queue behaves like a network error.
#[derive(Default)]
pub struct FakeLlm {
    script: Mutex<VecDeque<Result<ChatMessage, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, reply: Result<ChatMessage, String>) -> &Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn text(&self, content: &str) -> &Self {
        self.push(Ok(ChatMessage::assistant(content)))
    }

    pub fn tool_calls(&self, calls: &[(&str, &str)]) -> &Self {
        let mut msg = ChatMessage::assistant("");
        msg.tool_calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                id: format!("call_{i}"),
                name: name.to_string(),
                arguments: args.to_string(),
            })
            .collect();
        self.push(Ok(msg))
    }

    pub fn failure(&self) -> &Self {
        self.push(Err("connection reset".to_string()))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for FakeLlm {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> jarvis_llm::Result<ChatResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            tool_count: tools.len(),
            options: options.clone(),
        });
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()));
        match next {
            Ok(message) => {
                debug_assert_eq!(message.role, Role::Assistant);
                Ok(ChatResponse {
                    message,
                    usage: Usage::default(),
                    finish_reason: "stop".to_string(),
                })
            }
            Err(e) => Err(LlmError::Http(e)),
        }
    }
}
