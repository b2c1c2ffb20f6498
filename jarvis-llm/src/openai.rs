use crate::error::{LlmError, Result};
use crate::types::{
    ChatMessage, ChatOptions, ChatResponse, Role, ToolCall, ToolChoice, ToolDefinition, Usage,
};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_key: &str, model: &str, endpoint: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(endpoint = %self.endpoint))]
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        let req = OpenAiChatRequest::new(&self.model, messages, tools, options);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Http(format!(
                "chat completion status={status} body={body}"
            )));
        }

        let parsed: OpenAiChatResponse = serde_json::from_str(&body)?;
        let out: ChatResponse = parsed.try_into()?;
        tracing::debug!(
            prompt_tokens = out.usage.prompt_tokens,
            completion_tokens = out.usage.completion_tokens,
            tool_calls = out.message.tool_calls.len(),
            finish_reason = %out.finish_reason,
            "chat completion received"
        );
        Ok(out)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl OpenAiChatRequest {
    fn new(
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Self {
        // Tools are only sent when the caller allows tool calls.
        let tools: Vec<OpenAiTool> = match options.tool_choice {
            ToolChoice::Auto => tools.iter().map(to_openai_tool).collect(),
            ToolChoice::None => Vec::new(),
        };
        let tool_choice = (!tools.is_empty()).then(|| "auto".to_string());

        Self {
            model: model.to_string(),
            messages: messages.iter().map(to_openai_message).collect(),
            tools,
            tool_choice,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    r#type: String,
    function: OpenAiToolFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

fn to_openai_tool(t: &ToolDefinition) -> OpenAiTool {
    OpenAiTool {
        r#type: "function".to_string(),
        function: OpenAiToolFunction {
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: t.parameters.clone(),
        },
    }
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OpenAiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiToolCall {
    id: String,
    r#type: String,
    function: OpenAiToolFunctionCall,
}

#[derive(Debug, Serialize)]
struct OpenAiToolFunctionCall {
    name: String,
    arguments: String,
}

fn to_openai_message(m: &ChatMessage) -> OpenAiMessage {
    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    OpenAiMessage {
        role: role.to_string(),
        content: Some(m.content.clone()).filter(|s| !s.is_empty()),
        tool_calls: m
            .tool_calls
            .iter()
            .map(|tc| OpenAiToolCall {
                id: tc.id.clone(),
                r#type: "function".to_string(),
                function: OpenAiToolFunctionCall {
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                },
            })
            .collect(),
        tool_call_id: m.tool_call_id.clone(),
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiChoiceToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceToolCall {
    #[serde(default)]
    id: String,
    #[serde(default)]
    function: OpenAiChoiceToolCallFunction,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiChoiceToolCallFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl TryFrom<OpenAiChatResponse> for ChatResponse {
    type Error = LlmError;

    fn try_from(v: OpenAiChatResponse) -> Result<Self> {
        let choice = v
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseFormat("response missing choices".to_string()))?;

        let usage = v.usage.unwrap_or_default();

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(idx, tc)| ToolCall {
                id: if tc.id.is_empty() {
                    format!("call_{idx}")
                } else {
                    tc.id
                },
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ChatResponse {
            message: ChatMessage {
                role: Role::Assistant,
                content: choice.message.content.unwrap_or_default(),
                tool_calls,
                tool_call_id: None,
            },
            usage: Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
            finish_reason: choice
                .finish_reason
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool() -> ToolDefinition {
        ToolDefinition {
            name: "close_app".to_string(),
            description: "Close an application".to_string(),
            parameters: json!({"type": "object", "properties": {"app_name": {"type": "string"}}}),
        }
    }

    #[test]
    fn auto_mode_sends_tools_with_auto_choice() {
        let options = ChatOptions {
            tool_choice: ToolChoice::Auto,
            temperature: Some(0.3),
            max_tokens: Some(300),
            top_p: Some(0.9),
        };
        let req = OpenAiChatRequest::new(
            "llama-3.1-8b-instant",
            &[ChatMessage::system("sys"), ChatMessage::user("Close Terminal")],
            &[tool()],
            &options,
        );
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["tool_choice"], "auto");
        assert_eq!(v["tools"][0]["type"], "function");
        assert_eq!(v["tools"][0]["function"]["name"], "close_app");
        assert_eq!(v["max_tokens"], 300);
        assert_eq!(v["messages"][1]["role"], "user");
    }

    #[test]
    fn none_mode_withholds_tools() {
        let req = OpenAiChatRequest::new(
            "llama-3.1-8b-instant",
            &[ChatMessage::user("Which command clears terminal on Mac?")],
            &[tool()],
            &ChatOptions::default(),
        );
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("tools").is_none());
        assert!(v.get("tool_choice").is_none());
        assert!(v.get("temperature").is_none());
    }

    #[test]
    fn parses_tool_call_response() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "close_app", "arguments": "{\"app_name\":\"Terminal\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7}
        });
        let parsed: OpenAiChatResponse = serde_json::from_value(body).unwrap();
        let resp: ChatResponse = parsed.try_into().unwrap();
        assert_eq!(resp.message.content, "");
        assert_eq!(resp.message.tool_calls.len(), 1);
        assert_eq!(resp.message.tool_calls[0].name, "close_app");
        assert_eq!(resp.usage.prompt_tokens, 12);
        assert_eq!(resp.finish_reason, "tool_calls");
    }

    #[test]
    fn missing_choices_is_a_format_error() {
        let parsed: OpenAiChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        let err = ChatResponse::try_from(parsed).unwrap_err();
        assert!(matches!(err, LlmError::ResponseFormat(_)));
    }

    #[test]
    fn null_tool_calls_and_missing_ids_are_tolerated() {
        let body = json!({
            "choices": [{"message": {"content": "hi", "tool_calls": null}}]
        });
        let parsed: OpenAiChatResponse = serde_json::from_value(body).unwrap();
        let resp: ChatResponse = parsed.try_into().unwrap();
        assert!(resp.message.tool_calls.is_empty());
        assert_eq!(resp.finish_reason, "unknown");

        let body = json!({
            "choices": [{"message": {"tool_calls": [{"function": {"name": "list_tasks"}}]}}]
        });
        let parsed: OpenAiChatResponse = serde_json::from_value(body).unwrap();
        let resp: ChatResponse = parsed.try_into().unwrap();
        assert_eq!(resp.message.tool_calls[0].id, "call_0");
        assert_eq!(resp.message.tool_calls[0].arguments, "");
    }
}
