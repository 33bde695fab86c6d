//! Chat-completion client with function calling.
//!
//! [`ChatModel`] is the seam between the generator and the hosted model.
//! [`OpenAiChatModel`] speaks the OpenAI `chat/completions` wire format,
//! which most hosted and local servers accept.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::LlmConfig;

/// A tool the model may call, in function-calling form.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

/// One function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model. May be malformed.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Empty means the request carries no tools at all.
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiChatModel {
    model: String,
    endpoint: String,
    api_key: String,
    max_completion_tokens: u32,
    temperature: Option<f64>,
    reasoning_effort: Option<String>,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("No API key: set llm.api_key or OPENAI_API_KEY"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            max_completion_tokens: config.max_completion_tokens,
            temperature: config.temperature,
            reasoning_effort: config.reasoning_effort.clone(),
            client,
        })
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages.iter().map(message_to_json).collect::<Vec<_>>(),
            "max_completion_tokens": self.max_completion_tokens,
        });

        if let Some(obj) = body.as_object_mut() {
            if !request.tools.is_empty() {
                let tools: Vec<Value> = request.tools.iter().map(tool_to_json).collect();
                obj.insert("tools".to_string(), Value::Array(tools));
                obj.insert("tool_choice".to_string(), json!("auto"));
            }
            if let Some(t) = self.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(effort) = &self.reasoning_effort {
                obj.insert("reasoning_effort".to_string(), json!(effort));
            }
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = self.request_body(&request);
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Chat request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Chat API error {}: {}", status, text);
        }

        let payload: Value = response.json().await?;
        parse_chat_response(&payload)
    }
}

fn message_to_json(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::System(content) => json!({ "role": "system", "content": content }),
        ChatMessage::User(content) => json!({ "role": "user", "content": content }),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut obj = Map::new();
            obj.insert("role".to_string(), json!("assistant"));
            obj.insert("content".to_string(), json!(content));
            if !tool_calls.is_empty() {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": { "name": c.name, "arguments": c.arguments },
                        })
                    })
                    .collect();
                obj.insert("tool_calls".to_string(), Value::Array(calls));
            }
            Value::Object(obj)
        }
        ChatMessage::Tool {
            tool_call_id,
            content,
        } => json!({ "role": "tool", "tool_call_id": tool_call_id, "content": content }),
    }
}

fn tool_to_json(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn parse_chat_response(payload: &Value) -> Result<ChatResponse> {
    let message = payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow!("Chat response has no choices"))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(str::to_string);

    let tool_calls = match message.get("tool_calls").and_then(|t| t.as_array()) {
        Some(calls) => calls
            .iter()
            .map(|call| {
                let function = call
                    .get("function")
                    .ok_or_else(|| anyhow!("tool call without function"))?;
                Ok(ToolCall {
                    id: call["id"].as_str().unwrap_or_default().to_string(),
                    name: function["name"]
                        .as_str()
                        .ok_or_else(|| anyhow!("tool call without name"))?
                        .to_string(),
                    arguments: function["arguments"].as_str().unwrap_or("{}").to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(ChatResponse {
        content,
        tool_calls,
    })
}
