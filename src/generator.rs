//! Answer generation with at most one round of tool use.
//!
//! The protocol is a fixed two-step sequence:
//!
//! ```text
//! initial call (tools offered)
//!   ├─ no tool calls ──────────────► answer
//!   └─ tool calls ─► run each once ─► follow-up call (no tools) ─► answer
//! ```
//!
//! The follow-up call never offers tools, so the model cannot chain further
//! calls. Tool failures are reported back to the model as text; API
//! failures abort the query.

use serde_json::Value;
use std::sync::Arc;

use anyhow::Result;

use crate::llm::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ToolCall};
use crate::models::Source;
use crate::tools::ToolRegistry;

pub const SYSTEM_PROMPT: &str = "You are an assistant for course materials and educational content, with tools for looking up course information.

Tools:
1. search_course_content: search lesson content for specific topics or concepts
2. get_course_outline: course title, course link and the numbered list of lessons

When to use them:
- Outline, syllabus or \"what lessons are in\" questions: use get_course_outline and give the course title, course link, and the number and title of every lesson.
- Questions about specific topics in a course: use search_course_content.
- General knowledge questions: answer directly without tools.
- If a search finds nothing, say so plainly.

Answers must be brief and focused, educational, and clear. Include an example when it helps. Give only the answer: no reasoning process, no description of the search, and never say \"based on the search results\".";

/// The model's answer and every source cited by the tools it used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// What the initial response asks for.
enum FirstTurn {
    Answer(Option<String>),
    UseTools {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
}

impl From<ChatResponse> for FirstTurn {
    fn from(response: ChatResponse) -> Self {
        if response.wants_tools() {
            FirstTurn::UseTools {
                content: response.content,
                calls: response.tool_calls,
            }
        } else {
            FirstTurn::Answer(response.content)
        }
    }
}

pub struct AiGenerator {
    model: Arc<dyn ChatModel>,
}

impl AiGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// System prompt, with the formatted history appended when present.
    pub fn system_content(history: Option<&str>) -> String {
        match history {
            Some(h) if !h.trim().is_empty() => {
                format!("{}\n\nPrevious conversation:\n{}", SYSTEM_PROMPT, h)
            }
            _ => SYSTEM_PROMPT.to_string(),
        }
    }

    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &ToolRegistry,
    ) -> Result<GeneratedAnswer> {
        let mut messages = vec![
            ChatMessage::System(Self::system_content(history)),
            ChatMessage::User(query.to_string()),
        ];

        let first = self
            .model
            .complete(ChatRequest {
                messages: messages.clone(),
                tools: tools.definitions(),
            })
            .await?;

        let (content, calls) = match FirstTurn::from(first) {
            FirstTurn::Answer(content) => {
                tracing::debug!(model = self.model.model_name(), "answered without tools");
                return Ok(GeneratedAnswer {
                    answer: content.unwrap_or_default(),
                    sources: Vec::new(),
                });
            }
            FirstTurn::UseTools { content, calls } => (content, calls),
        };

        let mut sources: Vec<Source> = Vec::new();
        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            let (content, found) = run_tool(tools, call).await;
            for source in found {
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
            results.push(ChatMessage::Tool {
                tool_call_id: call.id.clone(),
                content,
            });
        }

        messages.push(ChatMessage::Assistant {
            content,
            tool_calls: calls,
        });
        messages.extend(results);

        let second = self
            .model
            .complete(ChatRequest {
                messages,
                tools: Vec::new(),
            })
            .await?;

        Ok(GeneratedAnswer {
            answer: second.content.unwrap_or_default(),
            sources,
        })
    }
}

/// Execute one requested call. Failures become an error string for the model.
async fn run_tool(tools: &ToolRegistry, call: &ToolCall) -> (String, Vec<Source>) {
    let args: Value = if call.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_str(&call.arguments) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tool = %call.name, "malformed tool arguments: {}", e);
                return (format!("Error executing tool: {}", e), Vec::new());
            }
        }
    };

    tracing::info!(tool = %call.name, "executing tool");
    match tools.execute(&call.name, args).await {
        Ok(output) => (output.content, output.sources),
        Err(e) => {
            tracing::warn!(tool = %call.name, "tool failed: {:#}", e);
            (format!("Error executing tool: {:#}", e), Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned responses and records every request.
    struct ScriptedModel {
        responses: Mutex<Vec<Result<ChatResponse>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<ChatResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
            self.requests.lock().unwrap().push(request);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                anyhow::bail!("no scripted response left");
            }
            responses.remove(0)
        }
    }

    struct EchoTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "search_course_content"
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({ "type": "object", "properties": { "query": { "type": "string" } } })
        }
        async fn execute(&self, params: Value) -> Result<ToolOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let query = params["query"].as_str().unwrap_or_default().to_string();
            Ok(ToolOutput {
                content: format!("[Course - Lesson 1]\n{}", query),
                sources: vec![Source {
                    label: "Course - Lesson 1".to_string(),
                    link: None,
                }],
            })
        }
    }

    fn text(s: &str) -> ChatResponse {
        ChatResponse {
            content: Some(s.to_string()),
            tool_calls: Vec::new(),
        }
    }

    fn call(id: &str, name: &str, args: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args.to_string(),
        }
    }

    fn registry() -> (ToolRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool {
            calls: calls.clone(),
        }));
        (registry, calls)
    }

    #[tokio::test]
    async fn test_direct_answer_makes_one_call() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(text("Rust is a language."))]));
        let generator = AiGenerator::new(model.clone());
        let (registry, calls) = registry();

        let out = generator
            .generate("What is Rust?", None, &registry)
            .await
            .unwrap();

        assert_eq!(out.answer, "Rust is a language.");
        assert!(out.sources.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(
            requests[0].messages[0],
            ChatMessage::System(SYSTEM_PROMPT.to_string())
        );
    }

    #[tokio::test]
    async fn test_tool_calls_run_once_each_then_one_followup() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ChatResponse {
                content: None,
                tool_calls: vec![
                    call("c1", "search_course_content", "{\"query\":\"ownership\"}"),
                    call("c2", "search_course_content", "{\"query\":\"borrowing\"}"),
                ],
            }),
            Ok(text("Ownership moves values.")),
        ]));
        let generator = AiGenerator::new(model.clone());
        let (registry, calls) = registry();

        let out = generator
            .generate("Explain ownership", None, &registry)
            .await
            .unwrap();

        assert_eq!(out.answer, "Ownership moves values.");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(out.sources.len(), 1);

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].tools.is_empty());

        let followup = &requests[1].messages;
        assert_eq!(followup.len(), 5);
        assert!(matches!(
            &followup[2],
            ChatMessage::Assistant { tool_calls, .. } if tool_calls.len() == 2
        ));
        assert_eq!(
            followup[3],
            ChatMessage::Tool {
                tool_call_id: "c1".to_string(),
                content: "[Course - Lesson 1]\nownership".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_second_round_tool_request_is_not_executed() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ChatResponse {
                content: None,
                tool_calls: vec![call("c1", "search_course_content", "{\"query\":\"a\"}")],
            }),
            Ok(ChatResponse {
                content: Some("partial".to_string()),
                tool_calls: vec![call("c2", "search_course_content", "{\"query\":\"b\"}")],
            }),
        ]));
        let generator = AiGenerator::new(model.clone());
        let (registry, calls) = registry();

        let out = generator.generate("q", None, &registry).await.unwrap();
        assert_eq!(out.answer, "partial");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_errors_are_fed_back_as_text() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ChatResponse {
                content: None,
                tool_calls: vec![
                    call("c1", "unknown_tool", "{}"),
                    call("c2", "search_course_content", "{not json"),
                ],
            }),
            Ok(text("Sorry.")),
        ]));
        let generator = AiGenerator::new(model.clone());
        let (registry, _) = registry();

        let out = generator.generate("q", None, &registry).await.unwrap();
        assert_eq!(out.answer, "Sorry.");

        let followup = &model.requests()[1].messages;
        assert_eq!(
            followup[3],
            ChatMessage::Tool {
                tool_call_id: "c1".to_string(),
                content: "Error executing tool: Tool 'unknown_tool' not found".to_string(),
            }
        );
        match &followup[4] {
            ChatMessage::Tool { content, .. } => {
                assert!(content.starts_with("Error executing tool: "))
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_errors_surface_from_either_round() {
        let model = Arc::new(ScriptedModel::new(vec![Err(anyhow::anyhow!("rate limited"))]));
        let generator = AiGenerator::new(model);
        let (registry, _) = registry();
        let err = generator.generate("q", None, &registry).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));

        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ChatResponse {
                content: None,
                tool_calls: vec![call("c1", "search_course_content", "{\"query\":\"a\"}")],
            }),
            Err(anyhow::anyhow!("server error")),
        ]));
        let generator = AiGenerator::new(model);
        let err = generator.generate("q", None, &registry).await.unwrap_err();
        assert!(err.to_string().contains("server error"));
    }

    #[test]
    fn test_history_is_appended_to_system_prompt() {
        let content = AiGenerator::system_content(Some("User: hi\nAssistant: hello"));
        assert!(content.starts_with(SYSTEM_PROMPT));
        assert!(content.ends_with("\n\nPrevious conversation:\nUser: hi\nAssistant: hello"));
        assert_eq!(AiGenerator::system_content(None), SYSTEM_PROMPT);
        assert_eq!(AiGenerator::system_content(Some("  ")), SYSTEM_PROMPT);
    }
}
