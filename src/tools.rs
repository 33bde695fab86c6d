//! Tools the model can call during generation.
//!
//! A [`Tool`] declares a name, a description and a JSON Schema for its
//! parameters, and executes against JSON arguments. The [`ToolRegistry`]
//! exposes the declared tools to the model and dispatches calls by name.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │             ToolRegistry             │
//! │  ┌──────────────────┐ ┌────────────┐ │
//! │  │ search_course_   │ │ get_course_│ │
//! │  │ content          │ │ outline    │ │
//! │  └────────┬─────────┘ └─────┬──────┘ │
//! └───────────┼─────────────────┼────────┘
//!             ▼                 ▼
//!               VectorStore
//! ```
//!
//! Citations travel back with each result in [`ToolOutput::sources`]; tools
//! hold no per-query state.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::llm::ToolDefinition;
use crate::models::{CourseOutline, SearchResults, Source};
use crate::vector_store::VectorStore;

/// Result of one tool execution: text for the model plus citations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the arguments object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value) -> Result<ToolOutput>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// search_course_content
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<u32>,
}

/// Semantic search over lesson content with optional course/lesson filters.
pub struct CourseSearchTool {
    store: Arc<VectorStore>,
}

impl CourseSearchTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    async fn format_results(&self, results: &SearchResults) -> ToolOutput {
        let mut blocks = Vec::with_capacity(results.hits.len());
        let mut sources: Vec<Source> = Vec::new();

        for hit in &results.hits {
            let course = &hit.metadata.course_title;
            let lesson = hit.metadata.lesson_number;
            let label = format!("{} - Lesson {}", course, lesson);
            blocks.push(format!("[{}]\n{}", label, hit.text));

            if sources.iter().any(|s| s.label == label) {
                continue;
            }
            let link = match self.store.lesson_link(course, lesson).await {
                Ok(Some(link)) => Some(link),
                Ok(None) => self.store.course_link(course).await.ok().flatten(),
                Err(e) => {
                    tracing::warn!(course = %course, lesson, "lesson link lookup failed: {:#}", e);
                    None
                }
            };
            sources.push(Source { label, link });
        }

        ToolOutput {
            content: blocks.join("\n\n"),
            sources,
        }
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        "search_course_content"
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let params: SearchParams = serde_json::from_value(params)?;
        if params.query.trim().is_empty() {
            bail!("query must not be empty");
        }

        let results = self
            .store
            .search(
                &params.query,
                params.course_name.as_deref(),
                params.lesson_number,
                None,
            )
            .await;

        if let Some(error) = &results.error {
            return Ok(ToolOutput::text(error.clone()));
        }

        if results.is_empty() {
            let mut message = String::from("No relevant content found");
            if let Some(course) = params.course_name.as_deref().filter(|c| !c.trim().is_empty()) {
                message.push_str(&format!(" in course '{}'", course));
            }
            if let Some(lesson) = params.lesson_number {
                message.push_str(&format!(" in lesson {}", lesson));
            }
            message.push('.');
            return Ok(ToolOutput::text(message));
        }

        Ok(self.format_results(&results).await)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// get_course_outline
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct OutlineParams {
    course_name: String,
}

/// Course title, link, instructor and lesson list.
pub struct CourseOutlineTool {
    store: Arc<VectorStore>,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }
}

fn format_outline(outline: &CourseOutline) -> String {
    let mut out = format!("Course: {}\n", outline.title);
    if let Some(link) = &outline.course_link {
        out.push_str(&format!("Link: {}\n", link));
    }
    if let Some(instructor) = &outline.instructor {
        out.push_str(&format!("Instructor: {}\n", instructor));
    }
    out.push_str(&format!("Lessons ({}):", outline.lessons.len()));
    for lesson in &outline.lessons {
        out.push_str(&format!("\nLesson {}: {}", lesson.number, lesson.title));
    }
    out
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        "get_course_outline"
    }

    fn description(&self) -> &str {
        "Get the outline of a course: title, link, instructor and the numbered list of lessons"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work)"
                }
            },
            "required": ["course_name"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let params: OutlineParams = serde_json::from_value(params)?;

        match self.store.course_outline(&params.course_name).await? {
            Some(outline) => Ok(ToolOutput {
                content: format_outline(&outline),
                sources: vec![Source {
                    label: outline.title.clone(),
                    link: outline.course_link.clone(),
                }],
            }),
            None => Ok(ToolOutput::text(format!(
                "No course found matching '{}'",
                params.course_name
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of callable tools, dispatched by name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the search and outline tools bound to `store`.
    pub fn with_course_tools(store: Arc<VectorStore>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CourseSearchTool::new(store.clone())));
        registry.register(Box::new(CourseOutlineTool::new(store)));
        registry
    }

    /// Register a tool. Lookups return the first tool with a given name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Declarations handed to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run the named tool.
    pub async fn execute(&self, name: &str, params: Value) -> Result<ToolOutput> {
        match self.find(name) {
            Some(tool) => tool.execute(params).await,
            None => bail!("Tool '{}' not found", name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
