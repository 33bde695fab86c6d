//! The query orchestrator.
//!
//! [`RagSystem`] owns every component: vector store, tool registry,
//! generator and session memory. A query resolves its session, asks the
//! generator with the session's history, and records the exchange.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::generator::AiGenerator;
use crate::ingest::{self, DocumentOutcome, IngestReport};
use crate::llm::{ChatModel, OpenAiChatModel};
use crate::models::Source;
use crate::session::SessionManager;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;
use crate::tools::ToolRegistry;
use crate::vector_store::VectorStore;

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

pub struct RagSystem {
    config: Config,
    vector_store: Arc<VectorStore>,
    tools: ToolRegistry,
    generator: AiGenerator,
    sessions: SessionManager,
}

impl RagSystem {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let vector_store = Arc::new(VectorStore::new(store, embedder, &config));
        let tools = ToolRegistry::with_course_tools(vector_store.clone());
        let sessions = SessionManager::new(config.session.max_history);
        Self {
            config,
            vector_store,
            tools,
            generator: AiGenerator::new(model),
            sessions,
        }
    }

    /// SQLite store, configured embedder and the hosted chat model.
    pub async fn from_config(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::connect(&config).await?);
        let embedder = create_embedder(&config.embedding)?;
        let model = Arc::new(OpenAiChatModel::new(&config.llm)?);
        Ok(Self::new(config, store, embedder, model))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Answer a question within a session, creating one when `session_id`
    /// is absent or blank.
    pub async fn query(&self, question: &str, session_id: Option<&str>) -> Result<QueryResponse> {
        let session_id = match session_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => id.to_string(),
            None => self.sessions.create_session().await,
        };

        let history = self.sessions.format_history(&session_id).await;
        let prompt = format!("Answer this question about course materials: {}", question);

        let generated = self
            .generator
            .generate(&prompt, history.as_deref(), &self.tools)
            .await?;

        self.sessions
            .add_exchange(&session_id, question, &generated.answer)
            .await;

        tracing::info!(
            session_id = %session_id,
            sources = generated.sources.len(),
            "query answered"
        );

        Ok(QueryResponse {
            answer: generated.answer,
            sources: generated.sources,
            session_id,
        })
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.vector_store.course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }

    pub async fn add_course_document(&self, path: &Path) -> Result<DocumentOutcome> {
        ingest::add_course_document(&self.vector_store, path, &self.config.chunking).await
    }

    /// Ingest `folder`, or the configured documents folder when `None`.
    pub async fn add_course_folder(
        &self,
        folder: Option<&Path>,
        clear_existing: bool,
    ) -> Result<IngestReport> {
        let folder = folder.unwrap_or(&self.config.documents.folder);
        ingest::add_course_folder(
            &self.vector_store,
            folder,
            &self.config.documents.extensions,
            &self.config.chunking,
            clear_existing,
        )
        .await
    }
}
