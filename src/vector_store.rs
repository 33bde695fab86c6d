//! Vector store adapter over the course catalog and course content.
//!
//! [`VectorStore`] pairs a [`Store`] backend with an [`Embedder`]: it embeds
//! titles, chunks and queries, resolves fuzzy course names to indexed
//! titles, and turns backend failures into [`SearchResults`] notices so the
//! search tool can hand them to the model verbatim.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{embed_batched, embed_query, Embedder};
use crate::models::{Chunk, Course, CourseOutline, SearchResults};
use crate::store::{ContentFilter, Store};

pub struct VectorStore {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    batch_size: usize,
    course_match_threshold: f32,
}

impl VectorStore {
    pub fn new(store: Arc<dyn Store>, embedder: Arc<dyn Embedder>, config: &Config) -> Self {
        Self {
            store,
            embedder,
            max_results: config.retrieval.max_results,
            batch_size: config.embedding.batch_size,
            course_match_threshold: config.retrieval.course_match_threshold,
        }
    }

    /// Embed the course title and upsert its catalog entry.
    pub async fn add_course(&self, course: &Course) -> Result<()> {
        let vector = embed_query(self.embedder.as_ref(), &course.title).await?;
        self.store
            .upsert_course(course, &vector, self.embedder.model_name())
            .await
    }

    /// Embed chunk texts in batches and store them.
    pub async fn add_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(Chunk::embedding_text).collect();
        let vectors = embed_batched(self.embedder.as_ref(), &texts, self.batch_size).await?;
        self.store.add_chunks(chunks, &vectors).await
    }

    /// Nearest-neighbour search over course content.
    ///
    /// `limit` defaults to the configured `max_results`. A blank
    /// `course_name` means no course filter. Never fails: an unknown course
    /// or a backend error comes back as an empty result set with a message.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
        limit: Option<usize>,
    ) -> SearchResults {
        let course_name = course_name.filter(|name| !name.trim().is_empty());
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await {
                Ok(Some(title)) => Some(title),
                Ok(None) => {
                    return SearchResults::empty(format!("No course found matching '{}'", name))
                }
                Err(e) => return SearchResults::empty(format!("Search error: {:#}", e)),
            },
            None => None,
        };

        let query_vec = match embed_query(self.embedder.as_ref(), query).await {
            Ok(v) => v,
            Err(e) => return SearchResults::empty(format!("Search error: {:#}", e)),
        };

        if let Err(e) = self.check_index_embedding(query_vec.len()).await {
            return SearchResults::empty(format!("Search error: {:#}", e));
        }

        let filter = ContentFilter {
            course_title: course_title.as_deref(),
            lesson_number,
        };
        let limit = limit.unwrap_or(self.max_results);

        match self.store.search_content(&query_vec, limit, filter).await {
            Ok(hits) => {
                tracing::debug!(query, hits = hits.len(), ?course_title, ?lesson_number, "content search");
                SearchResults { hits, error: None }
            }
            Err(e) => SearchResults::empty(format!("Search error: {:#}", e)),
        }
    }

    /// Fails when the index was built with a different embedding model or
    /// dimensionality than the one now configured.
    async fn check_index_embedding(&self, query_dims: usize) -> Result<()> {
        if let Some((model, dims)) = self.store.indexed_embedding().await? {
            let current = self.embedder.model_name();
            if model != current || dims != query_dims {
                bail!(
                    "index was built with embedding model '{}' ({} dims) but '{}' ({} dims) is configured; re-run ingest with --clear",
                    model,
                    dims,
                    current,
                    query_dims
                );
            }
        }
        Ok(())
    }

    /// Map a user-supplied course name to an indexed title.
    ///
    /// Tries a case-insensitive exact match, then a case-insensitive
    /// substring match, then the nearest title embedding at or above the
    /// configured threshold.
    pub async fn resolve_course_name(&self, name: &str) -> Result<Option<String>> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }

        let titles = self.store.course_titles().await?;
        if titles.is_empty() {
            return Ok(None);
        }
        if let Some(t) = titles.iter().find(|t| t.to_lowercase() == wanted) {
            return Ok(Some(t.clone()));
        }
        if let Some(t) = titles.iter().find(|t| t.to_lowercase().contains(&wanted)) {
            return Ok(Some(t.clone()));
        }

        let query_vec = embed_query(self.embedder.as_ref(), name).await?;
        Ok(self
            .store
            .nearest_course(&query_vec)
            .await?
            .filter(|(_, similarity)| *similarity >= self.course_match_threshold)
            .map(|(title, _)| title))
    }

    /// Outline of the course best matching `course_name`.
    pub async fn course_outline(&self, course_name: &str) -> Result<Option<CourseOutline>> {
        match self.resolve_course_name(course_name).await? {
            Some(title) => self.store.get_course(&title).await,
            None => Ok(None),
        }
    }

    /// Link of one lesson of an exactly-titled course, if recorded.
    pub async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Result<Option<String>> {
        Ok(self.store.get_course(course_title).await?.and_then(|outline| {
            outline
                .lessons
                .into_iter()
                .find(|l| l.number == lesson_number)
                .and_then(|l| l.lesson_link)
        }))
    }

    pub async fn course_link(&self, course_title: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .get_course(course_title)
            .await?
            .and_then(|outline| outline.course_link))
    }

    pub async fn course_titles(&self) -> Result<Vec<String>> {
        self.store.course_titles().await
    }

    pub async fn course_count(&self) -> Result<usize> {
        self.store.course_count().await
    }

    pub async fn has_course(&self, title: &str) -> Result<bool> {
        Ok(self.store.get_course(title).await?.is_some())
    }

    /// Drop both collections.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Lesson;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Bag-of-words embedder. Every distinct lowercase word gets its own
    /// dimension, so similarity reflects shared words only.
    #[derive(Default)]
    pub(crate) struct VocabEmbedder {
        vocab: Mutex<HashMap<String, usize>>,
    }

    const VOCAB_DIMS: usize = 512;

    #[async_trait]
    impl Embedder for VocabEmbedder {
        fn model_name(&self) -> &str {
            "vocab"
        }
        fn dims(&self) -> usize {
            VOCAB_DIMS
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut vocab = self.vocab.lock().unwrap();
            Ok(texts
                .iter()
                .map(|text| {
                    let mut v = vec![0.0f32; VOCAB_DIMS];
                    for word in text
                        .split(|c: char| !c.is_alphanumeric())
                        .filter(|w| !w.is_empty())
                    {
                        let next = vocab.len();
                        let slot = *vocab.entry(word.to_lowercase()).or_insert(next);
                        v[slot % VOCAB_DIMS] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("provider unavailable")
        }
    }

    fn course(title: &str, lessons: &[(u32, &str, &str)]) -> Course {
        Course {
            title: title.to_string(),
            course_link: Some(format!("https://example.com/{}", title.len())),
            instructor: Some("Instructor".to_string()),
            lessons: lessons
                .iter()
                .map(|(n, t, body)| Lesson {
                    number: *n,
                    title: t.to_string(),
                    lesson_link: Some(format!("https://example.com/lesson/{}", n)),
                    content: body.to_string(),
                })
                .collect(),
        }
    }

    pub(crate) async fn seeded() -> VectorStore {
        let vs = VectorStore::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(VocabEmbedder::default()),
            &Config::default(),
        );
        let courses = [
            course(
                "Rust Ownership Deep Dive",
                &[
                    (1, "Borrowing", "borrowing lets references read data without moving ownership"),
                    (2, "Lifetimes", "lifetimes describe how long references stay valid"),
                ],
            ),
            course(
                "Prompt Engineering Basics",
                &[(1, "Prompts", "a prompt tells the model what to do with examples")],
            ),
        ];
        for c in &courses {
            vs.add_course(c).await.unwrap();
            let chunks = crate::document::chunk_course(c, &Config::default().chunking);
            vs.add_chunks(&chunks).await.unwrap();
        }
        vs
    }

    #[tokio::test]
    async fn test_search_without_filters() {
        let vs = seeded().await;
        let results = vs.search("lifetimes describe valid", None, None, None).await;
        assert!(results.error.is_none());
        assert_eq!(results.hits.len(), 3);
        assert_eq!(results.hits[0].metadata.lesson_number, 2);
    }

    #[tokio::test]
    async fn test_blank_course_name_is_no_filter() {
        let vs = seeded().await;
        for blank in ["", "   "] {
            let results = vs
                .search("lifetimes describe valid", Some(blank), None, None)
                .await;
            assert!(results.error.is_none(), "blank {:?}: {:?}", blank, results.error);
            assert_eq!(results.hits.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_lesson() {
        let vs = seeded().await;
        let results = vs.search("references", None, None, Some(1)).await;
        assert_eq!(results.hits.len(), 1);

        let results = vs.search("references", Some("rust"), Some(1), None).await;
        assert_eq!(results.hits.len(), 1);
        assert_eq!(results.hits[0].metadata.course_title, "Rust Ownership Deep Dive");
        assert_eq!(results.hits[0].metadata.lesson_number, 1);
    }

    #[tokio::test]
    async fn test_unknown_course_filter_is_empty_not_error() {
        let vs = seeded().await;
        let results = vs
            .search("anything", Some("Underwater Basket Weaving"), None, None)
            .await;
        assert!(results.is_empty());
        assert_eq!(
            results.error.as_deref(),
            Some("No course found matching 'Underwater Basket Weaving'")
        );
    }

    #[tokio::test]
    async fn test_resolve_course_name_strategies() {
        let vs = seeded().await;
        assert_eq!(
            vs.resolve_course_name("prompt engineering basics").await.unwrap().as_deref(),
            Some("Prompt Engineering Basics")
        );
        assert_eq!(
            vs.resolve_course_name("Ownership").await.unwrap().as_deref(),
            Some("Rust Ownership Deep Dive")
        );
        assert_eq!(
            vs.resolve_course_name("Engineering Prompt").await.unwrap().as_deref(),
            Some("Prompt Engineering Basics")
        );
        assert_eq!(vs.resolve_course_name("   ").await.unwrap(), None);
    }

    struct ConstantEmbedder;

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        fn model_name(&self) -> &str {
            "constant"
        }
        fn dims(&self) -> usize {
            8
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0; 8]).collect())
        }
    }

    #[tokio::test]
    async fn test_search_rejects_index_from_other_model() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let indexer = VectorStore::new(
            store.clone(),
            Arc::new(VocabEmbedder::default()),
            &Config::default(),
        );
        let c = course("Rust Ownership Deep Dive", &[(1, "Borrowing", "borrowing rules")]);
        indexer.add_course(&c).await.unwrap();
        indexer
            .add_chunks(&crate::document::chunk_course(&c, &Config::default().chunking))
            .await
            .unwrap();

        let reader = VectorStore::new(store, Arc::new(ConstantEmbedder), &Config::default());
        let results = reader.search("borrowing", None, None, None).await;
        assert!(results.is_empty());
        let error = results.error.unwrap();
        assert!(error.starts_with("Search error: index was built with embedding model 'vocab' (512 dims)"));
        assert!(error.contains("'constant' (8 dims)"));

        let same_model = indexer.search("borrowing", None, None, None).await;
        assert!(same_model.error.is_none());
        assert_eq!(same_model.hits.len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_becomes_search_error() {
        let vs = VectorStore::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(FailingEmbedder),
            &Config::default(),
        );
        let results = vs.search("q", None, None, None).await;
        assert!(results.is_empty());
        assert!(results
            .error
            .as_deref()
            .unwrap()
            .starts_with("Search error: provider unavailable"));
    }

    #[tokio::test]
    async fn test_outline_links_and_analytics() {
        let vs = seeded().await;
        let outline = vs.course_outline("rust ownership").await.unwrap().unwrap();
        assert_eq!(outline.lessons.len(), 2);
        assert_eq!(
            vs.lesson_link("Rust Ownership Deep Dive", 2).await.unwrap().as_deref(),
            Some("https://example.com/lesson/2")
        );
        assert_eq!(vs.lesson_link("Rust Ownership Deep Dive", 9).await.unwrap(), None);
        assert_eq!(vs.course_count().await.unwrap(), 2);
        assert!(vs.has_course("Prompt Engineering Basics").await.unwrap());

        vs.clear_all().await.unwrap();
        assert_eq!(vs.course_count().await.unwrap(), 0);
    }
}
