//! Storage abstraction for the two vector collections.
//!
//! The [`Store`] trait defines every storage operation the
//! [`VectorStore`](crate::vector_store::VectorStore) adapter needs, so the
//! backend can be swapped: [`SqliteStore`](sqlite::SqliteStore) persists to
//! disk, [`InMemoryStore`](memory::InMemoryStore) backs tests.
//!
//! Backends receive precomputed vectors; embedding happens in the adapter.
//!
//! | Method | Collection |
//! |--------|------------|
//! | [`upsert_course`](Store::upsert_course) | catalog |
//! | [`get_course`](Store::get_course) | catalog |
//! | [`course_titles`](Store::course_titles) | catalog |
//! | [`nearest_course`](Store::nearest_course) | catalog |
//! | [`add_chunks`](Store::add_chunks) | content |
//! | [`search_content`](Store::search_content) | content |
//! | [`clear`](Store::clear) | both |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Course, CourseOutline, SearchHit};

/// Restricts a content search to one course and/or one lesson.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentFilter<'a> {
    /// Exact, already-resolved course title.
    pub course_title: Option<&'a str>,
    pub lesson_number: Option<u32>,
}

impl ContentFilter<'_> {
    pub fn matches(&self, course_title: &str, lesson_number: u32) -> bool {
        self.course_title.map_or(true, |t| t == course_title)
            && self.lesson_number.map_or(true, |n| n == lesson_number)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace a course's catalog entry.
    async fn upsert_course(&self, course: &Course, title_vector: &[f32], model: &str)
        -> Result<()>;

    /// Store chunks with their vectors. `vectors[i]` belongs to `chunks[i]`.
    ///
    /// A chunk with the same `(course_title, chunk_index)` as an existing
    /// one replaces it.
    async fn add_chunks(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// All catalog titles, sorted.
    async fn course_titles(&self) -> Result<Vec<String>>;

    async fn course_count(&self) -> Result<usize> {
        Ok(self.course_titles().await?.len())
    }

    /// Embedding model and dimensionality of the most recently indexed
    /// course, or `None` when the catalog is empty.
    async fn indexed_embedding(&self) -> Result<Option<(String, usize)>>;

    /// Catalog entry for an exact title.
    async fn get_course(&self, title: &str) -> Result<Option<CourseOutline>>;

    /// The catalog title whose vector is closest to `query_vec`, with its
    /// cosine similarity.
    async fn nearest_course(&self, query_vec: &[f32]) -> Result<Option<(String, f32)>>;

    /// Top `limit` chunks by cosine similarity, best first.
    async fn search_content(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: ContentFilter<'_>,
    ) -> Result<Vec<SearchHit>>;

    /// Remove everything from both collections.
    async fn clear(&self) -> Result<()>;
}

/// Sort hits best-first and keep the top `limit`.
pub(crate) fn rank_hits(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}
