//! Core data models used throughout the course assistant.
//!
//! These types represent the courses, chunks, and search results that flow
//! through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A course parsed from a single document file.
///
/// The title is the unique identifier across the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

/// A lesson within a course. Owned by its [`Course`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub number: u32,
    pub title: String,
    pub lesson_link: Option<String>,
    #[serde(skip)]
    pub content: String,
}

/// A bounded, overlapping window of a lesson's text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub course_title: String,
    pub lesson_number: u32,
    /// Running index across the whole course, starting at 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

impl Chunk {
    /// Text sent to the embedder: the window prefixed with its course and
    /// lesson so that neighbouring courses stay distinguishable.
    pub fn embedding_text(&self) -> String {
        format!(
            "Course {} Lesson {} content: {}",
            self.course_title, self.lesson_number, self.text
        )
    }
}

/// Metadata attached to every stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: u32,
    pub chunk_index: i64,
}

/// A single ranked hit from the content collection.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f64,
}

/// Ranked hits for one query, plus an optional notice or error message.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResults {
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// A citation surfaced to the user alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// A course's structure as reported by the outline tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseOutline {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<LessonSummary>,
}

/// Lesson number, title and link without the body text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSummary {
    pub number: u32,
    pub title: String,
    pub lesson_link: Option<String>,
}

impl From<&Lesson> for LessonSummary {
    fn from(lesson: &Lesson) -> Self {
        Self {
            number: lesson.number,
            title: lesson.title.clone(),
            lesson_link: lesson.lesson_link.clone(),
        }
    }
}
