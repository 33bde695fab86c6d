//! In-memory [`Store`] implementation for tests and throwaway runs.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Search is a
//! brute-force cosine scan, same as the SQLite backend.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ChunkMetadata, Course, CourseOutline, LessonSummary, SearchHit};

use super::{rank_hits, ContentFilter, Store};

struct StoredCourse {
    outline: CourseOutline,
    vector: Vec<f32>,
    model: String,
}

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Default)]
pub struct InMemoryStore {
    courses: RwLock<HashMap<String, StoredCourse>>,
    chunks: RwLock<Vec<StoredChunk>>,
    last_indexed: RwLock<Option<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunks across all courses.
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_course(
        &self,
        course: &Course,
        title_vector: &[f32],
        model: &str,
    ) -> Result<()> {
        let outline = CourseOutline {
            title: course.title.clone(),
            course_link: course.course_link.clone(),
            instructor: course.instructor.clone(),
            lessons: course.lessons.iter().map(LessonSummary::from).collect(),
        };
        write(&self.courses)?.insert(
            course.title.clone(),
            StoredCourse {
                outline,
                vector: title_vector.to_vec(),
                model: model.to_string(),
            },
        );
        *write(&self.last_indexed)? = Some(course.title.clone());
        Ok(())
    }

    async fn add_chunks(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        let mut stored = write(&self.chunks)?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            stored.retain(|sc| {
                !(sc.chunk.course_title == chunk.course_title
                    && sc.chunk.chunk_index == chunk.chunk_index)
            });
            stored.push(StoredChunk {
                chunk: chunk.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let mut titles: Vec<String> = read(&self.courses)?.keys().cloned().collect();
        titles.sort();
        Ok(titles)
    }

    async fn indexed_embedding(&self) -> Result<Option<(String, usize)>> {
        let courses = read(&self.courses)?;
        let last = read(&self.last_indexed)?;
        Ok(last
            .as_deref()
            .and_then(|title| courses.get(title))
            .map(|c| (c.model.clone(), c.vector.len())))
    }

    async fn get_course(&self, title: &str) -> Result<Option<CourseOutline>> {
        Ok(read(&self.courses)?.get(title).map(|c| c.outline.clone()))
    }

    async fn nearest_course(&self, query_vec: &[f32]) -> Result<Option<(String, f32)>> {
        let courses = read(&self.courses)?;
        Ok(courses
            .values()
            .map(|c| (c.outline.title.clone(), cosine_similarity(query_vec, &c.vector)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)))
    }

    async fn search_content(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: ContentFilter<'_>,
    ) -> Result<Vec<SearchHit>> {
        let chunks = read(&self.chunks)?;
        let hits = chunks
            .iter()
            .filter(|sc| filter.matches(&sc.chunk.course_title, sc.chunk.lesson_number))
            .map(|sc| SearchHit {
                text: sc.chunk.text.clone(),
                metadata: ChunkMetadata {
                    course_title: sc.chunk.course_title.clone(),
                    lesson_number: sc.chunk.lesson_number,
                    chunk_index: sc.chunk.chunk_index,
                },
                score: cosine_similarity(query_vec, &sc.vector) as f64,
            })
            .collect();
        Ok(rank_hits(hits, limit))
    }

    async fn clear(&self) -> Result<()> {
        write(&self.courses)?.clear();
        write(&self.chunks)?.clear();
        *write(&self.last_indexed)? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lesson;

    fn chunk(course: &str, lesson: u32, index: i64, text: &str) -> Chunk {
        Chunk {
            course_title: course.to_string(),
            lesson_number: lesson,
            chunk_index: index,
            text: text.to_string(),
            hash: String::new(),
        }
    }

    fn course(title: &str) -> Course {
        Course {
            title: title.to_string(),
            course_link: None,
            instructor: None,
            lessons: vec![Lesson {
                number: 1,
                title: "One".to_string(),
                lesson_link: Some("https://example.com/1".to_string()),
                content: String::new(),
            }],
        }
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity_and_filters() {
        let store = InMemoryStore::new();
        store
            .add_chunks(
                &[
                    chunk("A", 1, 0, "near"),
                    chunk("A", 2, 1, "far"),
                    chunk("B", 1, 0, "other course"),
                ],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.1]],
            )
            .await
            .unwrap();

        let hits = store
            .search_content(&[1.0, 0.0], 10, ContentFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "near");

        let hits = store
            .search_content(
                &[1.0, 0.0],
                10,
                ContentFilter {
                    course_title: Some("A"),
                    lesson_number: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "far");
    }

    #[tokio::test]
    async fn test_add_chunks_replaces_same_index() {
        let store = InMemoryStore::new();
        store
            .add_chunks(&[chunk("A", 1, 0, "old")], &[vec![1.0]])
            .await
            .unwrap();
        store
            .add_chunks(&[chunk("A", 1, 0, "new")], &[vec![1.0]])
            .await
            .unwrap();
        assert_eq!(store.chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_catalog_roundtrip_and_nearest() {
        let store = InMemoryStore::new();
        store.upsert_course(&course("Rust"), &[1.0, 0.0], "m").await.unwrap();
        store.upsert_course(&course("Python"), &[0.0, 1.0, 0.0], "m2").await.unwrap();
        assert_eq!(
            store.indexed_embedding().await.unwrap(),
            Some(("m2".to_string(), 3))
        );

        assert_eq!(store.course_titles().await.unwrap(), vec!["Python", "Rust"]);
        assert_eq!(store.course_count().await.unwrap(), 2);

        let outline = store.get_course("Rust").await.unwrap().unwrap();
        assert_eq!(outline.lessons[0].lesson_link.as_deref(), Some("https://example.com/1"));

        let (title, sim) = store.nearest_course(&[0.9, 0.1]).await.unwrap().unwrap();
        assert_eq!(title, "Rust");
        assert!(sim > 0.9);

        store.clear().await.unwrap();
        assert!(store.course_titles().await.unwrap().is_empty());
        assert!(store.indexed_embedding().await.unwrap().is_none());
    }
}
