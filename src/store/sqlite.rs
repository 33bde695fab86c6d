//! SQLite-backed [`Store`] implementation.
//!
//! Vectors live as BLOB columns next to their rows. Similarity is computed
//! in Rust over the rows that pass the course/lesson filter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate::apply_schema;
use crate::models::{Chunk, ChunkMetadata, Course, CourseOutline, LessonSummary, SearchHit};

use super::{rank_hits, ContentFilter, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the configured database and make sure the schema exists.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_course(
        &self,
        course: &Course,
        title_vector: &[f32],
        model: &str,
    ) -> Result<()> {
        let lessons: Vec<LessonSummary> = course.lessons.iter().map(LessonSummary::from).collect();
        let lessons_json = serde_json::to_string(&lessons)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO course_catalog (title, instructor, course_link, lessons_json,
                                        embedding, model, dims, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(title) DO UPDATE SET
                instructor = excluded.instructor,
                course_link = excluded.course_link,
                lessons_json = excluded.lessons_json,
                embedding = excluded.embedding,
                model = excluded.model,
                dims = excluded.dims,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&course.title)
        .bind(&course.instructor)
        .bind(&course.course_link)
        .bind(&lessons_json)
        .bind(vec_to_blob(title_vector))
        .bind(model)
        .bind(title_vector.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_chunks(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO course_content
                    (course_title, lesson_number, chunk_index, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.course_title)
            .bind(chunk.lesson_number as i64)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn course_titles(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT title FROM course_catalog ORDER BY title ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("title")).collect())
    }

    async fn course_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_catalog")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn indexed_embedding(&self) -> Result<Option<(String, usize)>> {
        let row = sqlx::query(
            "SELECT model, dims FROM course_catalog ORDER BY indexed_at DESC, rowid DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| {
            let dims: i64 = row.get("dims");
            (row.get("model"), dims as usize)
        }))
    }

    async fn get_course(&self, title: &str) -> Result<Option<CourseOutline>> {
        let row = sqlx::query(
            "SELECT title, instructor, course_link, lessons_json FROM course_catalog WHERE title = ?",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let lessons_json: String = row.get("lessons_json");
        let lessons: Vec<LessonSummary> = serde_json::from_str(&lessons_json)
            .with_context(|| format!("Corrupt lesson metadata for course '{}'", title))?;

        Ok(Some(CourseOutline {
            title: row.get("title"),
            course_link: row.get("course_link"),
            instructor: row.get("instructor"),
            lessons,
        }))
    }

    async fn nearest_course(&self, query_vec: &[f32]) -> Result<Option<(String, f32)>> {
        let rows = sqlx::query("SELECT title, embedding FROM course_catalog")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let title: String = row.get("title");
                (title, cosine_similarity(query_vec, &blob_to_vec(&blob)))
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)))
    }

    async fn search_content(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: ContentFilter<'_>,
    ) -> Result<Vec<SearchHit>> {
        let lesson = filter.lesson_number.map(|n| n as i64);
        let rows = sqlx::query(
            r#"
            SELECT course_title, lesson_number, chunk_index, text, embedding
            FROM course_content
            WHERE (? IS NULL OR course_title = ?)
              AND (? IS NULL OR lesson_number = ?)
            "#,
        )
        .bind(filter.course_title)
        .bind(filter.course_title)
        .bind(lesson)
        .bind(lesson)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let lesson_number: i64 = row.get("lesson_number");
                SearchHit {
                    text: row.get("text"),
                    metadata: ChunkMetadata {
                        course_title: row.get("course_title"),
                        lesson_number: lesson_number as u32,
                        chunk_index: row.get("chunk_index"),
                    },
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64,
                }
            })
            .collect();

        Ok(rank_hits(hits, limit))
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM course_content")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM course_catalog")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
