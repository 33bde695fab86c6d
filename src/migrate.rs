//! Schema for the two vector collections.
//!
//! `course_catalog` holds one row per course (title embedding plus lesson
//! metadata); `course_content` holds one row per chunk. Vectors are stored
//! as little-endian f32 BLOBs.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file and apply the schema. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_catalog (
            title TEXT PRIMARY KEY,
            instructor TEXT,
            course_link TEXT,
            lessons_json TEXT NOT NULL DEFAULT '[]',
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_content (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_title TEXT NOT NULL,
            lesson_number INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL,
            UNIQUE(course_title, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_course_content_course ON course_content(course_title, lesson_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
