//! Course ingestion: document files → parsed courses → both collections.
//!
//! Courses are keyed by title. A document whose title is already in the
//! catalog is skipped, so re-running ingestion over the same folder is a
//! no-op. Unreadable or malformed files are logged and counted but do not
//! stop the run.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ChunkingConfig;
use crate::document::process_course_file;
use crate::vector_store::VectorStore;

/// What happened to a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Added { title: String, chunks: usize },
    Skipped { title: String },
}

/// Totals for one folder ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files_seen: usize,
    pub courses_added: usize,
    pub courses_skipped: usize,
    pub chunks_added: usize,
    pub failures: Vec<IngestFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: String,
}

impl IngestReport {
    fn record(&mut self, outcome: &DocumentOutcome) {
        match outcome {
            DocumentOutcome::Added { chunks, .. } => {
                self.courses_added += 1;
                self.chunks_added += chunks;
            }
            DocumentOutcome::Skipped { .. } => self.courses_skipped += 1,
        }
    }
}

/// Parse one course document and store it unless its title is already indexed.
pub async fn add_course_document(
    store: &VectorStore,
    path: &Path,
    chunking: &ChunkingConfig,
) -> Result<DocumentOutcome> {
    let (course, chunks) = process_course_file(path, chunking)?;

    if store.has_course(&course.title).await? {
        tracing::info!(course = %course.title, path = %path.display(), "course already indexed, skipping");
        return Ok(DocumentOutcome::Skipped {
            title: course.title,
        });
    }

    store.add_chunks(&chunks).await?;
    store.add_course(&course).await?;

    tracing::info!(
        course = %course.title,
        lessons = course.lessons.len(),
        chunks = chunks.len(),
        "course indexed"
    );
    Ok(DocumentOutcome::Added {
        title: course.title,
        chunks: chunks.len(),
    })
}

/// Files directly or transitively under `folder` whose extension is in
/// `extensions` (case-insensitive), sorted by path.
pub fn scan_course_files(folder: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        bail!("Document folder does not exist: {}", folder.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Ingest every course document in `folder`.
///
/// With `clear_existing`, both collections are emptied first and every
/// document is re-indexed.
pub async fn add_course_folder(
    store: &VectorStore,
    folder: &Path,
    extensions: &[String],
    chunking: &ChunkingConfig,
    clear_existing: bool,
) -> Result<IngestReport> {
    let files = scan_course_files(folder, extensions)?;

    if clear_existing {
        tracing::info!("clearing existing course data");
        store.clear_all().await?;
    }

    let mut report = IngestReport {
        files_seen: files.len(),
        ..IngestReport::default()
    };

    for path in files {
        match add_course_document(store, &path, chunking).await {
            Ok(outcome) => report.record(&outcome),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to ingest course document: {:#}", e);
                report.failures.push(IngestFailure {
                    path,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    tracing::info!(
        folder = %folder.display(),
        added = report.courses_added,
        skipped = report.courses_skipped,
        chunks = report.chunks_added,
        failed = report.failures.len(),
        "folder ingestion finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::memory::InMemoryStore;
    use crate::vector_store::tests::VocabEmbedder;
    use std::sync::Arc;

    fn vector_store() -> VectorStore {
        VectorStore::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(VocabEmbedder::default()),
            &Config::default(),
        )
    }

    fn write_docs(dir: &Path) {
        std::fs::write(
            dir.join("course1.txt"),
            "Course Title: Intro to Embeddings\nCourse Instructor: Ada\n\nLesson 1: Vectors\nVectors encode meaning.\n\nLesson 2: Similarity\nCosine similarity compares vectors.",
        )
        .unwrap();
        std::fs::write(
            dir.join("course2.md"),
            "Course Title: Tool Calling\n\nLesson 0: Functions\nModels call declared functions.",
        )
        .unwrap();
        std::fs::write(dir.join("broken.txt"), "no header here").unwrap();
        std::fs::write(dir.join("image.png"), "not a course").unwrap();
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path());
        let files = scan_course_files(dir.path(), &["TXT".to_string(), "md".to_string()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["broken.txt", "course1.txt", "course2.md"]);
    }

    #[test]
    fn test_scan_missing_folder_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_course_files(&dir.path().join("missing"), &[]).is_err());
    }

    #[tokio::test]
    async fn test_folder_ingestion_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path());
        let store = vector_store();
        let extensions = vec!["txt".to_string(), "md".to_string()];
        let chunking = ChunkingConfig::default();

        let first = add_course_folder(&store, dir.path(), &extensions, &chunking, false)
            .await
            .unwrap();
        assert_eq!(first.files_seen, 3);
        assert_eq!(first.courses_added, 2);
        assert_eq!(first.chunks_added, 3);
        assert_eq!(first.failures.len(), 1);
        assert!(first.failures[0].path.ends_with("broken.txt"));

        let second = add_course_folder(&store, dir.path(), &extensions, &chunking, false)
            .await
            .unwrap();
        assert_eq!(second.courses_added, 0);
        assert_eq!(second.courses_skipped, 2);
        assert_eq!(second.chunks_added, 0);
        assert_eq!(store.course_count().await.unwrap(), 2);

        let results = store.search("vectors", None, None, Some(20)).await;
        assert_eq!(results.hits.len(), 3);
    }

    #[tokio::test]
    async fn test_clear_existing_reindexes() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path());
        let store = vector_store();
        let extensions = vec!["txt".to_string()];
        let chunking = ChunkingConfig::default();

        add_course_folder(&store, dir.path(), &extensions, &chunking, false)
            .await
            .unwrap();
        let again = add_course_folder(&store, dir.path(), &extensions, &chunking, true)
            .await
            .unwrap();
        assert_eq!(again.courses_added, 1);
        assert_eq!(again.courses_skipped, 0);
        assert_eq!(store.course_titles().await.unwrap(), vec!["Intro to Embeddings"]);
    }

    #[tokio::test]
    async fn test_single_document_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        write_docs(dir.path());
        let store = vector_store();
        let path = dir.path().join("course2.md");
        let chunking = ChunkingConfig::default();

        assert_eq!(
            add_course_document(&store, &path, &chunking).await.unwrap(),
            DocumentOutcome::Added {
                title: "Tool Calling".to_string(),
                chunks: 1
            }
        );
        assert_eq!(
            add_course_document(&store, &path, &chunking).await.unwrap(),
            DocumentOutcome::Skipped {
                title: "Tool Calling".to_string()
            }
        );
        assert!(add_course_document(&store, &dir.path().join("broken.txt"), &chunking)
            .await
            .is_err());
    }
}
