//! Fixed-window text chunker.
//!
//! Splits lesson text into windows of `chunk_size` characters that overlap
//! their neighbours by `chunk_overlap` characters. Windows advance by
//! `chunk_size - chunk_overlap` until the text is exhausted, so a lesson of
//! `L` characters yields one chunk when `L <= chunk_size` and
//! `ceil((L - overlap) / (size - overlap))` chunks otherwise.
//!
//! Lengths are counted in `char`s, so windows always fall on UTF-8
//! boundaries. Each chunk carries a SHA-256 hash of its text.
//!
//! # Example
//!
//! ```rust
//! use course_rag::chunk::split_windows;
//!
//! let windows = split_windows("abcdefghij", 4, 1);
//! assert_eq!(windows, vec!["abcd", "defg", "ghij"]);
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Chunk, Lesson};

/// Split `text` into overlapping windows.
///
/// Returns an empty vector for empty or whitespace-only text. The caller is
/// responsible for ensuring `chunk_overlap < chunk_size`; a degenerate step
/// is clamped to one character.
pub fn split_windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<&str> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = offsets.len() - 1;

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_len);
        windows.push(&text[offsets[start]..offsets[end]]);
        if end >= char_len {
            break;
        }
        start += step;
    }
    windows
}

/// Chunk one lesson, numbering chunks from `first_index`.
pub fn chunk_lesson(
    course_title: &str,
    lesson: &Lesson,
    first_index: i64,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    split_windows(&lesson.content, chunk_size, chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(i, window)| make_chunk(course_title, lesson.number, first_index + i as i64, window))
        .collect()
}

fn make_chunk(course_title: &str, lesson_number: u32, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        course_title: course_title.to_string(),
        lesson_number,
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
