//! Course document parsing.
//!
//! A course document starts with a header and continues with lesson
//! sections:
//!
//! ```text
//! Course Title: Building Towards Computer Use
//! Course Link: https://example.com/computer-use
//! Course Instructor: Colt Steele
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/computer-use/lesson-0
//! Welcome to the course...
//!
//! Lesson 1: Working with the API
//! ...
//! ```
//!
//! `Course Link` and `Course Instructor` are optional, as is each
//! `Lesson Link`. A document with a header but no lesson markers becomes a
//! single lesson 0 titled after the course.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::chunk::chunk_lesson;
use crate::config::ChunkingConfig;
use crate::models::{Chunk, Course, Lesson};

const TITLE_PREFIX: &str = "Course Title:";
const LINK_PREFIX: &str = "Course Link:";
const INSTRUCTOR_PREFIX: &str = "Course Instructor:";
const LESSON_LINK_PREFIX: &str = "Lesson Link:";

/// Parse the text of a course document.
///
/// Fails when the first non-empty line is not a `Course Title:` header or
/// the title is blank.
pub fn parse_course(text: &str) -> Result<Course> {
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty()).peekable();

    let title = match lines.next().and_then(|l| strip_prefix_ci(l.trim(), TITLE_PREFIX)) {
        Some(t) if !t.is_empty() => t.to_string(),
        Some(_) => bail!("course title is empty"),
        None => bail!("missing '{}' header", TITLE_PREFIX),
    };

    let mut course_link = None;
    let mut instructor = None;
    while let Some(line) = lines.peek() {
        let line = line.trim();
        if let Some(link) = strip_prefix_ci(line, LINK_PREFIX) {
            course_link = non_empty(link);
        } else if let Some(name) = strip_prefix_ci(line, INSTRUCTOR_PREFIX) {
            instructor = non_empty(name);
        } else if !line.is_empty() {
            break;
        }
        lines.next();
    }

    let mut lessons: Vec<Lesson> = Vec::new();
    let mut preamble: Vec<&str> = Vec::new();
    let mut body: Vec<&str> = Vec::new();
    let mut current: Option<Lesson> = None;

    for line in lines {
        if let Some((number, lesson_title)) = parse_lesson_marker(line) {
            if let Some(mut lesson) = current.take() {
                lesson.content = body.join("\n").trim().to_string();
                lessons.push(lesson);
            }
            body.clear();
            current = Some(Lesson {
                number,
                title: lesson_title,
                lesson_link: None,
                content: String::new(),
            });
            continue;
        }

        match current.as_mut() {
            Some(lesson) => {
                if lesson.lesson_link.is_none() && body.iter().all(|l| l.trim().is_empty()) {
                    if let Some(link) = strip_prefix_ci(line.trim(), LESSON_LINK_PREFIX) {
                        lesson.lesson_link = non_empty(link);
                        continue;
                    }
                }
                body.push(line);
            }
            None => preamble.push(line),
        }
    }

    if let Some(mut lesson) = current.take() {
        lesson.content = body.join("\n").trim().to_string();
        lessons.push(lesson);
    }

    if lessons.is_empty() {
        lessons.push(Lesson {
            number: 0,
            title: title.clone(),
            lesson_link: None,
            content: preamble.join("\n").trim().to_string(),
        });
    }

    Ok(Course {
        title,
        course_link,
        instructor,
        lessons,
    })
}

/// Split every lesson of a course into chunks with a course-wide running index.
pub fn chunk_course(course: &Course, chunking: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for lesson in &course.lessons {
        let next_index = chunks.len() as i64;
        chunks.extend(chunk_lesson(
            &course.title,
            lesson,
            next_index,
            chunking.chunk_size,
            chunking.chunk_overlap,
        ));
    }
    chunks
}

/// Read, parse and chunk a single course file.
pub fn process_course_file(path: &Path, chunking: &ChunkingConfig) -> Result<(Course, Vec<Chunk>)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read course document: {}", path.display()))?;
    let course =
        parse_course(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    let chunks = chunk_course(&course, chunking);
    Ok((course, chunks))
}

/// Recognise `Lesson <n>: <title>`.
fn parse_lesson_marker(line: &str) -> Option<(u32, String)> {
    let rest = strip_prefix_ci(line.trim(), "Lesson")?;
    let (number, title) = rest.split_once(':')?;
    let number = number.trim().parse::<u32>().ok()?;
    Some((number, title.trim().to_string()))
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(line[prefix.len()..].trim())
    } else {
        None
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
