//! Paragraph-aware text chunking with character overlap.
//!
//! Paragraphs (blank-line separated) are packed into chunks up to a character
//! budget. A paragraph is never split, so a single paragraph larger than the
//! budget becomes its own oversized chunk. Each new chunk is seeded with the
//! tail of the previous one so neighbouring chunks share local context.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Separator placed between paragraphs inside a chunk.
const PARAGRAPH_SEPARATOR: &str = "\n\n";

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").expect("paragraph break pattern"));

/// A retrievable passage of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}_chunk_{index}`.
    pub id: String,
    pub document_id: String,
    #[serde(rename = "chunk_index")]
    pub index: usize,
    pub content: String,
    pub char_count: usize,
    pub word_count: usize,
    /// Document metadata plus `chunk_index`.
    pub metadata: Map<String, Value>,
}

impl Chunk {
    fn new(document_id: &str, index: usize, content: &str, metadata: &Map<String, Value>) -> Self {
        let mut metadata = metadata.clone();
        metadata.insert("chunk_index".into(), Value::from(index));

        Self {
            id: format!("{}_chunk_{}", document_id, index),
            document_id: document_id.to_string(),
            index,
            content: content.to_string(),
            char_count: content.chars().count(),
            word_count: content.split_whitespace().count(),
            metadata,
        }
    }

    /// Same chunk (id, index, metadata) carrying different text, e.g. after redaction.
    pub fn with_content(self, content: String) -> Self {
        Self {
            char_count: content.chars().count(),
            word_count: content.split_whitespace().count(),
            content,
            ..self
        }
    }
}

/// Splits normalized text into overlapping, paragraph-aligned chunks.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Chunk `text` for `document_id`. Empty or blank input yields no chunks.
    pub fn chunk(&self, text: &str, document_id: &str, metadata: &Map<String, Value>) -> Vec<Chunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_chars = 0usize;

        for paragraph in PARAGRAPH_BREAK
            .split(text)
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            let paragraph_chars = paragraph.chars().count();

            if !buffer.is_empty()
                && buffer_chars + paragraph_chars + PARAGRAPH_SEPARATOR.len() > self.chunk_size
            {
                chunks.push(Chunk::new(document_id, chunks.len(), buffer.trim(), metadata));
                buffer = self.overlap_seed(&buffer, buffer_chars);
                buffer_chars = buffer.chars().count();
            }

            buffer.push_str(paragraph);
            buffer.push_str(PARAGRAPH_SEPARATOR);
            buffer_chars += paragraph_chars + PARAGRAPH_SEPARATOR.len();
        }

        let rest = buffer.trim();
        if !rest.is_empty() {
            chunks.push(Chunk::new(document_id, chunks.len(), rest, metadata));
        }

        chunks
    }

    /// Trailing `chunk_overlap` characters of the emitted buffer, trimmed.
    /// The cut is clamped to the buffer, so an overlap larger than the buffer keeps all of it.
    fn overlap_seed(&self, buffer: &str, buffer_chars: usize) -> String {
        let skip = buffer_chars.saturating_sub(self.chunk_overlap);
        let tail: String = buffer.chars().skip(skip).collect();
        let tail = tail.trim();
        if tail.is_empty() {
            String::new()
        } else {
            format!("{}{}", tail, PARAGRAPH_SEPARATOR)
        }
    }
}
