//! Document conversion: file on disk → normalized text.
//!
//! The heavy converters (PDF, Office, OCR) live outside this crate and are
//! plugged in through [`DocumentConverter`]. [`PlainTextConverter`] covers the
//! text-like formats so the pipeline works without an external engine.

use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use kbase_core::Result;

/// Outcome reported by a conversion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Success,
    Failure,
}

/// Normalized text plus the structural counts the engine could recover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub status: ConversionStatus,
    pub normalized_text: String,
    pub page_count: Option<usize>,
    pub table_count: Option<usize>,
    pub image_count: Option<usize>,
    pub title: Option<String>,
}

impl ConversionOutput {
    pub fn success(normalized_text: String) -> Self {
        Self {
            status: ConversionStatus::Success,
            normalized_text,
            page_count: None,
            table_count: None,
            image_count: None,
            title: None,
        }
    }

    pub fn failure() -> Self {
        Self {
            status: ConversionStatus::Failure,
            normalized_text: String::new(),
            page_count: None,
            table_count: None,
            image_count: None,
            title: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ConversionStatus::Success
    }
}

/// Converts a stored file into normalized text.
///
/// A `Failure` status means the document must be rejected; no partial text is used.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, path: &Path) -> Result<ConversionOutput>;
}

/// Formats read directly as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextFormat {
    Plain,
    Markdown,
    Html,
    Json,
    Binary,
}

impl TextFormat {
    fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "md" | "mdx" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "json" => Self::Json,
            "pdf" | "docx" | "pptx" | "xlsx" | "png" | "jpg" | "jpeg" | "tiff" | "webp" => {
                Self::Binary
            }
            _ => Self::Plain,
        }
    }
}

static HTML_SKIP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").expect("html skip pattern")
});
static HTML_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(p|div|br|h[1-6]|li|tr|section|article)[^>]*>").expect("html block pattern")
});
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("html tag pattern"));
static HTML_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("html title pattern"));
static MD_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("markdown title pattern"));

/// Reads text-like files directly; reports `Failure` for binary formats.
#[derive(Debug, Default, Clone)]
pub struct PlainTextConverter;

impl PlainTextConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert already-loaded file content.
    pub fn convert_str(&self, content: &str, ext: &str) -> ConversionOutput {
        match TextFormat::from_extension(ext) {
            TextFormat::Plain => ConversionOutput::success(content.to_string()),
            TextFormat::Markdown => {
                let mut output = ConversionOutput::success(content.to_string());
                output.title = MD_TITLE_RE
                    .captures(content)
                    .map(|c| c[1].trim().to_string());
                output.table_count = count_markdown_tables(content);
                output
            }
            TextFormat::Html => {
                let title = HTML_TITLE_RE
                    .captures(content)
                    .map(|c| c[1].trim().to_string())
                    .filter(|t| !t.is_empty());
                let mut output = ConversionOutput::success(html_to_text(content));
                output.title = title;
                let tables = content.to_lowercase().matches("<table").count();
                output.table_count = (tables > 0).then_some(tables);
                let images = content.to_lowercase().matches("<img").count();
                output.image_count = (images > 0).then_some(images);
                output
            }
            TextFormat::Json => ConversionOutput::success(json_to_text(content)),
            TextFormat::Binary => ConversionOutput::failure(),
        }
    }
}

#[async_trait]
impl DocumentConverter for PlainTextConverter {
    async fn convert(&self, path: &Path) -> Result<ConversionOutput> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if TextFormat::from_extension(ext) == TextFormat::Binary {
            warn!(
                "No built-in converter for {}; an external conversion engine is required",
                path.display()
            );
            return Ok(ConversionOutput::failure());
        }

        let bytes = tokio::fs::read(path).await?;
        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => {
                debug!("{} is not valid UTF-8", path.display());
                return Ok(ConversionOutput::failure());
            }
        };

        // Mostly control characters: treat as binary.
        let control = content
            .chars()
            .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
            .count();
        if control > content.len() / 10 {
            return Ok(ConversionOutput::failure());
        }

        Ok(self.convert_str(&content, ext))
    }
}

fn html_to_text(html: &str) -> String {
    let without_scripts = HTML_SKIP_RE.replace_all(html, "");
    let with_breaks = HTML_BLOCK_RE.replace_all(&without_scripts, "\n\n");
    let stripped = HTML_TAG_RE.replace_all(&with_breaks, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Flatten JSON string values into paragraphs; non-JSON input passes through.
fn json_to_text(content: &str) -> String {
    fn collect(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
            serde_json::Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            serde_json::Value::Object(map) => map.values().for_each(|v| collect(v, out)),
            _ => {}
        }
    }

    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => {
            let mut texts = Vec::new();
            collect(&value, &mut texts);
            texts.join("\n\n")
        }
        Err(_) => content.to_string(),
    }
}

fn count_markdown_tables(content: &str) -> Option<usize> {
    let count = content
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('|') && l.contains("---"))
        .count();
    (count > 0).then_some(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_markdown_title_and_tables() {
        let md = "# Quarterly Report\n\nIntro.\n\n| a | b |\n|---|---|\n| 1 | 2 |\n";
        let out = PlainTextConverter::new().convert_str(md, "md");
        assert!(out.is_success());
        assert_eq!(out.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(out.table_count, Some(1));
        assert_eq!(out.normalized_text, md);
    }

    #[test]
    fn test_html_is_stripped() {
        let html = "<html><head><title>Doc</title><style>p{}</style></head>\
                    <body><p>First &amp; foremost</p><p>Second</p><img src=x></body></html>";
        let out = PlainTextConverter::new().convert_str(html, "html");
        assert_eq!(out.title.as_deref(), Some("Doc"));
        assert_eq!(out.image_count, Some(1));
        assert!(out.normalized_text.contains("First & foremost"));
        assert!(out.normalized_text.contains("Second"));
        assert!(!out.normalized_text.contains('<'));
        assert!(!out.normalized_text.contains("p{}"));
    }

    #[test]
    fn test_json_strings_flattened() {
        let json = r#"{"title": "Notes", "items": ["alpha", {"body": "beta"}], "n": 3}"#;
        let out = PlainTextConverter::new().convert_str(json, "json");
        let text = out.normalized_text;
        assert!(text.contains("Notes"));
        assert!(text.contains("alpha"));
        assert!(text.contains("beta"));
        assert!(!text.contains('3'));
    }

    #[tokio::test]
    async fn test_convert_text_file() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "hello\n\nworld").unwrap();

        let out = PlainTextConverter::new().convert(file.path()).await.unwrap();
        assert!(out.is_success());
        assert_eq!(out.normalized_text, "hello\n\nworld");
    }

    #[tokio::test]
    async fn test_binary_formats_fail() {
        let file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        let out = PlainTextConverter::new().convert(file.path()).await.unwrap();
        assert_eq!(out.status, ConversionStatus::Failure);
        assert!(out.normalized_text.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(&[0xff, 0xfe, 0x00, 0x01]).unwrap();
        let out = PlainTextConverter::new().convert(file.path()).await.unwrap();
        assert!(!out.is_success());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = PlainTextConverter::new()
            .convert(Path::new("/definitely/not/here.txt"))
            .await;
        assert!(matches!(result, Err(kbase_core::Error::Io(_))));
    }
}
