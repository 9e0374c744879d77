//! Content-addressed document identity.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest.
const ID_HEX_LEN: usize = 16;

/// Logical document type, resolved from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Txt,
    Md,
    Html,
    Image,
}

impl DocumentType {
    /// Map a filename to its document type. Unknown or missing extensions are plain text.
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Self::from_extension(ext)
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "pptx" => Self::Pptx,
            "xlsx" => Self::Xlsx,
            "md" => Self::Md,
            "html" | "htm" => Self::Html,
            "png" | "jpg" | "jpeg" | "tiff" | "webp" => Self::Image,
            _ => Self::Txt,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Xlsx => "xlsx",
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Html => "html",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of a document: id plus logical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIdentity {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
}

/// A document after conversion to normalized text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub raw_text: String,
}

impl Document {
    pub fn new(identity: DocumentIdentity, filename: impl Into<String>, raw_text: String) -> Self {
        Self {
            id: identity.id,
            filename: filename.into(),
            doc_type: identity.doc_type,
            raw_text,
        }
    }
}

/// Derive the content-addressed id and document type for raw bytes + filename.
///
/// The id is the first 16 hex characters of SHA-256(`content || filename`).
pub fn identify(content: &[u8], filename: &str) -> DocumentIdentity {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher.update(filename.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(ID_HEX_LEN);

    DocumentIdentity {
        id,
        doc_type: DocumentType::from_filename(filename),
    }
}
