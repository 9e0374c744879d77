//! Runtime types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use kbase_core::PiiCategory;
use kbase_ingest::{ConversionOutput, DocumentType};

/// Document-level metadata copied into every chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub file_type: DocumentType,
    pub page_count: Option<usize>,
    pub has_tables: bool,
    pub table_count: usize,
    pub has_images: bool,
    pub image_count: usize,
    pub title: Option<String>,
}

impl DocumentMetadata {
    pub fn from_conversion(filename: &str, file_type: DocumentType, output: &ConversionOutput) -> Self {
        let table_count = output.table_count.unwrap_or(0);
        let image_count = output.image_count.unwrap_or(0);
        Self {
            filename: filename.to_string(),
            file_type,
            page_count: output.page_count,
            has_tables: table_count > 0,
            table_count,
            has_images: image_count > 0,
            image_count,
            title: output.title.clone(),
        }
    }

    /// Flatten into a chunk metadata map. Absent optionals are omitted.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("filename".into(), json!(self.filename));
        map.insert("file_type".into(), json!(self.file_type.as_str()));
        if let Some(pages) = self.page_count {
            map.insert("page_count".into(), json!(pages));
        }
        map.insert("has_tables".into(), json!(self.has_tables));
        map.insert("table_count".into(), json!(self.table_count));
        map.insert("has_images".into(), json!(self.has_images));
        map.insert("image_count".into(), json!(self.image_count));
        if let Some(title) = self.title {
            map.insert("title".into(), json!(title));
        }
        map
    }
}

/// Summary of one ingested document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub filename: String,
    pub file_type: DocumentType,
    pub chunk_count: usize,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    pub has_pii: bool,
    pub pii_categories_found: Vec<PiiCategory>,
    pub vectors_upserted: usize,
    pub ingested_at: DateTime<Utc>,
}
