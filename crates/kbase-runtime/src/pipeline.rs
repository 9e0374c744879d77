//! Ingestion pipeline: file → chunks → redaction → embeddings → vector store.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use kbase_core::{Error, PiiCategory, PipelineConfig, Result};
use kbase_infer::{EmbeddingService, EmbeddingVector};
use kbase_ingest::{identify, Chunk, Chunker, Document, DocumentConverter, DocumentIdentity};
use kbase_protocol::PiiEngine;
use kbase_store::{
    DeleteSelector, MetadataFilter, StoreStats, VectorMatch, VectorRecord, VectorStore,
};

use crate::types::{DocumentMetadata, IngestReport};

/// Records per `VectorStore::upsert` call.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Owns the services a document passes through.
pub struct IngestionPipeline {
    config: PipelineConfig,
    chunker: Chunker,
    converter: Arc<dyn DocumentConverter>,
    pii: Arc<PiiEngine>,
    embeddings: Arc<EmbeddingService>,
    store: Arc<dyn VectorStore>,
}

impl IngestionPipeline {
    pub fn new(
        config: PipelineConfig,
        converter: Arc<dyn DocumentConverter>,
        pii: Arc<PiiEngine>,
        embeddings: Arc<EmbeddingService>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap);
        info!(
            "Ingestion pipeline ready: chunk_size={}, overlap={}, model={}, store={}, pii={}",
            config.chunk_size,
            config.chunk_overlap,
            embeddings.model_name(),
            store.name(),
            pii.is_enabled()
        );
        Self {
            config,
            chunker,
            converter,
            pii,
            embeddings,
            store,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn namespace<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.unwrap_or(self.config.namespace.as_str())
    }

    /// Read, identify and convert a file, then ingest its text.
    ///
    /// A conversion that does not succeed rejects the whole document.
    pub async fn ingest_file(
        &self,
        path: &Path,
        filename: &str,
        namespace: Option<&str>,
    ) -> Result<IngestReport> {
        let bytes = tokio::fs::read(path).await?;
        let identity = identify(&bytes, filename);
        drop(bytes);

        let output = self.converter.convert(path).await?;
        if !output.is_success() {
            return Err(Error::Conversion(format!(
                "could not convert {} ({})",
                filename, identity.doc_type
            )));
        }

        let metadata = DocumentMetadata::from_conversion(filename, identity.doc_type, &output);
        let document = Document::new(identity, filename, output.normalized_text);
        self.ingest_document(&document, metadata.into_map(), namespace)
            .await
    }

    /// Ingest already-extracted text under a known identity.
    pub async fn ingest_text(
        &self,
        identity: DocumentIdentity,
        filename: &str,
        text: &str,
        metadata: Map<String, Value>,
        namespace: Option<&str>,
    ) -> Result<IngestReport> {
        let document = Document::new(identity, filename, text.to_string());
        self.ingest_document(&document, metadata, namespace).await
    }

    async fn ingest_document(
        &self,
        document: &Document,
        metadata: Map<String, Value>,
        namespace: Option<&str>,
    ) -> Result<IngestReport> {
        let namespace = self.namespace(namespace);
        let chunks = self
            .chunker
            .chunk(&document.raw_text, &document.id, &metadata);
        debug!("Document {} split into {} chunks", document.id, chunks.len());

        let (chunks, pii_categories_found) = self.redact_chunks(chunks).await;

        let vectors_upserted = if chunks.is_empty() {
            0
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embed_blocking(texts).await?;
            let records = chunks
                .iter()
                .zip(embeddings)
                .map(|(chunk, values)| to_record(chunk, values))
                .collect::<Vec<_>>();
            self.upsert_batched(records, namespace).await?
        };

        let report = IngestReport {
            document_id: document.id.clone(),
            filename: document.filename.clone(),
            file_type: document.doc_type,
            chunk_count: chunks.len(),
            word_count: document.raw_text.split_whitespace().count(),
            page_count: metadata
                .get("page_count")
                .and_then(Value::as_u64)
                .map(|p| p as usize),
            has_pii: !pii_categories_found.is_empty(),
            pii_categories_found,
            vectors_upserted,
            ingested_at: Utc::now(),
        };

        info!(
            "Ingested {} as {} ({} chunks, {} vectors, pii={})",
            report.filename,
            report.document_id,
            report.chunk_count,
            report.vectors_upserted,
            report.has_pii
        );
        Ok(report)
    }

    /// Redact each chunk in place when PII detection is enabled.
    async fn redact_chunks(&self, chunks: Vec<Chunk>) -> (Vec<Chunk>, Vec<PiiCategory>) {
        let mut found: Vec<PiiCategory> = Vec::new();
        if !self.pii.is_enabled() {
            return (chunks, found);
        }

        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let (redacted, result) = self
                .pii
                .redact(&chunk.content, &self.config.pii_categories)
                .await;

            let mut chunk = if result.has_pii {
                chunk.with_content(redacted)
            } else {
                chunk
            };
            chunk.metadata.insert("has_pii".into(), json!(result.has_pii));
            if result.has_pii {
                let names: Vec<&str> = result.categories_found.iter().map(|c| c.as_str()).collect();
                chunk.metadata.insert("pii_categories".into(), json!(names));
            }
            for category in result.categories_found {
                if !found.contains(&category) {
                    found.push(category);
                }
            }
            out.push(chunk);
        }
        (out, found)
    }

    /// Model inference is CPU-bound; keep it off the async workers.
    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<EmbeddingVector>> {
        let service = self.embeddings.clone();
        let batch_size = self.config.embedding_batch_size;
        tokio::task::spawn_blocking(move || service.embed_many(&texts, batch_size))
            .await
            .map_err(|e| Error::Internal(format!("embedding task failed: {}", e)))?
    }

    async fn upsert_batched(&self, records: Vec<VectorRecord>, namespace: &str) -> Result<usize> {
        let mut upserted = 0;
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            let batch: Vec<VectorRecord> = records.by_ref().take(UPSERT_BATCH_SIZE).collect();
            upserted += self.store.upsert(batch, namespace).await?;
        }
        Ok(upserted)
    }

    /// Remove every vector belonging to `document_id`.
    pub async fn delete_document(&self, document_id: &str, namespace: Option<&str>) -> Result<usize> {
        let mut filter = MetadataFilter::new();
        filter.insert("document_id".into(), json!(document_id));
        let removed = self
            .store
            .delete(DeleteSelector::Filter(filter), self.namespace(namespace))
            .await?;
        info!("Deleted {} vectors for document {}", removed, document_id);
        Ok(removed)
    }

    /// Stored records for the given chunk ids, in request order.
    pub async fn fetch(&self, ids: &[String], namespace: Option<&str>) -> Result<Vec<VectorRecord>> {
        self.store.fetch(ids, self.namespace(namespace)).await
    }

    /// Vector counts. `None` covers every namespace in the store.
    pub async fn stats(&self, namespace: Option<&str>) -> Result<StoreStats> {
        self.store.stats(namespace).await
    }

    /// Embed `text` and return the nearest stored chunks.
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
        namespace: Option<&str>,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>> {
        let service = self.embeddings.clone();
        let query = text.to_string();
        let vector = tokio::task::spawn_blocking(move || service.embed_query(&query))
            .await
            .map_err(|e| Error::Internal(format!("embedding task failed: {}", e)))??;

        self.store
            .query(&vector, top_k, self.namespace(namespace), filter)
            .await
    }
}

fn to_record(chunk: &Chunk, values: EmbeddingVector) -> VectorRecord {
    let mut metadata = chunk.metadata.clone();
    metadata.insert("document_id".into(), json!(chunk.document_id));
    metadata.insert("content".into(), json!(chunk.content));
    metadata.insert("chunk_index".into(), json!(chunk.index));
    VectorRecord {
        id: chunk.id.clone(),
        values,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_carries_chunk_payload() {
        let mut metadata = Map::new();
        metadata.insert("filename".into(), json!("a.txt"));
        let chunks = Chunker::new(1000, 200).chunk("Alpha beta.", "doc1", &metadata);

        let record = to_record(&chunks[0], vec![1.0, 0.0]);
        assert_eq!(record.id, "doc1_chunk_0");
        assert_eq!(record.metadata["document_id"], json!("doc1"));
        assert_eq!(record.metadata["content"], json!("Alpha beta."));
        assert_eq!(record.metadata["chunk_index"], json!(0));
        assert_eq!(record.metadata["filename"], json!("a.txt"));
    }
}
