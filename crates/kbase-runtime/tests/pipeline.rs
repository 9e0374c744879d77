//! End-to-end pipeline tests with a keyword-count model and the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map};

use kbase_core::{Error, PiiCategory, PipelineConfig, Result};
use kbase_infer::{EmbeddingModel, EmbeddingService, EmbeddingVector};
use kbase_ingest::{identify, DocumentType, PlainTextConverter};
use kbase_protocol::PiiEngine;
use kbase_runtime::{IngestionPipeline, UPSERT_BATCH_SIZE};
use kbase_store::{
    DeleteSelector, MemoryVectorStore, MetadataFilter, StoreStats, VectorMatch, VectorRecord,
    VectorStore,
};

const VOCAB: [&str; 4] = ["rust", "ocean", "music", "garden"];

/// One dimension per vocabulary word plus a constant bias dimension.
#[derive(Default)]
struct KeywordModel {
    texts_embedded: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl EmbeddingModel for KeywordModel {
    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = VOCAB.iter().map(|w| lower.matches(w).count() as f32).collect();
        v.push(1.0);
        Ok(v)
    }

    fn dimension(&self) -> usize {
        VOCAB.len() + 1
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Memory store that records the size of every upsert call.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryVectorStore,
    batches: Mutex<Vec<usize>>,
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn upsert(&self, records: Vec<VectorRecord>, namespace: &str) -> Result<usize> {
        self.batches.lock().unwrap().push(records.len());
        self.inner.upsert(records, namespace).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>> {
        self.inner.query(vector, top_k, namespace, filter).await
    }

    async fn delete(&self, selector: DeleteSelector, namespace: &str) -> Result<usize> {
        self.inner.delete(selector, namespace).await
    }

    async fn fetch(&self, ids: &[String], namespace: &str) -> Result<Vec<VectorRecord>> {
        self.inner.fetch(ids, namespace).await
    }

    async fn stats(&self, namespace: Option<&str>) -> Result<StoreStats> {
        self.inner.stats(namespace).await
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Harness {
    pipeline: IngestionPipeline,
    model: Arc<KeywordModel>,
    store: Arc<RecordingStore>,
}

fn harness(config: PipelineConfig) -> Harness {
    let model = Arc::new(KeywordModel::default());
    let store = Arc::new(RecordingStore::default());
    let embeddings = Arc::new(EmbeddingService::new(
        model.clone(),
        config.embedding_cache_enabled,
    ));
    let pii = Arc::new(PiiEngine::new(config.pii_detection_enabled));
    let pipeline = IngestionPipeline::new(
        config,
        Arc::new(PlainTextConverter::new()),
        pii,
        embeddings,
        store.clone(),
    );
    Harness {
        pipeline,
        model,
        store,
    }
}

const SAMPLE: &str = "My password is secret123 and my email is john@example.com";

#[tokio::test]
async fn test_ingest_text_redacts_before_embedding() {
    let h = harness(PipelineConfig::default());
    let identity = identify(SAMPLE.as_bytes(), "note.txt");
    let doc_id = identity.id.clone();

    let report = h
        .pipeline
        .ingest_text(identity, "note.txt", SAMPLE, Map::new(), None)
        .await
        .unwrap();

    assert!(report.has_pii);
    assert_eq!(
        report.pii_categories_found,
        vec![PiiCategory::Password, PiiCategory::Email]
    );
    assert_eq!(report.chunk_count, 1);
    assert_eq!(report.vectors_upserted, 1);
    assert_eq!(report.file_type, DocumentType::Txt);

    let record = h
        .store
        .inner
        .get(&format!("{}_chunk_0", doc_id), "default")
        .unwrap();
    assert_eq!(
        record.metadata["content"],
        json!("My password is [REDACTED_PASSWORD] and my email is [REDACTED_EMAIL]")
    );
    assert_eq!(record.metadata["has_pii"], json!(true));
    assert_eq!(record.metadata["document_id"], json!(doc_id));

    let seen = h.model.seen.lock().unwrap();
    assert!(seen.iter().all(|t| !t.contains("secret123")));
}

#[tokio::test]
async fn test_pii_disabled_keeps_content() {
    let config = PipelineConfig {
        pii_detection_enabled: false,
        ..PipelineConfig::default()
    };
    let h = harness(config);
    let identity = identify(SAMPLE.as_bytes(), "note.txt");
    let doc_id = identity.id.clone();

    let report = h
        .pipeline
        .ingest_text(identity, "note.txt", SAMPLE, Map::new(), None)
        .await
        .unwrap();

    assert!(!report.has_pii);
    let record = h
        .store
        .inner
        .get(&format!("{}_chunk_0", doc_id), "default")
        .unwrap();
    assert_eq!(record.metadata["content"], json!(SAMPLE));
    assert!(record.metadata.get("has_pii").is_none());
}

#[tokio::test]
async fn test_reingest_is_idempotent_and_cached() {
    let h = harness(PipelineConfig::default());
    let text = "Rust makes systems programming approachable.";

    for _ in 0..2 {
        let identity = identify(text.as_bytes(), "rust.txt");
        h.pipeline
            .ingest_text(identity, "rust.txt", text, Map::new(), Some("docs"))
            .await
            .unwrap();
    }

    assert_eq!(h.store.inner.len("docs"), 1);
    assert_eq!(h.model.texts_embedded.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ingest_file_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.md");
    std::fs::write(&path, "# Weekly Notes\n\nRust rocks.\n\nOcean trip planned.").unwrap();

    let h = harness(PipelineConfig::default());
    let report = h.pipeline.ingest_file(&path, "notes.md", None).await.unwrap();

    assert_eq!(report.file_type, DocumentType::Md);
    assert_eq!(report.filename, "notes.md");
    assert_eq!(report.chunk_count, 1);
    assert_eq!(report.vectors_upserted, 1);

    let bytes = std::fs::read(&path).unwrap();
    let doc_id = identify(&bytes, "notes.md").id;
    assert_eq!(report.document_id, doc_id);

    let record = h
        .store
        .inner
        .get(&format!("{}_chunk_0", doc_id), "default")
        .unwrap();
    assert_eq!(record.metadata["file_type"], json!("md"));
    assert_eq!(record.metadata["title"], json!("Weekly Notes"));
    assert_eq!(record.metadata["filename"], json!("notes.md"));
    assert_eq!(record.metadata["chunk_index"], json!(0));
}

#[tokio::test]
async fn test_ingest_file_conversion_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    std::fs::write(&path, b"%PDF-1.4 binary").unwrap();

    let h = harness(PipelineConfig::default());
    let err = h
        .pipeline
        .ingest_file(&path, "scan.pdf", None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Conversion(_)));
    assert!(h.store.batches.lock().unwrap().is_empty());
    assert_eq!(h.model.texts_embedded.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upserts_are_batched() {
    let config = PipelineConfig {
        chunk_size: 10,
        chunk_overlap: 0,
        pii_detection_enabled: false,
        ..PipelineConfig::default()
    };
    let h = harness(config);
    let text = (0..250)
        .map(|i| format!("word{:03}", i))
        .collect::<Vec<_>>()
        .join("\n\n");
    let identity = identify(text.as_bytes(), "words.txt");

    let report = h
        .pipeline
        .ingest_text(identity, "words.txt", &text, Map::new(), None)
        .await
        .unwrap();

    assert_eq!(report.chunk_count, 250);
    assert_eq!(report.vectors_upserted, 250);
    let batches = h.store.batches.lock().unwrap().clone();
    assert_eq!(batches, vec![UPSERT_BATCH_SIZE, UPSERT_BATCH_SIZE, 50]);
}

#[tokio::test]
async fn test_empty_text_yields_no_vectors() {
    let h = harness(PipelineConfig::default());
    let identity = identify(b"   ", "blank.txt");

    let report = h
        .pipeline
        .ingest_text(identity, "blank.txt", "   \n\n  ", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(report.chunk_count, 0);
    assert_eq!(report.vectors_upserted, 0);
    assert!(h.store.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_query_and_delete_document() {
    let h = harness(PipelineConfig::default());
    let rust_text = "Rust is a systems language. Rust compiles fast.";
    let ocean_text = "The ocean is deep and the ocean is blue.";

    let rust_id = identify(rust_text.as_bytes(), "rust.txt");
    let rust_doc = rust_id.id.clone();
    h.pipeline
        .ingest_text(rust_id, "rust.txt", rust_text, Map::new(), None)
        .await
        .unwrap();
    let ocean_id = identify(ocean_text.as_bytes(), "ocean.txt");
    h.pipeline
        .ingest_text(ocean_id, "ocean.txt", ocean_text, Map::new(), None)
        .await
        .unwrap();

    let hits = h.pipeline.query("rust", 2, None, None).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].metadata["document_id"], json!(rust_doc));
    assert!(hits[0].score > hits[1].score);

    let removed = h.pipeline.delete_document(&rust_doc, None).await.unwrap();
    assert_eq!(removed, 1);

    let hits = h.pipeline.query("rust", 2, None, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_ne!(hits[0].metadata["document_id"], json!(rust_doc));
}

#[tokio::test]
async fn test_fetch_and_stats_through_pipeline() {
    let h = harness(PipelineConfig::default());
    let text = "Garden notes.";
    let identity = identify(text.as_bytes(), "garden.txt");
    let chunk_id = format!("{}_chunk_0", identity.id);
    h.pipeline
        .ingest_text(identity, "garden.txt", text, Map::new(), None)
        .await
        .unwrap();
    let other = identify(b"Music notes.", "music.txt");
    h.pipeline
        .ingest_text(other, "music.txt", "Music notes.", Map::new(), Some("archive"))
        .await
        .unwrap();

    let records = h
        .pipeline
        .fetch(&[chunk_id.clone(), "missing".to_string()], None)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, chunk_id);
    assert_eq!(records[0].metadata["content"], json!(text));
    assert!(h.pipeline.fetch(&[chunk_id], Some("archive")).await.unwrap().is_empty());

    let all = h.pipeline.stats(None).await.unwrap();
    assert_eq!(all.dimension, Some(VOCAB.len() + 1));
    assert_eq!(all.total_vector_count, 2);
    assert_eq!(all.namespaces.get("default"), Some(&1));
    assert_eq!(all.namespaces.get("archive"), Some(&1));

    let archive = h.pipeline.stats(Some("archive")).await.unwrap();
    assert_eq!(archive.total_vector_count, 1);
}
