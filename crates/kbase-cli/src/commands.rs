//! Subcommand implementations. Each prints JSON to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde_json::{json, Map};
use tracing::info;

use kbase_core::PipelineConfig;
use kbase_infer::EmbeddingService;
use kbase_ingest::{identify, Chunker, ConversionOutput, DocumentConverter, PlainTextConverter};
use kbase_protocol::PiiEngine;
use kbase_runtime::IngestionPipeline;
use kbase_store::MemoryVectorStore;

/// Matches printed by `search`.
pub const SEARCH_TOP_K: usize = 5;

/// Positional file arguments. At least one is required.
pub fn file_args(args: &[String], command: &str) -> anyhow::Result<Vec<PathBuf>> {
    if args.is_empty() {
        bail!("Usage: kbase {} <file>...", command);
    }
    Ok(args.iter().map(PathBuf::from).collect())
}

/// `search <text> <file>...`: the query text comes first.
pub fn search_args(args: &[String]) -> anyhow::Result<(String, Vec<PathBuf>)> {
    let Some((query, files)) = args.split_first() else {
        bail!("Usage: kbase search <text> <file>...");
    };
    Ok((query.clone(), file_args(files, "search <text>")?))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn convert(path: &Path) -> anyhow::Result<ConversionOutput> {
    let output = PlainTextConverter::new().convert(path).await?;
    if !output.is_success() {
        bail!("could not convert {}", path.display());
    }
    Ok(output)
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn identify_file(path: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let identity = identify(&bytes, &file_name(path));
    print_json(&serde_json::to_value(identity)?)
}

pub async fn chunk_file(path: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let identity = identify(&bytes, &file_name(path));
    let output = convert(path).await?;

    let mut metadata = Map::new();
    metadata.insert("filename".into(), json!(file_name(path)));
    let chunks = Chunker::new(config.chunk_size, config.chunk_overlap).chunk(
        &output.normalized_text,
        &identity.id,
        &metadata,
    );
    print_json(&serde_json::to_value(chunks)?)
}

pub async fn redact_file(path: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    let output = convert(path).await?;
    // Redaction is always on here, whatever PII_DETECTION_ENABLED says.
    let mut config = config.clone();
    config.pii_detection_enabled = true;
    let engine = PiiEngine::from_config(&config)?;

    let (redacted, result) = engine
        .redact(&output.normalized_text, &config.pii_categories)
        .await;
    print_json(&json!({
        "redacted": redacted,
        "has_pii": result.has_pii,
        "categories_found": result.categories_found,
        "detections": result.detections.len(),
    }))
}

/// Ingest `files` into a fresh in-memory store, then optionally search it.
pub async fn ingest_files(
    files: &[PathBuf],
    query: Option<&str>,
    config: PipelineConfig,
) -> anyhow::Result<()> {
    let model = kbase_infer::load_model(&config)
        .map_err(|e| anyhow!("Failed to load embedding model: {}", e))?;
    let embeddings = Arc::new(EmbeddingService::new(model, config.embedding_cache_enabled));
    let pii = Arc::new(PiiEngine::from_config(&config)?);
    let store = Arc::new(MemoryVectorStore::with_dimension(config.embedding_dimension));
    let pipeline = IngestionPipeline::new(
        config,
        Arc::new(PlainTextConverter::new()),
        pii,
        embeddings,
        store,
    );

    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let report = pipeline
            .ingest_file(path, &file_name(path), None)
            .await
            .with_context(|| format!("ingesting {}", path.display()))?;
        reports.push(report);
    }
    info!("Ingested {} file(s)", reports.len());

    let mut out = json!({ "reports": reports });
    if let Some(query) = query {
        let matches = pipeline.query(query, SEARCH_TOP_K, None, None).await?;
        out["matches"] = serde_json::to_value(matches)?;
    }
    out["stats"] = serde_json::to_value(pipeline.stats(None).await?)?;
    print_json(&out)
}
