//! Pipeline configuration, read from the environment with defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::PiiCategory;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// Dimension of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;
pub const DEFAULT_EXTRACTION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Connection settings for the optional LLM-based PII extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Base URL of the extraction service.
    pub endpoint: String,
    /// Bearer token sent with every request, if any.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model identifier forwarded to the service.
    pub model: String,
}

/// Options recognized by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Character budget per chunk.
    pub chunk_size: usize,
    /// Characters carried over from one chunk into the next.
    pub chunk_overlap: usize,
    pub embedding_cache_enabled: bool,
    /// Embedding model identifier (informational; the ONNX loader reads `embedding_model_dir`).
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub embedding_batch_size: usize,
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub embedding_model_dir: PathBuf,
    /// When false, PII detection short-circuits to "nothing found".
    pub pii_detection_enabled: bool,
    pub pii_categories: Vec<PiiCategory>,
    /// Present only when an extraction service is configured.
    pub extraction: Option<ExtractionConfig>,
    /// Vector store namespace used when the caller does not pass one.
    pub namespace: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embedding_cache_enabled: true,
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            embedding_dimension: DEFAULT_EMBEDDING_DIM,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            embedding_model_dir: PathBuf::from("models"),
            pii_detection_enabled: true,
            pii_categories: default_pii_categories(),
            extraction: None,
            namespace: DEFAULT_NAMESPACE.into(),
        }
    }
}

/// Categories screened when `PII_CATEGORIES` is unset. Addresses are opt-in.
pub fn default_pii_categories() -> Vec<PiiCategory> {
    vec![
        PiiCategory::Password,
        PiiCategory::ApiKey,
        PiiCategory::CreditCard,
        PiiCategory::Ssn,
        PiiCategory::Email,
        PiiCategory::Phone,
    ]
}

impl PipelineConfig {
    /// Build configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let chunk_size = parse_or(&lookup, "CHUNK_SIZE", defaults.chunk_size);
        let chunk_overlap = parse_or(&lookup, "CHUNK_OVERLAP", defaults.chunk_overlap);
        if chunk_overlap >= chunk_size {
            warn!(
                "CHUNK_OVERLAP ({}) >= CHUNK_SIZE ({}); consecutive chunks will repeat most of their text",
                chunk_overlap, chunk_size
            );
        }

        let pii_categories = match lookup("PII_CATEGORIES") {
            Some(raw) => parse_categories(&raw),
            None => defaults.pii_categories,
        };

        let extraction = lookup("PII_EXTRACTION_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|endpoint| ExtractionConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_key: lookup("GOOGLE_API_KEY").filter(|k| !k.is_empty()),
                model: lookup("LANGEXTRACT_MODEL")
                    .unwrap_or_else(|| DEFAULT_EXTRACTION_MODEL.into()),
            });

        Self {
            chunk_size,
            chunk_overlap,
            embedding_cache_enabled: parse_bool_or(
                &lookup,
                "EMBEDDING_CACHE_ENABLED",
                defaults.embedding_cache_enabled,
            ),
            embedding_model: lookup("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_dimension: parse_or(
                &lookup,
                "EMBEDDING_DIMENSION",
                defaults.embedding_dimension,
            ),
            embedding_batch_size: parse_or(
                &lookup,
                "EMBEDDING_BATCH_SIZE",
                defaults.embedding_batch_size,
            ),
            embedding_model_dir: lookup("EMBEDDING_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.embedding_model_dir),
            pii_detection_enabled: parse_bool_or(
                &lookup,
                "PII_DETECTION_ENABLED",
                defaults.pii_detection_enabled,
            ),
            pii_categories,
            extraction,
            namespace: lookup("VECTOR_NAMESPACE").unwrap_or(defaults.namespace),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            warn!("Ignoring invalid boolean for {}: {:?}", key, v);
            default
        }
        None => default,
    }
}

/// Parse a comma-separated category list, skipping unknown names.
fn parse_categories(raw: &str) -> Vec<PiiCategory> {
    let mut categories = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<PiiCategory>() {
            Ok(c) if !categories.contains(&c) => categories.push(c),
            Ok(_) => {}
            Err(e) => warn!("{}", e),
        }
    }
    categories
}
