//! Vector records, matches, and the store trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kbase_core::Result;

/// Equality filter over record metadata: every key must be present with an equal value.
pub type MetadataFilter = Map<String, Value>;

/// An embedding plus its payload, keyed by chunk id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    /// True when every filter entry matches this record's metadata.
    pub fn matches(&self, filter: &MetadataFilter) -> bool {
        filter
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }
}

/// A query hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Which records a delete applies to.
#[derive(Debug, Clone)]
pub enum DeleteSelector {
    Ids(Vec<String>),
    Filter(MetadataFilter),
    All,
}

/// Record counts for a store or a single namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Configured dimension, else the length of any stored vector.
    pub dimension: Option<usize>,
    pub total_vector_count: usize,
    /// Namespace → record count.
    pub namespaces: BTreeMap<String, usize>,
}

/// Vector database seam.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id. Returns the number written.
    async fn upsert(&self, records: Vec<VectorRecord>, namespace: &str) -> Result<usize>;

    /// Top-k records by cosine similarity, optionally filtered by metadata.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>>;

    /// Delete matching records. Returns the number removed.
    async fn delete(&self, selector: DeleteSelector, namespace: &str) -> Result<usize>;

    /// Records for `ids` in request order. Unknown ids are skipped.
    async fn fetch(&self, ids: &[String], namespace: &str) -> Result<Vec<VectorRecord>>;

    /// Counts for one namespace, or for every namespace when `None`.
    async fn stats(&self, namespace: Option<&str>) -> Result<StoreStats>;

    /// Store name for logging.
    fn name(&self) -> &str;
}
