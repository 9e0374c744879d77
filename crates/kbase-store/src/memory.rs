//! In-process vector store. Namespaces are independent maps of id → record.

use std::collections::HashMap;

use async_trait::async_trait;
use ndarray::ArrayView1;
use parking_lot::RwLock;
use tracing::debug;

use kbase_core::{Error, Result};

use crate::types::{
    DeleteSelector, MetadataFilter, StoreStats, VectorMatch, VectorRecord, VectorStore,
};

#[derive(Default)]
pub struct MemoryVectorStore {
    namespaces: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
    dimension: Option<usize>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject records whose vector length differs from `dimension`.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            dimension: Some(dimension),
        }
    }

    /// Number of records in a namespace.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .get(namespace)
            .map(|ns| ns.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    /// Fetch a record by id.
    pub fn get(&self, id: &str, namespace: &str) -> Option<VectorRecord> {
        self.namespaces
            .read()
            .get(namespace)
            .and_then(|ns| ns.get(id))
            .cloned()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>, namespace: &str) -> Result<usize> {
        for record in &records {
            if record.values.is_empty() {
                return Err(Error::Store(format!("record {} has no values", record.id)));
            }
            if let Some(dim) = self.dimension {
                if record.values.len() != dim {
                    return Err(Error::Store(format!(
                        "record {} has dimension {}, expected {}",
                        record.id,
                        record.values.len(),
                        dim
                    )));
                }
            }
        }

        let count = records.len();
        let mut namespaces = self.namespaces.write();
        let ns = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            ns.insert(record.id.clone(), record);
        }
        debug!("Upserted {} vectors into namespace '{}'", count, namespace);
        Ok(count)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorMatch>> {
        let q = ArrayView1::from(vector);
        let q_norm = q.dot(&q).sqrt();
        if top_k == 0 || q_norm < 1e-9 {
            return Ok(Vec::new());
        }

        let namespaces = self.namespaces.read();
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(&VectorRecord, f32)> = ns
            .values()
            .filter(|r| r.values.len() == vector.len())
            .filter(|r| filter.map_or(true, |f| r.matches(f)))
            .filter_map(|r| {
                let v = ArrayView1::from(&r.values[..]);
                let v_norm = v.dot(&v).sqrt();
                if v_norm < 1e-9 {
                    return None;
                }
                Some((r, q.dot(&v) / (q_norm * v_norm)))
            })
            .collect();

        // Ties broken by id so results are stable across runs.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(r, score)| VectorMatch {
                id: r.id.clone(),
                score,
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn delete(&self, selector: DeleteSelector, namespace: &str) -> Result<usize> {
        let mut namespaces = self.namespaces.write();
        let Some(ns) = namespaces.get_mut(namespace) else {
            return Ok(0);
        };

        let before = ns.len();
        match selector {
            DeleteSelector::Ids(ids) => {
                for id in &ids {
                    ns.remove(id);
                }
            }
            DeleteSelector::Filter(filter) => ns.retain(|_, r| !r.matches(&filter)),
            DeleteSelector::All => ns.clear(),
        }
        let removed = before - ns.len();
        debug!("Deleted {} vectors from namespace '{}'", removed, namespace);
        Ok(removed)
    }

    async fn fetch(&self, ids: &[String], namespace: &str) -> Result<Vec<VectorRecord>> {
        let namespaces = self.namespaces.read();
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| ns.get(id)).cloned().collect())
    }

    async fn stats(&self, namespace: Option<&str>) -> Result<StoreStats> {
        let namespaces = self.namespaces.read();
        let mut stats = StoreStats {
            dimension: self.dimension,
            ..StoreStats::default()
        };

        for (name, ns) in namespaces.iter() {
            if namespace.map_or(false, |wanted| wanted != name) {
                continue;
            }
            if stats.dimension.is_none() {
                stats.dimension = ns.values().next().map(|r| r.values.len());
            }
            stats.total_vector_count += ns.len();
            stats.namespaces.insert(name.clone(), ns.len());
        }
        Ok(stats)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
