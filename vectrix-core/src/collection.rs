//! Collection: dimension enforcement, soft-delete bookkeeping, and the
//! integration seam between a caller and the HNSW index.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::hnsw::{HnswGraphState, HnswIndex};
use crate::types::{CollectionConfig, SearchResult, Vector, VectorId};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Informational summary returned by `Collection::info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub count: usize,
    pub deleted_count: usize,
    pub memory_bytes_estimate: usize,
    pub config: CollectionConfig,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A named collection of vectors backed by one HNSW index. Invariants
/// upheld by this type: every id in `deleted` is a key of `vectors`; every
/// non-deleted id is a node in `index`; all stored elements share
/// `dimension`; `count() = vectors.len() - deleted.len()` and is never
/// negative.
pub struct Collection {
    config: CollectionConfig,
    vectors: HashMap<VectorId, Vector>,
    deleted: HashSet<VectorId>,
    index: Option<HnswIndex>,
    dimension: usize,
    created_at: u64,
    updated_at: u64,
}

impl Collection {
    pub fn new(config: CollectionConfig) -> Self {
        let now = now_millis();
        Self {
            config,
            vectors: HashMap::new(),
            deleted: HashSet::new(),
            index: None,
            dimension: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// `|vectors| - |deleted|`; never negative.
    pub fn count(&self) -> usize {
        self.vectors.len() - self.deleted.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    /// Inserts or updates vectors. The dimension is captured on the first
    /// successful insert and enforced thereafter. A vector whose id already
    /// exists (live or soft-deleted) is treated as an update: elements and
    /// metadata are replaced, and if it was soft-deleted it is restored.
    /// Inputs are copied defensively.
    pub fn insert(&mut self, vectors: &[Vector]) -> Result<()> {
        if vectors.is_empty() {
            return Err(CoreError::InvalidInput("vector list is empty".into()));
        }

        let dim = if self.dimension == 0 {
            vectors[0].elements.len()
        } else {
            self.dimension
        };

        for v in vectors {
            if v.id == 0 {
                return Err(CoreError::InvalidInput("vector id must be nonzero".into()));
            }
            if v.elements.len() != dim {
                return Err(CoreError::DimensionMismatch {
                    expected: dim,
                    actual: v.elements.len(),
                });
            }
        }

        if self.index.is_none() {
            self.dimension = dim;
            self.index = Some(HnswIndex::new(
                self.config.metric,
                self.config.hnsw.clone(),
            ));
        }
        let index = self.index.as_mut().expect("index initialized above");

        for v in vectors {
            let copy = Vector::with_metadata(v.id, v.elements.clone(), v.metadata.clone());

            if let Some(existing) = self.vectors.get_mut(&v.id) {
                *existing = copy.clone();
                if self.deleted.remove(&v.id) {
                    index.insert(v.id, copy.elements, copy.metadata)?;
                } else {
                    // A re-insert of a still-live id replaces its elements
                    // and metadata everywhere they are observable, not just
                    // in the vectors map: the graph node is unlinked and
                    // reinserted so `search` ranks against the new elements.
                    index.replace(v.id, copy.elements, copy.metadata)?;
                }
                continue;
            }

            index.insert(v.id, copy.elements.clone(), copy.metadata.clone())?;
            self.vectors.insert(v.id, copy);
        }

        self.updated_at = now_millis();
        Ok(())
    }

    /// Returns the count of ids actually transitioned from live to
    /// soft-deleted. Unknown ids are skipped, not errors.
    pub fn delete(&mut self, ids: &[VectorId]) -> Result<usize> {
        let Some(index) = self.index.as_mut() else {
            return Ok(0);
        };
        let mut deleted = 0;
        for &id in ids {
            if !self.vectors.contains_key(&id) || self.deleted.contains(&id) {
                continue;
            }
            match index.delete(id) {
                Ok(()) => {
                    self.deleted.insert(id);
                    deleted += 1;
                }
                Err(CoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        if deleted > 0 {
            self.updated_at = now_millis();
        }
        Ok(deleted)
    }

    /// Delegates to the index; post-filters any id present in the
    /// soft-delete set (belt and braces — the index already excludes
    /// soft-deleted nodes from its own results).
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        ef_override: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        if self.dimension != 0 && query.len() != self.dimension {
            return Err(CoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let Some(index) = &self.index else {
            return Ok(Vec::new());
        };
        let results = index.search(query, top_k, ef_override);
        Ok(results
            .into_iter()
            .filter(|r| !self.deleted.contains(&r.id))
            .collect())
    }

    /// Returns a defensive copy, excluding soft-deleted vectors.
    pub fn get(&self, id: VectorId) -> Option<Vector> {
        if self.deleted.contains(&id) {
            return None;
        }
        self.vectors.get(&id).cloned()
    }

    pub fn get_multiple(&self, ids: &[VectorId]) -> Vec<Vector> {
        ids.iter().filter_map(|&id| self.get(id)).collect()
    }

    /// Purges soft-deleted vectors from storage and rebuilds the index from
    /// the surviving vectors. Atomic from the caller's point of view: the
    /// rebuild happens against a freshly built index before it replaces the
    /// old one.
    pub fn compact(
        &mut self,
        cancellation: Option<&tokio_util::sync::CancellationToken>,
    ) -> Result<()> {
        if self.deleted.is_empty() {
            return Ok(());
        }
        for id in self.deleted.drain().collect::<Vec<_>>() {
            self.vectors.remove(&id);
        }

        let mut rebuilt = HnswIndex::new(self.config.metric, self.config.hnsw.clone());
        let surviving: Vec<(VectorId, Vec<f32>, crate::Value)> = self
            .vectors
            .values()
            .map(|v| (v.id, v.elements.clone(), v.metadata.clone()))
            .collect();
        rebuilt.build(&surviving, cancellation)?;
        self.index = Some(rebuilt);
        self.updated_at = now_millis();
        Ok(())
    }

    pub fn info(&self) -> CollectionInfo {
        let memory_bytes_estimate = self
            .index
            .as_ref()
            .map(|i| i.stats().memory_bytes_estimate)
            .unwrap_or(0);
        CollectionInfo {
            name: self.config.name.clone(),
            dimension: self.dimension,
            count: self.count(),
            deleted_count: self.deleted_count(),
            memory_bytes_estimate,
            config: self.config.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Releases owned resources (drops the index and vector storage).
    pub fn close(&mut self) {
        self.index = None;
        self.vectors.clear();
        self.deleted.clear();
    }

    /// Full structural dump used by snapshot capture: config, all live
    /// vectors, and the exported HNSW graph state.
    pub fn export_live_vectors(&self) -> Vec<Vector> {
        self.vectors
            .values()
            .filter(|v| !self.deleted.contains(&v.id))
            .cloned()
            .collect()
    }

    pub fn export_graph_state(&self) -> Option<HnswGraphState> {
        self.index.as_ref().map(|i| i.export_state())
    }

    /// Rebuilds a collection directly from a snapshot: live vectors plus an
    /// already-exported graph state, imported verbatim (no re-insertion).
    pub fn restore(
        config: CollectionConfig,
        vectors: Vec<Vector>,
        graph_state: HnswGraphState,
        created_at: u64,
        updated_at: u64,
    ) -> Result<Self> {
        let dimension = vectors.first().map(|v| v.elements.len()).unwrap_or(0);
        let mut index = HnswIndex::new(config.metric, config.hnsw.clone());
        index.import_state(graph_state)?;

        let vectors = vectors.into_iter().map(|v| (v.id, v)).collect();
        Ok(Self {
            config,
            vectors,
            deleted: HashSet::new(),
            index: Some(index),
            dimension,
            created_at,
            updated_at,
        })
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }
}
