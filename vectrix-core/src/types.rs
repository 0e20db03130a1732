//! Core data types: vector identifiers, metrics, configuration and results.

use serde::{Deserialize, Serialize};

/// Unique identifier for a vector. Must be nonzero; validated at the
/// collection boundary.
pub type VectorId = u64;

/// Distance metric used by a collection's HNSW index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    L2,
    Cosine,
    InnerProduct,
}

impl Metric {
    /// Computes the distance between two equal-length slices under this
    /// metric. "Smaller is better" holds uniformly across all three variants.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => crate::distance::l2(a, b),
            Metric::Cosine => crate::distance::cosine_distance(a, b),
            Metric::InnerProduct => crate::distance::neg_inner_product(a, b),
        }
    }
}

/// HNSW build/search parameters for a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswParams {
    /// Per-layer neighbor cap above layer 0 (doubled at layer 0).
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub max_layers: usize,
    pub seed: i64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
            max_layers: 16,
            seed: 0,
        }
    }
}

/// Configuration of a collection: its name, distance metric and HNSW parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub metric: Metric,
    pub hnsw: HnswParams,
}

/// A vector as presented across the public API: identity, elements and
/// free-form metadata. `elements` is immutable once inserted; re-inserting an
/// id replaces both elements and metadata (see `Collection::insert`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vector {
    pub id: VectorId,
    pub elements: Vec<f32>,
    #[serde(default)]
    pub metadata: crate::Value,
}

impl Vector {
    pub fn new(id: VectorId, elements: Vec<f32>) -> Self {
        Self {
            id,
            elements,
            metadata: crate::Value::Null,
        }
    }

    pub fn with_metadata(id: VectorId, elements: Vec<f32>, metadata: crate::Value) -> Self {
        Self {
            id,
            elements,
            metadata,
        }
    }
}

/// A single search hit: id and ascending distance. Ordering considers only
/// `(distance, id)` so results sort deterministically with stable
/// tie-breaking on id, per spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: VectorId,
    pub distance: f32,
}

impl SearchResult {
    pub fn new(id: VectorId, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.distance == other.distance
    }
}
impl Eq for SearchResult {}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}
