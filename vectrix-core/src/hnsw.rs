//! HNSW (Hierarchical Navigable Small World) index implementation.
//!
//! The graph is backed by a single contiguous arena (`Vec<ArenaNode>`) keyed
//! by dense `u32` indices, with a `VectorId -> NodeIndex` map for the stable
//! lookup. This avoids the pointer cycles a naive adjacency-list-of-ids graph
//! would otherwise tempt (a node can always reach its neighbors through the
//! arena, never through a shared owned reference), and makes `export_state`
//! a flat, allocation-light walk.
//!
//! Deletion is soft: a deleted node stays in the arena (so ids already
//! handed out never get reused by a later `insert`) but is excluded from
//! search results and from further graph traversal.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};
use crate::types::{HnswParams, Metric, SearchResult, VectorId};

/// Dense index into the arena. Stable for the lifetime of the index (nodes
/// are never moved or removed, only marked deleted).
type NodeIndex = u32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArenaNode {
    id: VectorId,
    elements: Vec<f32>,
    metadata: crate::Value,
    deleted: bool,
    /// `connections[layer]` is this node's neighbor set at that layer; the
    /// node exists at layers `0..connections.len()`.
    connections: Vec<Vec<NodeIndex>>,
}

/// A structural dump of the graph, sufficient to reproduce it exactly via
/// `import_state`. Neighbor lists and the entry point are expressed by
/// `VectorId` rather than raw arena index, so the export is independent of
/// this process's arena layout and safe to persist across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswGraphState {
    pub metric: Metric,
    pub params: HnswParams,
    pub ef_search: usize,
    pub nodes: Vec<ExportedNode>,
    pub entry: Option<VectorId>,
    pub max_layer: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedNode {
    pub id: VectorId,
    pub elements: Vec<f32>,
    pub metadata: crate::Value,
    pub deleted: bool,
    pub connections: Vec<Vec<VectorId>>,
}

/// Summary statistics for introspection/monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswStats {
    pub nodes: usize,
    pub layers: usize,
    pub total_connections: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub memory_bytes_estimate: usize,
}

/// Orders by `(distance, arena index)` so heaps comparing `Scored` values tie
/// break deterministically and never hit a NaN-induced panic.
#[derive(Debug, Clone, Copy)]
struct Scored(f32, NodeIndex);

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}
impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.1.cmp(&other.1))
    }
}

/// Hierarchical navigable small-world index over `f32` vectors.
pub struct HnswIndex {
    metric: Metric,
    params: HnswParams,
    ef_search: usize,
    rng: ChaCha8Rng,
    nodes: Vec<ArenaNode>,
    id_to_index: HashMap<VectorId, NodeIndex>,
    entry: Option<NodeIndex>,
    max_layer: i32,
}

impl HnswIndex {
    pub fn new(metric: Metric, params: HnswParams) -> Self {
        let seed = params.seed as u64;
        let ef_search = params.ef_search;
        Self {
            metric,
            params,
            ef_search,
            rng: ChaCha8Rng::seed_from_u64(seed),
            nodes: Vec::new(),
            id_to_index: HashMap::new(),
            entry: None,
            max_layer: -1,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| !n.deleted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards existing state and inserts all vectors in order. Deterministic
    /// given `seed` and input order.
    pub fn build(
        &mut self,
        vectors: &[(VectorId, Vec<f32>, crate::Value)],
        cancellation: Option<&CancellationToken>,
    ) -> Result<()> {
        self.nodes.clear();
        self.id_to_index.clear();
        self.entry = None;
        self.max_layer = -1;
        self.rng = ChaCha8Rng::seed_from_u64(self.params.seed as u64);
        for (id, elements, metadata) in vectors {
            if cancellation.is_some_and(|t| t.is_cancelled()) {
                return Err(CoreError::Cancelled);
            }
            self.insert(*id, elements.clone(), metadata.clone())?;
        }
        Ok(())
    }

    /// Inserts a new vector. Fails with `AlreadyExists` if `id` is already
    /// present, even if soft-deleted (re-insert of a deleted id requires a
    /// `compact` first, or a new id).
    pub fn insert(
        &mut self,
        id: VectorId,
        elements: Vec<f32>,
        metadata: crate::Value,
    ) -> Result<()> {
        if self.id_to_index.contains_key(&id) {
            return Err(CoreError::duplicate_id(id));
        }

        let level = self.select_layer();
        let node_idx = self.nodes.len() as NodeIndex;
        self.nodes.push(ArenaNode {
            id,
            elements: elements.clone(),
            metadata,
            deleted: false,
            connections: vec![Vec::new(); level + 1],
        });
        self.id_to_index.insert(id, node_idx);

        let Some(entry_idx) = self.entry else {
            self.entry = Some(node_idx);
            self.max_layer = level as i32;
            return Ok(());
        };

        let mut current_nearest = vec![entry_idx];
        for layer in ((level as i32 + 1)..=self.max_layer).rev() {
            let found = self.search_layer(&elements, &current_nearest, 1, layer as usize);
            if !found.is_empty() {
                current_nearest = found.into_iter().map(|(_, i)| i).collect();
            }
        }

        let top_linking_layer = level.min(self.max_layer.max(0) as usize);
        for layer in (0..=top_linking_layer).rev() {
            let ef = self.params.ef_construction.max(1);
            let candidates = self.search_layer(&elements, &current_nearest, ef, layer);
            let cand_ids: Vec<NodeIndex> = candidates.iter().map(|&(_, i)| i).collect();

            let cap = if layer == 0 {
                self.params.m * 2
            } else {
                self.params.m
            };
            let neighbors: Vec<NodeIndex> = cand_ids.iter().take(cap).copied().collect();

            self.nodes[node_idx as usize].connections[layer] = neighbors.clone();
            for &nb in &neighbors {
                let nb_conns = &mut self.nodes[nb as usize].connections[layer];
                if !nb_conns.contains(&node_idx) {
                    nb_conns.push(node_idx);
                }
                if self.nodes[nb as usize].connections[layer].len() > cap {
                    self.prune_neighbors(nb, layer, cap);
                }
            }

            if !cand_ids.is_empty() {
                current_nearest = cand_ids;
            }
        }

        if level as i32 > self.max_layer {
            self.max_layer = level as i32;
            self.entry = Some(node_idx);
        }

        Ok(())
    }

    /// Keeps the `cap` closest neighbors (by distance from `node`'s own
    /// vector) at `layer`, dropping the rest.
    fn prune_neighbors(&mut self, node: NodeIndex, layer: usize, cap: usize) {
        let anchor = self.nodes[node as usize].elements.clone();
        let mut conns = self.nodes[node as usize].connections[layer].clone();
        conns.sort_by(|&a, &b| {
            let da = self.metric.distance(&anchor, &self.nodes[a as usize].elements);
            let db = self.metric.distance(&anchor, &self.nodes[b as usize].elements);
            da.partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(&b))
        });
        conns.truncate(cap);
        self.nodes[node as usize].connections[layer] = conns;
    }

    /// Marks `id` as deleted. Idempotent if already deleted; fails with
    /// `NotFound` if the id was never inserted. Reselects the entry point if
    /// it was the one deleted.
    pub fn delete(&mut self, id: VectorId) -> Result<()> {
        let idx = *self
            .id_to_index
            .get(&id)
            .ok_or_else(|| CoreError::vector_not_found(id))?;

        if self.nodes[idx as usize].deleted {
            return Ok(());
        }
        self.nodes[idx as usize].deleted = true;

        if self.entry == Some(idx) {
            self.reselect_entry();
        }
        Ok(())
    }

    /// Replaces a live node's elements/metadata in place. Unlike `insert`,
    /// this is for a caller-visible id-stable update (Collection re-insert
    /// of a still-live id), not the soft-delete state machine's `Live ->
    /// SoftDeleted -> Absent` transitions — so it is not subject to
    /// `insert`'s `AlreadyExists` guard. The old arena node is unlinked
    /// from every neighbor and tombstoned, then a fresh node is inserted
    /// under the same id so its graph position reflects the new elements.
    /// Fails with `NotFound` if `id` is absent or already soft-deleted.
    pub fn replace(&mut self, id: VectorId, elements: Vec<f32>, metadata: crate::Value) -> Result<()> {
        let idx = *self
            .id_to_index
            .get(&id)
            .ok_or_else(|| CoreError::vector_not_found(id))?;
        if self.nodes[idx as usize].deleted {
            return Err(CoreError::vector_not_found(id));
        }

        self.unlink(idx);
        self.nodes[idx as usize].deleted = true;
        self.id_to_index.remove(&id);
        if self.entry == Some(idx) {
            self.reselect_entry();
        }

        self.insert(id, elements, metadata)
    }

    /// Removes `idx` from every neighbor's connection list at every layer
    /// it participates in. Leaves `idx`'s own connection lists untouched
    /// (harmless once `idx` is tombstoned and dropped from `id_to_index`,
    /// since nothing can reach it to follow them).
    fn unlink(&mut self, idx: NodeIndex) {
        let num_layers = self.nodes[idx as usize].connections.len();
        for layer in 0..num_layers {
            let neighbors = self.nodes[idx as usize].connections[layer].clone();
            for nb in neighbors {
                self.nodes[nb as usize].connections[layer].retain(|&x| x != idx);
            }
        }
    }

    /// Linear scan for the non-deleted node with the highest layer; ties
    /// broken by smallest id. Empties the graph if nothing survives.
    fn reselect_entry(&mut self) {
        let mut best: Option<(i32, NodeIndex, VectorId)> = None;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.deleted {
                continue;
            }
            let layer = node.connections.len() as i32 - 1;
            let candidate = (layer, i as NodeIndex, node.id);
            best = Some(match best {
                Some(b) if b.0 > layer || (b.0 == layer && b.2 < node.id) => b,
                _ => candidate,
            });
        }
        match best {
            Some((layer, idx, _)) => {
                self.entry = Some(idx);
                self.max_layer = layer;
            }
            None => {
                self.entry = None;
                self.max_layer = -1;
            }
        }
    }

    /// Returns up to `top_k` non-deleted results ordered by ascending
    /// distance, with stable tie-break on id. Empty graph returns empty.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        ef_override: Option<usize>,
    ) -> Vec<SearchResult> {
        let Some(entry_idx) = self.entry else {
            return Vec::new();
        };

        let mut current = vec![entry_idx];
        for layer in (1..=self.max_layer).rev() {
            let found = self.search_layer(query, &current, 1, layer as usize);
            if !found.is_empty() {
                current = found.into_iter().map(|(_, i)| i).collect();
            }
        }

        // Per spec: `ef = max(default_ef_search, ef_override)` — an
        // override narrower than the default never shrinks the beam below it.
        let ef = ef_override
            .map_or(self.ef_search, |o| o.max(self.ef_search))
            .max(top_k)
            .max(1);
        let results = self.search_layer(query, &current, ef, 0);

        results
            .into_iter()
            .take(top_k)
            .map(|(dist, idx)| SearchResult::new(self.nodes[idx as usize].id, dist))
            .collect()
    }

    /// Returns the live (non-deleted) vector's elements and metadata, if present.
    pub fn get(&self, id: VectorId) -> Option<(&[f32], &crate::Value)> {
        let idx = *self.id_to_index.get(&id)?;
        let node = &self.nodes[idx as usize];
        if node.deleted {
            None
        } else {
            Some((&node.elements, &node.metadata))
        }
    }

    /// Atomically updates the default query-time beam width.
    pub fn set_ef_search(&mut self, n: usize) {
        self.ef_search = n.max(1);
    }

    pub fn stats(&self) -> HnswStats {
        let live: Vec<&ArenaNode> = self.nodes.iter().filter(|n| !n.deleted).collect();
        let total_connections: usize = live
            .iter()
            .map(|n| n.connections.iter().map(Vec::len).sum::<usize>())
            .sum();
        let max_degree = live
            .iter()
            .map(|n| n.connections.iter().map(Vec::len).max().unwrap_or(0))
            .max()
            .unwrap_or(0);
        let avg_degree = if live.is_empty() {
            0.0
        } else {
            total_connections as f64 / live.len() as f64
        };
        let dim = live.first().map(|n| n.elements.len()).unwrap_or(0);
        let memory_bytes_estimate = self.nodes.len()
            * (std::mem::size_of::<VectorId>() + dim * std::mem::size_of::<f32>())
            + total_connections * std::mem::size_of::<NodeIndex>();

        HnswStats {
            nodes: live.len(),
            layers: (self.max_layer + 1).max(0) as usize,
            total_connections,
            avg_degree,
            max_degree,
            memory_bytes_estimate,
        }
    }

    /// Deep structural dump sufficient to reproduce the exact graph.
    pub fn export_state(&self) -> HnswGraphState {
        let nodes = self
            .nodes
            .iter()
            .map(|n| ExportedNode {
                id: n.id,
                elements: n.elements.clone(),
                metadata: n.metadata.clone(),
                deleted: n.deleted,
                connections: n
                    .connections
                    .iter()
                    .map(|layer| layer.iter().map(|&idx| self.nodes[idx as usize].id).collect())
                    .collect(),
            })
            .collect();

        HnswGraphState {
            metric: self.metric,
            params: self.params.clone(),
            ef_search: self.ef_search,
            nodes,
            entry: self.entry.map(|idx| self.nodes[idx as usize].id),
            max_layer: self.max_layer,
        }
    }

    /// Restores a graph from a structural dump. Fails (fatally, for this
    /// index) if the dump references an unknown neighbor/entry id or a layer
    /// inconsistent with `max_layer`.
    pub fn import_state(&mut self, state: HnswGraphState) -> Result<()> {
        let mut id_to_index = HashMap::with_capacity(state.nodes.len());
        for (i, n) in state.nodes.iter().enumerate() {
            if id_to_index.insert(n.id, i as NodeIndex).is_some() {
                return Err(CoreError::IndexOperationFailed(format!(
                    "duplicate id {} in imported graph state",
                    n.id
                )));
            }
            let node_top_layer = n.connections.len() as i32 - 1;
            if node_top_layer > state.max_layer {
                return Err(CoreError::IndexOperationFailed(format!(
                    "node {} has layer {node_top_layer} exceeding graph max_layer {}",
                    n.id, state.max_layer
                )));
            }
        }

        let mut nodes = Vec::with_capacity(state.nodes.len());
        for n in &state.nodes {
            let mut connections = Vec::with_capacity(n.connections.len());
            for layer in &n.connections {
                let mut resolved = Vec::with_capacity(layer.len());
                for nb_id in layer {
                    let &nb_idx = id_to_index.get(nb_id).ok_or_else(|| {
                        CoreError::IndexOperationFailed(format!(
                            "unknown neighbor id {nb_id} in imported graph state"
                        ))
                    })?;
                    resolved.push(nb_idx);
                }
                connections.push(resolved);
            }
            nodes.push(ArenaNode {
                id: n.id,
                elements: n.elements.clone(),
                metadata: n.metadata.clone(),
                deleted: n.deleted,
                connections,
            });
        }

        let entry = match state.entry {
            Some(id) => Some(*id_to_index.get(&id).ok_or_else(|| {
                CoreError::IndexOperationFailed(format!(
                    "entry point id {id} not present in imported graph state"
                ))
            })?),
            None => None,
        };

        self.metric = state.metric;
        self.params = state.params;
        self.ef_search = state.ef_search.max(1);
        self.rng = ChaCha8Rng::seed_from_u64(self.params.seed as u64);
        self.nodes = nodes;
        self.id_to_index = id_to_index;
        self.entry = entry;
        self.max_layer = state.max_layer;
        Ok(())
    }

    /// Best-first traversal over a single layer. Returns up to `num_closest`
    /// `(distance, arena index)` pairs ascending by distance.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[NodeIndex],
        num_closest: usize,
        layer: usize,
    ) -> Vec<(f32, NodeIndex)> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut candidates: BinaryHeap<Reverse<Scored>> = BinaryHeap::new();
        let mut results: BinaryHeap<Scored> = BinaryHeap::new();

        for &ep in entry_points {
            if !visited.insert(ep) {
                continue;
            }
            let node = &self.nodes[ep as usize];
            if node.deleted {
                continue;
            }
            let d = self.metric.distance(query, &node.elements);
            candidates.push(Reverse(Scored(d, ep)));
            results.push(Scored(d, ep));
        }

        while let Some(Reverse(Scored(cur_dist, cur_idx))) = candidates.pop() {
            if let Some(farthest) = results.peek() {
                if results.len() >= num_closest && cur_dist > farthest.0 {
                    break;
                }
            }

            let neighbors = match self.nodes[cur_idx as usize].connections.get(layer) {
                Some(layer_conns) => layer_conns.clone(),
                None => continue,
            };

            for nb in neighbors {
                if !visited.insert(nb) {
                    continue;
                }
                let nb_node = &self.nodes[nb as usize];
                if nb_node.deleted {
                    continue;
                }
                let d = self.metric.distance(query, &nb_node.elements);
                let should_add = results.len() < num_closest
                    || results.peek().map(|s| d < s.0).unwrap_or(true);
                if should_add {
                    candidates.push(Reverse(Scored(d, nb)));
                    results.push(Scored(d, nb));
                    if results.len() > num_closest {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<(f32, NodeIndex)> = results.into_iter().map(|s| (s.0, s.1)).collect();
        out.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        out
    }

    /// `floor(-ln(U) / ln(2))`, clamped to `max_layers - 1`, `U` drawn from
    /// the seeded PRNG.
    fn select_layer(&mut self) -> usize {
        let u: f64 = self.rng.random_range(f64::MIN_POSITIVE..1.0);
        let level = (-u.ln() / std::f64::consts::LN_2).floor();
        let cap = (self.params.max_layers.max(1) - 1) as f64;
        level.clamp(0.0, cap) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: i64) -> HnswParams {
        HnswParams {
            m: 8,
            ef_construction: 100,
            ef_search: 50,
            max_layers: 16,
            seed,
        }
    }

    #[test]
    fn insert_and_search_finds_self() {
        let mut index = HnswIndex::new(Metric::L2, params(42));
        index
            .insert(1, vec![1.0, 2.0, 3.0], crate::Value::Null)
            .unwrap();
        index
            .insert(2, vec![4.0, 5.0, 6.0], crate::Value::Null)
            .unwrap();

        let results = index.search(&[1.0, 2.0, 3.0], 1, None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        assert!(results[0].distance < 1e-4);
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut index = HnswIndex::new(Metric::L2, params(1));
        index
            .insert(1, vec![1.0, 0.0], crate::Value::Null)
            .unwrap();
        let err = index
            .insert(1, vec![0.0, 1.0], crate::Value::Null)
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists(_)));
    }

    #[test]
    fn delete_is_idempotent_and_unknown_id_errors() {
        let mut index = HnswIndex::new(Metric::L2, params(1));
        index
            .insert(1, vec![1.0, 0.0], crate::Value::Null)
            .unwrap();
        index.delete(1).unwrap();
        index.delete(1).unwrap();
        assert!(matches!(
            index.delete(2).unwrap_err(),
            CoreError::NotFound(_)
        ));
    }

    #[test]
    fn reinsert_after_delete_is_duplicate_not_undelete() {
        let mut index = HnswIndex::new(Metric::L2, params(1));
        index
            .insert(1, vec![1.0, 0.0, 0.0], crate::Value::Null)
            .unwrap();
        index.delete(1).unwrap();
        let err = index
            .insert(1, vec![0.0, 1.0, 0.0], crate::Value::Null)
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists(_)));
    }

    #[test]
    fn deleted_vectors_are_excluded_from_search() {
        let mut index = HnswIndex::new(Metric::Cosine, params(7));
        index
            .insert(1, vec![1.0, 0.0, 0.0], crate::Value::Null)
            .unwrap();
        for (i, v) in [
            [0.9, 0.1, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.5, 0.5, 0.0],
        ]
        .into_iter()
        .enumerate()
        {
            index
                .insert(10 + i as u64, v.to_vec(), crate::Value::Null)
                .unwrap();
        }

        index.delete(1).unwrap();
        let results = index.search(&[1.0, 0.0, 0.0], 10, None);
        assert!(!results.iter().any(|r| r.id == 1));
    }

    #[test]
    fn insert_above_current_max_layer_does_not_panic() {
        // A high-M, low-max_layers configuration with many insertions makes
        // it likely some node samples a layer above the graph's current
        // max_layer, exercising the linking loop's upper bound.
        let mut index = HnswIndex::new(
            Metric::L2,
            HnswParams {
                m: 4,
                ef_construction: 20,
                ef_search: 10,
                max_layers: 12,
                seed: 3,
            },
        );
        for i in 1..=200u64 {
            index
                .insert(i, vec![i as f32, (i * 3 % 97) as f32], crate::Value::Null)
                .unwrap();
        }
        let results = index.search(&[50.0, 10.0], 5, None);
        assert!(!results.is_empty());
    }

    #[test]
    fn build_with_pre_cancelled_token_leaves_index_empty() {
        let mut index = HnswIndex::new(Metric::L2, params(5));
        let vectors = vec![
            (1u64, vec![0.0, 0.0], crate::Value::Null),
            (2u64, vec![1.0, 1.0], crate::Value::Null),
        ];
        let token = CancellationToken::new();
        token.cancel();
        let err = index.build(&vectors, Some(&token)).unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
        assert!(index.get(1).is_none());
    }

    #[test]
    fn replace_updates_elements_and_search_ranking() {
        let mut index = HnswIndex::new(Metric::L2, params(5));
        index
            .insert(1, vec![0.0, 0.0], crate::Value::Null)
            .unwrap();
        index
            .insert(2, vec![10.0, 10.0], crate::Value::Null)
            .unwrap();

        index
            .replace(1, vec![20.0, 20.0], crate::Value::Null)
            .unwrap();

        assert_eq!(index.get(1).unwrap().0, &[20.0, 20.0]);
        let results = index.search(&[10.0, 10.0], 1, None);
        assert_eq!(results[0].id, 2);
    }

    #[test]
    fn replace_unknown_or_deleted_id_fails() {
        let mut index = HnswIndex::new(Metric::L2, params(5));
        assert!(matches!(
            index.replace(1, vec![0.0], crate::Value::Null).unwrap_err(),
            CoreError::NotFound(_)
        ));

        index.insert(1, vec![0.0], crate::Value::Null).unwrap();
        index.delete(1).unwrap();
        assert!(matches!(
            index.replace(1, vec![1.0], crate::Value::Null).unwrap_err(),
            CoreError::NotFound(_)
        ));
    }

    #[test]
    fn search_determinism_matches_spec_scenario() {
        let mut index = HnswIndex::new(
            Metric::L2,
            HnswParams {
                m: 8,
                ef_construction: 100,
                ef_search: 50,
                max_layers: 16,
                seed: 12345,
            },
        );
        for i in 1..=5u64 {
            index
                .insert(
                    i,
                    vec![i as f32, (i + 1) as f32, (i + 2) as f32],
                    crate::Value::Null,
                )
                .unwrap();
        }

        let results = index.search(&[50.0, 51.0, 52.0], 10, None);
        let ids: Vec<VectorId> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn export_import_round_trip_preserves_search() {
        let mut index = HnswIndex::new(Metric::L2, params(99));
        for i in 1..=20u64 {
            index
                .insert(i, vec![i as f32, (i * 2) as f32], crate::Value::Null)
                .unwrap();
        }
        index.delete(5).unwrap();

        let state = index.export_state();
        let mut restored = HnswIndex::new(Metric::L2, params(0));
        restored.import_state(state).unwrap();

        for q in [[3.0, 6.0], [17.0, 34.0], [5.0, 10.0]] {
            let a = index.search(&q, 5, None);
            let b = restored.search(&q, 5, None);
            assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(b.iter()) {
                assert_eq!(x.id, y.id);
                assert!((x.distance - y.distance).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn import_state_rejects_unknown_neighbor_id() {
        let mut index = HnswIndex::new(Metric::L2, params(1));
        let bad_state = HnswGraphState {
            metric: Metric::L2,
            params: params(1),
            ef_search: 50,
            nodes: vec![ExportedNode {
                id: 1,
                elements: vec![1.0],
                metadata: crate::Value::Null,
                deleted: false,
                connections: vec![vec![999]],
            }],
            entry: Some(1),
            max_layer: 0,
        };
        assert!(index.import_state(bad_state).is_err());
    }

    #[test]
    fn empty_graph_search_returns_empty() {
        let index = HnswIndex::new(Metric::L2, params(1));
        assert!(index.search(&[1.0, 2.0], 5, None).is_empty());
    }

    #[test]
    fn entry_reselection_picks_highest_layer_then_smallest_id() {
        let mut index = HnswIndex::new(
            Metric::L2,
            HnswParams {
                m: 4,
                ef_construction: 50,
                ef_search: 20,
                max_layers: 4,
                seed: 2024,
            },
        );
        for i in 1..=30u64 {
            index
                .insert(i, vec![i as f32], crate::Value::Null)
                .unwrap();
        }
        // Delete every node that isn't the entry until stats reflect the
        // survivors only; the invariant under test is just that deleting the
        // entry point never leaves a dangling/self-referential entry.
        let before = index.len();
        let stats_before = index.stats();
        assert!(stats_before.nodes > 0);
        for i in 1..=30u64 {
            let _ = index.delete(i);
        }
        assert_eq!(index.len(), 0);
        assert!(before > 0);
        assert!(index.search(&[1.0], 1, None).is_empty());
    }
}
