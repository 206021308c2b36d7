//! Influence propagation: weighted BFS with per-hop decay.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::types::{EngineError, EngineResult, Edge, MAX_EDGE_WEIGHT};

use super::Adjacency;

/// Parameters for a propagation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationParams {
    /// Maximum number of hops from the source.
    pub max_depth: u32,
    /// Attenuation applied on every hop, in `[0, 1)`.
    pub decay_factor: f64,
    /// Steps whose carried weight falls below this are pruned.
    pub min_weight: f64,
}

impl Default for PropagationParams {
    fn default() -> Self {
        Self {
            max_depth: 3,
            decay_factor: 0.6,
            min_weight: 0.01,
        }
    }
}

impl PropagationParams {
    /// Reject parameters that would stop bounding the traversal.
    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0..1.0).contains(&self.decay_factor) {
            return Err(EngineError::Misconfigured(format!(
                "decay_factor must be in [0, 1), got {}",
                self.decay_factor
            )));
        }
        if !self.min_weight.is_finite() || self.min_weight < 0.0 {
            return Err(EngineError::Misconfigured(format!(
                "min_weight must be a non-negative number, got {}",
                self.min_weight
            )));
        }
        Ok(())
    }
}

/// One route along which influence travelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencePath {
    /// Node ids from the source to the reached node.
    pub path: Vec<u64>,
    /// Carried weight on arrival.
    pub weight: f64,
    /// Number of hops.
    pub depth: u32,
}

/// Influence of a single node for one propagation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationResult {
    pub node_id: u64,
    /// Sum of raw outgoing edge weights.
    pub direct_influence: f64,
    /// Sum of carried weights over every reached (node, path) pair.
    pub propagated_influence: f64,
    /// `direct_influence + propagated_influence`.
    pub total_influence: f64,
    /// Every path explored, starting with the source itself at depth 0.
    pub paths: Vec<InfluencePath>,
}

/// Compute direct and propagated influence for every id in `node_ids`.
///
/// Ids without outgoing edges are processed with an empty neighbor list.
pub fn propagate(
    edges: &[Edge],
    node_ids: &[u64],
    params: &PropagationParams,
) -> EngineResult<BTreeMap<u64, PropagationResult>> {
    params.validate()?;
    let adjacency = Adjacency::build(edges);
    let mut results = BTreeMap::new();
    for &node_id in node_ids {
        results.insert(node_id, propagate_from(&adjacency, node_id, params));
    }
    Ok(results)
}

/// Propagate from a single source over a prebuilt adjacency.
///
/// A node reached through several routes contributes once per route, and
/// revisits through cycles are bounded only by `max_depth`.
pub fn propagate_from(
    adjacency: &Adjacency,
    source_id: u64,
    params: &PropagationParams,
) -> PropagationResult {
    let mut paths = vec![InfluencePath {
        path: vec![source_id],
        weight: 1.0,
        depth: 0,
    }];
    let mut propagated = 0.0;
    // Queue holds indexes into `paths`.
    let mut queue: VecDeque<usize> = VecDeque::new();
    queue.push_back(0);

    while let Some(index) = queue.pop_front() {
        let (current_id, carried, depth) = {
            let entry = &paths[index];
            let current = entry.path.last().copied().unwrap_or(source_id);
            (current, entry.weight, entry.depth)
        };
        if depth >= params.max_depth {
            continue;
        }

        for edge in adjacency.edges_from(current_id) {
            let weight = carried * (edge.weight / MAX_EDGE_WEIGHT) * params.decay_factor;
            if weight < params.min_weight {
                continue;
            }
            let mut path = paths[index].path.clone();
            path.push(edge.target_id);
            propagated += weight;
            paths.push(InfluencePath {
                path,
                weight,
                depth: depth + 1,
            });
            queue.push_back(paths.len() - 1);
        }
    }

    let direct = adjacency.direct_weight(source_id);
    PropagationResult {
        node_id: source_id,
        direct_influence: direct,
        propagated_influence: propagated,
        total_influence: direct + propagated,
        paths,
    }
}
