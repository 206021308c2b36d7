//! Community detection by synchronous label propagation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::Edge;

use super::Adjacency;

/// Parameters for community detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityParams {
    /// Upper bound on relabeling rounds.
    pub max_iterations: usize,
}

impl Default for CommunityParams {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

/// Assign every node a community label.
///
/// Labels start out as the node's own id. Each round relabels all nodes at
/// once from the previous round's labels: a node takes the label with the
/// largest summed edge weight among its out-neighbors, and keeps its current
/// label unless another label strictly beats it. Among several strictly
/// better labels the smallest wins. Neighbors outside `node_ids` do not vote.
pub fn detect_communities(
    edges: &[Edge],
    node_ids: &[u64],
    params: &CommunityParams,
) -> BTreeMap<u64, u64> {
    let adjacency = Adjacency::build(edges);
    let mut labels: BTreeMap<u64, u64> = node_ids.iter().map(|&id| (id, id)).collect();

    for iteration in 0..params.max_iterations {
        let mut next = labels.clone();
        let mut changed = 0usize;

        for (&node_id, &current) in &labels {
            let mut votes: HashMap<u64, f64> = HashMap::new();
            for edge in adjacency.edges_from(node_id) {
                if let Some(&label) = labels.get(&edge.target_id) {
                    *votes.entry(label).or_insert(0.0) += edge.weight;
                }
            }

            let current_vote = votes.get(&current).copied().unwrap_or(0.0);
            let best = votes
                .iter()
                .filter(|(_, &w)| w > current_vote)
                .max_by(|(la, wa), (lb, wb)| {
                    wa.partial_cmp(wb)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(lb.cmp(la))
                })
                .map(|(&label, _)| label);

            if let Some(label) = best {
                next.insert(node_id, label);
                changed += 1;
            }
        }

        labels = next;
        log::debug!("label propagation round {}: {} relabeled", iteration + 1, changed);
        if changed == 0 {
            break;
        }
    }

    labels
}

/// Group a label map into communities keyed by label, members sorted.
pub fn group_by_label(labels: &BTreeMap<u64, u64>) -> BTreeMap<u64, Vec<u64>> {
    let mut groups: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for (&node_id, &label) in labels {
        groups.entry(label).or_default().push(node_id);
    }
    groups
}
