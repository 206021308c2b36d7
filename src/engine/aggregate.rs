//! Aggregations over node and edge snapshots.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::graph::Adjacency;
use crate::types::{Edge, EngineError, EngineResult, Node, SCORE_HISTORY_LIMIT};

/// Cross-group influence: source group -> target group -> summed weight.
pub type DepartmentMatrix = BTreeMap<String, BTreeMap<String, f64>>;

/// Ranking basis for [`top_influencers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfluenceMetric {
    /// Ranked on `raw_score`.
    Total,
    /// Ranked on `score`.
    Direct,
    /// Ranked on `raw_score - score`.
    Propagated,
    /// Ranked on `volatility`.
    Volatility,
}

impl InfluenceMetric {
    /// Return a human-readable name for this metric.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Direct => "direct",
            Self::Propagated => "propagated",
            Self::Volatility => "volatility",
        }
    }

    /// Parse a metric from its name.
    pub fn from_name(name: &str) -> EngineResult<Self> {
        match name.to_lowercase().as_str() {
            "total" => Ok(Self::Total),
            "direct" => Ok(Self::Direct),
            "propagated" => Ok(Self::Propagated),
            "volatility" => Ok(Self::Volatility),
            _ => Err(EngineError::UnknownName {
                kind: "metric",
                value: name.to_string(),
            }),
        }
    }

    /// The value this metric reads from a node snapshot.
    pub fn value(&self, node: &Node) -> f64 {
        match self {
            Self::Total => node.raw_score,
            Self::Direct => node.score,
            Self::Propagated => node.raw_score - node.score,
            Self::Volatility => node.volatility,
        }
    }
}

impl std::fmt::Display for InfluenceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coarse structural metrics of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    /// `edges / (n * (n - 1))`, 0 for fewer than two nodes.
    pub density: f64,
    /// Closed out-neighbor pairs over all out-neighbor pairs.
    pub clustering: f64,
}

/// Sum edge weights between different groups.
///
/// Edges inside one group, and edges touching a node without a group, are
/// skipped, so the matrix never holds a `matrix[g][g]` entry.
pub fn department_matrix(nodes: &[Node], edges: &[Edge]) -> DepartmentMatrix {
    let groups: HashMap<u64, &str> = nodes
        .iter()
        .filter_map(|n| n.group_id.as_deref().map(|g| (n.id, g)))
        .collect();

    let mut matrix = DepartmentMatrix::new();
    for edge in edges {
        let (Some(&source), Some(&target)) =
            (groups.get(&edge.source_id), groups.get(&edge.target_id))
        else {
            continue;
        };
        if source == target {
            continue;
        }
        *matrix
            .entry(source.to_string())
            .or_default()
            .entry(target.to_string())
            .or_insert(0.0) += edge.weight;
    }
    matrix
}

/// Highest-ranked nodes by `metric`, ties kept in input order.
pub fn top_influencers<'a>(nodes: &'a [Node], metric: InfluenceMetric, limit: usize) -> Vec<&'a Node> {
    let mut ranked: Vec<&Node> = nodes.iter().collect();
    ranked.sort_by(|a, b| {
        metric
            .value(b)
            .partial_cmp(&metric.value(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

/// Density and local clustering proxy for a graph of `node_count` nodes.
///
/// Clustering looks at each node's distinct out-neighbors; a pair counts as
/// closed when either neighbor has an edge to the other.
pub fn graph_metrics(node_count: usize, edges: &[Edge]) -> GraphMetrics {
    let density = if node_count <= 1 {
        0.0
    } else {
        edges.len() as f64 / (node_count as f64 * (node_count as f64 - 1.0))
    };

    let adjacency = Adjacency::build(edges);
    let mut sources: Vec<u64> = edges.iter().map(|e| e.source_id).collect();
    sources.sort_unstable();
    sources.dedup();

    let mut possible = 0u64;
    let mut closed = 0u64;
    for source in sources {
        let neighbors = adjacency.out_neighbors(source);
        for i in 0..neighbors.len() {
            for j in (i + 1)..neighbors.len() {
                possible += 1;
                let (a, b) = (neighbors[i], neighbors[j]);
                if adjacency.has_edge(a, b) || adjacency.has_edge(b, a) {
                    closed += 1;
                }
            }
        }
    }

    let clustering = if possible == 0 {
        0.0
    } else {
        closed as f64 / possible as f64
    };

    GraphMetrics {
        node_count,
        edge_count: edges.len(),
        density,
        clustering,
    }
}

/// Population standard deviation of the most recent score samples.
///
/// `history` is ordered most recent first; only the first
/// [`SCORE_HISTORY_LIMIT`] samples are used. Fewer than two samples give 0.
pub fn volatility(history: &[f64]) -> f64 {
    volatility_window(history, SCORE_HISTORY_LIMIT)
}

/// [`volatility`] over the first `window` samples.
pub fn volatility_window(history: &[f64], window: usize) -> f64 {
    let samples = &history[..history.len().min(window)];
    if samples.len() < 2 {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
