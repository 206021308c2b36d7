//! Analytics reports built from node and edge snapshots.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::graph::{detect_communities, group_by_label};
use crate::types::{Edge, EngineError, EngineResult, Node};

use super::aggregate::{
    department_matrix, graph_metrics, top_influencers, DepartmentMatrix, GraphMetrics,
    InfluenceMetric,
};

/// Which report to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsKind {
    Overview,
    Top,
    Heatmap,
    Volatility,
    Metrics,
    Communities,
}

impl AnalyticsKind {
    /// Every report kind.
    pub const ALL: [AnalyticsKind; 6] = [
        Self::Overview,
        Self::Top,
        Self::Heatmap,
        Self::Volatility,
        Self::Metrics,
        Self::Communities,
    ];

    /// Return a human-readable name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Top => "top",
            Self::Heatmap => "heatmap",
            Self::Volatility => "volatility",
            Self::Metrics => "metrics",
            Self::Communities => "communities",
        }
    }

    /// Parse a kind from its name.
    pub fn from_name(name: &str) -> EngineResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == name.to_lowercase())
            .ok_or_else(|| EngineError::UnknownName {
                kind: "analytics kind",
                value: name.to_string(),
            })
    }
}

impl std::fmt::Display for AnalyticsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Headline numbers for a tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub node_count: usize,
    pub edge_count: usize,
    pub total_score: f64,
    pub average_score: f64,
    pub max_score: f64,
    pub density: f64,
    pub community_count: usize,
    /// Highest-scoring node, if any.
    pub top_node_id: Option<u64>,
}

/// One row of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfluencerEntry {
    pub node_id: u64,
    pub name: String,
    pub group_id: Option<String>,
    /// Value of the ranking metric.
    pub value: f64,
    pub score: f64,
    pub rank: u32,
}

impl InfluencerEntry {
    fn from_node(node: &Node, metric: InfluenceMetric) -> Self {
        Self {
            node_id: node.id,
            name: node.name.clone(),
            group_id: node.group_id.clone(),
            value: metric.value(node),
            score: node.score,
            rank: node.rank,
        }
    }
}

/// A detected influence community.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Community {
    pub label: u64,
    pub members: Vec<u64>,
    /// Sum of the members' committed scores.
    pub total_score: f64,
}

/// A finished analytics report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AnalyticsReport {
    Overview(Overview),
    Top(Vec<InfluencerEntry>),
    Heatmap(DepartmentMatrix),
    Volatility(Vec<InfluencerEntry>),
    Metrics(GraphMetrics),
    Communities(Vec<Community>),
}

/// Rank nodes by `metric` and keep the first `limit`.
pub fn ranking(nodes: &[Node], metric: InfluenceMetric, limit: usize) -> Vec<InfluencerEntry> {
    top_influencers(nodes, metric, limit)
        .into_iter()
        .map(|n| InfluencerEntry::from_node(n, metric))
        .collect()
}

/// Detect communities and order them largest first, then by label.
pub fn communities(nodes: &[Node], edges: &[Edge], config: &EngineConfig) -> Vec<Community> {
    let node_ids: Vec<u64> = nodes.iter().map(|n| n.id).collect();
    let labels = detect_communities(edges, &node_ids, &config.community);
    let mut result: Vec<Community> = group_by_label(&labels)
        .into_iter()
        .map(|(label, members)| {
            let total_score = nodes
                .iter()
                .filter(|n| members.contains(&n.id))
                .map(|n| n.score)
                .sum();
            Community {
                label,
                members,
                total_score,
            }
        })
        .collect();
    result.sort_by(|a, b| {
        b.members
            .len()
            .cmp(&a.members.len())
            .then(a.label.cmp(&b.label))
    });
    result
}

/// Build one report from snapshots.
pub fn build_report(
    kind: AnalyticsKind,
    nodes: &[Node],
    edges: &[Edge],
    config: &EngineConfig,
) -> AnalyticsReport {
    let limit = config.analytics.top_limit;
    match kind {
        AnalyticsKind::Overview => {
            let total_score: f64 = nodes.iter().map(|n| n.score).sum();
            let top = top_influencers(nodes, InfluenceMetric::Direct, 1);
            AnalyticsReport::Overview(Overview {
                node_count: nodes.len(),
                edge_count: edges.len(),
                total_score,
                average_score: if nodes.is_empty() {
                    0.0
                } else {
                    total_score / nodes.len() as f64
                },
                max_score: top.first().map(|n| n.score).unwrap_or(0.0),
                density: graph_metrics(nodes.len(), edges).density,
                community_count: communities(nodes, edges, config).len(),
                top_node_id: top.first().map(|n| n.id),
            })
        }
        AnalyticsKind::Top => AnalyticsReport::Top(ranking(nodes, InfluenceMetric::Total, limit)),
        AnalyticsKind::Heatmap => AnalyticsReport::Heatmap(department_matrix(nodes, edges)),
        AnalyticsKind::Volatility => {
            AnalyticsReport::Volatility(ranking(nodes, InfluenceMetric::Volatility, limit))
        }
        AnalyticsKind::Metrics => AnalyticsReport::Metrics(graph_metrics(nodes.len(), edges)),
        AnalyticsKind::Communities => {
            AnalyticsReport::Communities(communities(nodes, edges, config))
        }
    }
}
