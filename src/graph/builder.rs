//! Adjacency construction and a fluent API for assembling edge lists.

use std::collections::HashMap;

use crate::types::{now_micros, Edge, Node};

/// Outgoing edges grouped by source node, in insertion order.
///
/// Callers filter inactive edges before building; every edge handed in is
/// considered eligible.
#[derive(Debug, Default)]
pub struct Adjacency {
    outgoing: HashMap<u64, Vec<Edge>>,
}

impl Adjacency {
    /// Group a flat edge list by source node.
    pub fn build(edges: &[Edge]) -> Self {
        let mut outgoing: HashMap<u64, Vec<Edge>> = HashMap::new();
        for edge in edges {
            outgoing.entry(edge.source_id).or_default().push(*edge);
        }
        Self { outgoing }
    }

    /// All edges leaving a node. Unknown nodes have none.
    pub fn edges_from(&self, source_id: u64) -> &[Edge] {
        self.outgoing
            .get(&source_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Distinct out-neighbors of a node, first occurrence order.
    pub fn out_neighbors(&self, source_id: u64) -> Vec<u64> {
        let mut seen = Vec::new();
        for edge in self.edges_from(source_id) {
            if !seen.contains(&edge.target_id) {
                seen.push(edge.target_id);
            }
        }
        seen
    }

    /// Whether at least one edge `source -> target` exists.
    pub fn has_edge(&self, source_id: u64, target_id: u64) -> bool {
        self.edges_from(source_id)
            .iter()
            .any(|e| e.target_id == target_id)
    }

    /// Sum of raw outgoing edge weights.
    pub fn direct_weight(&self, source_id: u64) -> f64 {
        self.edges_from(source_id).iter().map(|e| e.weight).sum()
    }
}

/// Fluent builder for node and edge snapshots.
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    next_edge_id: u64,
    created_at: u64,
}

impl GraphBuilder {
    /// Create a new builder stamping edges with the current time.
    pub fn new() -> Self {
        Self::at(now_micros())
    }

    /// Create a new builder stamping edges with a fixed timestamp.
    pub fn at(created_at: u64) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            next_edge_id: 1,
            created_at,
        }
    }

    /// Add a node without a group.
    pub fn person(&mut self, id: u64, name: &str) -> &mut Self {
        self.nodes.push(Node::new(id, name));
        self
    }

    /// Add a node belonging to a group.
    pub fn member(&mut self, id: u64, name: &str, group_id: &str) -> &mut Self {
        self.nodes.push(Node::new(id, name).in_group(group_id));
        self
    }

    /// Add an edge between two nodes.
    pub fn link(&mut self, source_id: u64, target_id: u64, weight: f64) -> &mut Self {
        let created_at = self.created_at;
        self.link_at(source_id, target_id, weight, created_at)
    }

    /// Add an edge with an explicit creation time.
    pub fn link_at(
        &mut self,
        source_id: u64,
        target_id: u64,
        weight: f64,
        created_at: u64,
    ) -> &mut Self {
        let id = self.next_edge_id;
        self.next_edge_id += 1;
        self.edges.push(Edge::with_timestamp(
            id, source_id, target_id, weight, created_at,
        ));
        self
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> Vec<u64> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Edges added so far.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Finish and return the snapshots.
    pub fn build(self) -> (Vec<Node>, Vec<Edge>) {
        (self.nodes, self.edges)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
