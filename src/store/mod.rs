//! The graph store boundary: where nodes, edges and events live.

pub mod memory;

pub use memory::{MemoryStore, TenantGraph};

use crate::types::{Edge, EngineResult, InfluenceEvent, Node, ScoreUpdate, TenantId};

/// Persistent storage for one or more tenants' graphs.
///
/// Failures should surface as [`crate::EngineError::Storage`] so callers can
/// retry. `commit_scores` must apply all updates or none.
pub trait GraphStore: Send + Sync {
    /// All active edges of a tenant.
    fn list_active_edges(&self, tenant: &TenantId) -> EngineResult<Vec<Edge>>;

    /// Events not yet folded into a score.
    fn list_unprocessed_events(&self, tenant: &TenantId) -> EngineResult<Vec<InfluenceEvent>>;

    /// Node snapshots, including recent score history.
    fn list_nodes(&self, tenant: &TenantId) -> EngineResult<Vec<Node>>;

    /// Write back new scores for a tenant.
    fn commit_scores(&self, tenant: &TenantId, updates: &[ScoreUpdate]) -> EngineResult<()>;

    /// Stamp events as consumed. Already-processed events keep their stamp.
    fn mark_events_processed(&self, event_ids: &[u64], processed_at: u64) -> EngineResult<()>;

    /// Create an edge between two existing nodes.
    fn insert_edge(
        &self,
        tenant: &TenantId,
        source_id: u64,
        target_id: u64,
        weight: f64,
    ) -> EngineResult<Edge>;

    /// Change an edge's weight, returning the updated edge.
    fn update_edge_weight(&self, tenant: &TenantId, edge_id: u64, weight: f64)
        -> EngineResult<Edge>;

    /// Remove an edge, returning it.
    fn delete_edge(&self, tenant: &TenantId, edge_id: u64) -> EngineResult<Edge>;
}
