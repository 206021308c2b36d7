//! In-memory graph store, persisted as a JSON snapshot file.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::types::{
    now_micros, EngineError, EngineResult, Edge, EventType, InfluenceEvent, Node, ScoreUpdate,
    TenantId,
};

use super::GraphStore;

/// Everything stored for one tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub events: Vec<InfluenceEvent>,
}

impl TenantGraph {
    fn node_exists(&self, id: u64) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    tenants: BTreeMap<TenantId, TenantGraph>,
    #[serde(default = "first_id")]
    next_edge_id: u64,
    #[serde(default = "first_id")]
    next_event_id: u64,
}

fn first_id() -> u64 {
    1
}

/// A thread-safe, multi-tenant [`GraphStore`] held in memory.
pub struct MemoryStore {
    state: RwLock<Snapshot>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Snapshot {
                tenants: BTreeMap::new(),
                next_edge_id: 1,
                next_event_id: 1,
            }),
        }
    }

    /// Load a store from a JSON snapshot file.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let mut snapshot: Snapshot = serde_json::from_str(&data)?;
        // Ids in hand-edited files may run ahead of the counters.
        let max_edge = snapshot
            .tenants
            .values()
            .flat_map(|t| t.edges.iter().map(|e| e.id))
            .max()
            .unwrap_or(0);
        let max_event = snapshot
            .tenants
            .values()
            .flat_map(|t| t.events.iter().map(|e| e.id))
            .max()
            .unwrap_or(0);
        snapshot.next_edge_id = snapshot.next_edge_id.max(max_edge + 1);
        snapshot.next_event_id = snapshot.next_event_id.max(max_event + 1);
        Ok(Self {
            state: RwLock::new(snapshot),
        })
    }

    /// Write the store to a JSON snapshot file.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let state = self.read()?;
        let data = serde_json::to_string_pretty(&*state)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn read(&self) -> EngineResult<RwLockReadGuard<'_, Snapshot>> {
        self.state
            .read()
            .map_err(|_| EngineError::Storage("store lock poisoned".to_string()))
    }

    fn write(&self) -> EngineResult<RwLockWriteGuard<'_, Snapshot>> {
        self.state
            .write()
            .map_err(|_| EngineError::Storage("store lock poisoned".to_string()))
    }

    /// Insert a node, or replace the node with the same id.
    pub fn upsert_node(&self, tenant: &TenantId, node: Node) -> EngineResult<()> {
        if node.id == 0 {
            return Err(EngineError::MissingId("node id"));
        }
        let mut state = self.write()?;
        let graph = state.tenants.entry(tenant.clone()).or_default();
        match graph.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => graph.nodes.push(node),
        }
        Ok(())
    }

    /// Insert an edge as-is (keeping its id and timestamp), e.g. when seeding.
    pub fn import_edge(&self, tenant: &TenantId, edge: Edge) -> EngineResult<()> {
        edge.validate()?;
        let mut state = self.write()?;
        let graph = state.tenants.entry(tenant.clone()).or_default();
        for id in [edge.source_id, edge.target_id] {
            if !graph.node_exists(id) {
                return Err(EngineError::NodeNotFound(id));
            }
        }
        graph.edges.push(edge);
        state.next_edge_id = state.next_edge_id.max(edge.id + 1);
        Ok(())
    }

    /// Mark an edge active or inactive.
    pub fn set_edge_active(&self, tenant: &TenantId, edge_id: u64, active: bool) -> EngineResult<()> {
        let mut state = self.write()?;
        let edge = state
            .tenants
            .get_mut(tenant)
            .and_then(|g| g.edges.iter_mut().find(|e| e.id == edge_id))
            .ok_or(EngineError::EdgeNotFound(edge_id))?;
        edge.active = active;
        Ok(())
    }

    /// Record a new unprocessed event for a node.
    pub fn record_event(
        &self,
        tenant: &TenantId,
        subject_node_id: u64,
        event_type: EventType,
        weight_delta: f64,
    ) -> EngineResult<InfluenceEvent> {
        let mut state = self.write()?;
        let id = state.next_event_id;
        let graph = state
            .tenants
            .get_mut(tenant)
            .filter(|g| g.node_exists(subject_node_id))
            .ok_or(EngineError::NodeNotFound(subject_node_id))?;
        let event = InfluenceEvent::new(id, subject_node_id, event_type, weight_delta);
        graph.events.push(event.clone());
        state.next_event_id += 1;
        Ok(event)
    }

    /// Copy of a tenant's graph (empty for unknown tenants).
    pub fn tenant(&self, tenant: &TenantId) -> EngineResult<TenantGraph> {
        Ok(self.read()?.tenants.get(tenant).cloned().unwrap_or_default())
    }

    /// All tenants present in the store.
    pub fn tenants(&self) -> EngineResult<Vec<TenantId>> {
        Ok(self.read()?.tenants.keys().cloned().collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for MemoryStore {
    fn list_active_edges(&self, tenant: &TenantId) -> EngineResult<Vec<Edge>> {
        let state = self.read()?;
        Ok(state
            .tenants
            .get(tenant)
            .map(|g| g.edges.iter().filter(|e| e.active).copied().collect())
            .unwrap_or_default())
    }

    fn list_unprocessed_events(&self, tenant: &TenantId) -> EngineResult<Vec<InfluenceEvent>> {
        let state = self.read()?;
        Ok(state
            .tenants
            .get(tenant)
            .map(|g| {
                g.events
                    .iter()
                    .filter(|e| !e.is_processed())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_nodes(&self, tenant: &TenantId) -> EngineResult<Vec<Node>> {
        let state = self.read()?;
        Ok(state
            .tenants
            .get(tenant)
            .map(|g| g.nodes.clone())
            .unwrap_or_default())
    }

    fn commit_scores(&self, tenant: &TenantId, updates: &[ScoreUpdate]) -> EngineResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut state = self.write()?;
        let graph = state
            .tenants
            .get_mut(tenant)
            .ok_or_else(|| EngineError::Storage(format!("unknown tenant {}", tenant)))?;

        // Validate everything first so a bad update leaves the tenant untouched.
        if let Some(missing) = updates.iter().find(|u| !graph.node_exists(u.node_id)) {
            return Err(EngineError::NodeNotFound(missing.node_id));
        }
        for update in updates {
            if let Some(node) = graph.nodes.iter_mut().find(|n| n.id == update.node_id) {
                node.apply(update);
            }
        }
        Ok(())
    }

    fn mark_events_processed(&self, event_ids: &[u64], processed_at: u64) -> EngineResult<()> {
        let mut state = self.write()?;
        for graph in state.tenants.values_mut() {
            for event in graph.events.iter_mut() {
                if event.processed_at.is_none() && event_ids.contains(&event.id) {
                    event.processed_at = Some(processed_at);
                }
            }
        }
        Ok(())
    }

    fn insert_edge(
        &self,
        tenant: &TenantId,
        source_id: u64,
        target_id: u64,
        weight: f64,
    ) -> EngineResult<Edge> {
        let mut state = self.write()?;
        let id = state.next_edge_id;
        let graph = state
            .tenants
            .get_mut(tenant)
            .ok_or(EngineError::NodeNotFound(source_id))?;
        for node_id in [source_id, target_id] {
            if !graph.node_exists(node_id) {
                return Err(EngineError::NodeNotFound(node_id));
            }
        }
        let edge = Edge::with_timestamp(id, source_id, target_id, weight, now_micros());
        edge.validate()?;
        graph.edges.push(edge);
        state.next_edge_id += 1;
        Ok(edge)
    }

    fn update_edge_weight(
        &self,
        tenant: &TenantId,
        edge_id: u64,
        weight: f64,
    ) -> EngineResult<Edge> {
        let mut state = self.write()?;
        let edge = state
            .tenants
            .get_mut(tenant)
            .and_then(|g| g.edges.iter_mut().find(|e| e.id == edge_id))
            .ok_or(EngineError::EdgeNotFound(edge_id))?;
        let updated = edge.with_weight(weight);
        updated.validate()?;
        *edge = updated;
        Ok(updated)
    }

    fn delete_edge(&self, tenant: &TenantId, edge_id: u64) -> EngineResult<Edge> {
        let mut state = self.write()?;
        let graph = state
            .tenants
            .get_mut(tenant)
            .ok_or(EngineError::EdgeNotFound(edge_id))?;
        let pos = graph
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or(EngineError::EdgeNotFound(edge_id))?;
        Ok(graph.edges.remove(pos))
    }
}
