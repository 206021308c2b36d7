//! The request-facing engine: cached views, analytics, recompute and edge edits.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheNamespace, ResultCache};
use crate::config::EngineConfig;
use crate::graph::{propagate, PropagationResult};
use crate::notify::{Notification, NotificationKind, Notifier, NullNotifier};
use crate::store::GraphStore;
use crate::types::edge::validate_weight;
use crate::types::{now_micros, Edge, EngineError, EngineResult, Node, TenantId};

use super::aggregate::InfluenceMetric;
use super::analytics::{build_report, ranking, AnalyticsKind, AnalyticsReport, InfluencerEntry};
use super::decay::decayed_weight;
use super::recompute::{run_cycle, RecomputeOptions, RecomputeReport};

/// An edge together with its weight decayed to the time of the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeView {
    #[serde(flatten)]
    pub edge: Edge,
    pub decayed_weight: f64,
}

/// Everything a client needs to draw a tenant's graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<Node>,
    pub edges: Vec<EdgeView>,
    /// Present when propagation was requested; computed over decayed weights.
    pub propagation: Option<BTreeMap<u64, PropagationResult>>,
}

/// Values stored in the engine's result cache.
#[derive(Debug, Clone)]
pub enum CachedView {
    Graph(Arc<GraphView>),
    Analytics(Arc<AnalyticsReport>),
    Ranking(Arc<Vec<InfluencerEntry>>),
    Node(Arc<PropagationResult>),
}

trait Cacheable: Sized {
    fn into_view(value: Arc<Self>) -> CachedView;
    fn from_view(view: CachedView) -> Option<Arc<Self>>;
}

macro_rules! cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn into_view(value: Arc<Self>) -> CachedView {
                CachedView::$variant(value)
            }

            fn from_view(view: CachedView) -> Option<Arc<Self>> {
                match view {
                    CachedView::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

cacheable!(GraphView, Graph);
cacheable!(AnalyticsReport, Analytics);
cacheable!(Vec<InfluencerEntry>, Ranking);
cacheable!(PropagationResult, Node);

/// Influence scoring engine bound to a store, a cache and a notifier.
pub struct InfluenceEngine {
    store: Arc<dyn GraphStore>,
    cache: Arc<ResultCache<CachedView>>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
    tenant_locks: Mutex<HashMap<TenantId, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for InfluenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluenceEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InfluenceEngine {
    /// Create an engine from explicit collaborators.
    pub fn new(
        store: Arc<dyn GraphStore>,
        cache: Arc<ResultCache<CachedView>>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cache,
            notifier,
            config,
            tenant_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Create an engine with a sweeping cache sized from `config` and no notifications.
    pub fn with_store(store: Arc<dyn GraphStore>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let cache = Arc::new(ResultCache::with_sweeper(
            config.cache.default_ttl(),
            config.cache.sweep_interval(),
        ));
        Self::new(store, cache, Arc::new(NullNotifier), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache<CachedView> {
        &self.cache
    }

    /// Stop the cache sweeper.
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    fn cached<T, F>(&self, key: String, ttl: Duration, compute: F) -> EngineResult<Arc<T>>
    where
        T: Cacheable,
        F: FnOnce() -> EngineResult<T>,
    {
        let view = self
            .cache
            .try_get_or_set(&key, || compute().map(|v| T::into_view(Arc::new(v))), ttl)?;
        T::from_view(view).ok_or_else(|| {
            EngineError::Misconfigured(format!("cache key {} holds another result type", key))
        })
    }

    fn decayed_edges(&self, tenant: &TenantId, now: u64) -> EngineResult<Vec<EdgeView>> {
        let rate = self.config.decay.rate_per_day;
        self.store
            .list_active_edges(tenant)?
            .into_iter()
            .map(|edge| {
                Ok(EdgeView {
                    decayed_weight: decayed_weight(edge.weight, edge.created_at, rate, now)?,
                    edge,
                })
            })
            .collect()
    }

    /// Nodes and decayed edges, optionally with propagation results.
    pub fn compute_graph_view(
        &self,
        tenant: &TenantId,
        include_propagation: bool,
    ) -> EngineResult<Arc<GraphView>> {
        let detail = if include_propagation { "full" } else { "basic" };
        let key = CacheNamespace::Graph.key(tenant, detail);
        self.cached(key, self.config.cache.graph_ttl(), || {
            let nodes = self.store.list_nodes(tenant)?;
            let edges = self.decayed_edges(tenant, now_micros())?;
            let propagation = if include_propagation {
                let decayed: Vec<Edge> = edges
                    .iter()
                    .map(|v| v.edge.with_weight(v.decayed_weight))
                    .collect();
                let node_ids: Vec<u64> = nodes.iter().map(|n| n.id).collect();
                Some(propagate(&decayed, &node_ids, &self.config.propagation)?)
            } else {
                None
            };
            Ok(GraphView {
                nodes,
                edges,
                propagation,
            })
        })
    }

    /// Build (or fetch) one analytics report.
    pub fn compute_analytics(
        &self,
        tenant: &TenantId,
        kind: AnalyticsKind,
    ) -> EngineResult<Arc<AnalyticsReport>> {
        let key = CacheNamespace::Analytics.key(tenant, kind.name());
        self.cached(key, self.config.cache.analytics_ttl(), || {
            let nodes = self.store.list_nodes(tenant)?;
            let edges = self.store.list_active_edges(tenant)?;
            Ok(build_report(kind, &nodes, &edges, &self.config))
        })
    }

    /// Ranking of a tenant's nodes by an arbitrary metric.
    pub fn top_influencers(
        &self,
        tenant: &TenantId,
        metric: InfluenceMetric,
        limit: usize,
    ) -> EngineResult<Arc<Vec<InfluencerEntry>>> {
        let key = CacheNamespace::Top.key(tenant, &format!("{}:{}", metric, limit));
        self.cached(key, self.config.cache.analytics_ttl(), || {
            let nodes = self.store.list_nodes(tenant)?;
            Ok(ranking(&nodes, metric, limit))
        })
    }

    /// Current propagation result for a single node.
    pub fn node_influence(
        &self,
        tenant: &TenantId,
        node_id: u64,
    ) -> EngineResult<Arc<PropagationResult>> {
        let key = CacheNamespace::Scores.key(tenant, &node_id.to_string());
        self.cached(key, self.config.cache.graph_ttl(), || {
            let nodes = self.store.list_nodes(tenant)?;
            if !nodes.iter().any(|n| n.id == node_id) {
                return Err(EngineError::NodeNotFound(node_id));
            }
            let edges: Vec<Edge> = self
                .decayed_edges(tenant, now_micros())?
                .into_iter()
                .map(|v| v.edge.with_weight(v.decayed_weight))
                .collect();
            let mut results = propagate(&edges, &[node_id], &self.config.propagation)?;
            results
                .remove(&node_id)
                .ok_or(EngineError::NodeNotFound(node_id))
        })
    }

    fn tenant_lock(&self, tenant: &TenantId) -> Arc<Mutex<()>> {
        let mut locks = self.tenant_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(tenant.clone()).or_default().clone()
    }

    /// Run one recompute cycle. Cycles for the same tenant never overlap.
    pub fn recompute(
        &self,
        tenant: &TenantId,
        apply_decay: bool,
        process_events: bool,
    ) -> EngineResult<RecomputeReport> {
        let lock = self.tenant_lock(tenant);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let options = RecomputeOptions {
            apply_decay,
            process_events,
        };
        let report = run_cycle(
            self.store.as_ref(),
            &self.cache,
            &self.config,
            tenant,
            options,
            now_micros(),
        )
        .inspect_err(|e| log::warn!("recompute {} aborted: {}", tenant, e))?;

        let payload = serde_json::json!({
            "stats": report.stats,
            "top_changes": report.top_changes,
        });
        self.notifier.notify(Notification::new(
            NotificationKind::ScoreUpdated,
            tenant,
            payload,
        ));
        Ok(report)
    }

    fn invalidate_tenant(&self, tenant: &TenantId) {
        for ns in CacheNamespace::ALL {
            self.cache.delete_pattern(&ns.tenant_pattern(tenant));
        }
    }

    fn edge_changed(&self, kind: NotificationKind, tenant: &TenantId, edge: &Edge) {
        self.invalidate_tenant(tenant);
        let payload = serde_json::to_value(edge).unwrap_or(serde_json::Value::Null);
        self.notifier.notify(Notification::new(kind, tenant, payload));
    }

    /// Validate and create an edge.
    pub fn create_edge(
        &self,
        tenant: &TenantId,
        source_id: u64,
        target_id: u64,
        weight: f64,
    ) -> EngineResult<Edge> {
        if source_id == 0 {
            return Err(EngineError::MissingId("source_id"));
        }
        if target_id == 0 {
            return Err(EngineError::MissingId("target_id"));
        }
        if source_id == target_id {
            return Err(EngineError::SelfEdge(source_id));
        }
        validate_weight(weight)?;
        let edge = self.store.insert_edge(tenant, source_id, target_id, weight)?;
        self.edge_changed(NotificationKind::EdgeCreated, tenant, &edge);
        Ok(edge)
    }

    /// Validate and apply a new weight to an edge.
    pub fn update_edge_weight(
        &self,
        tenant: &TenantId,
        edge_id: u64,
        weight: f64,
    ) -> EngineResult<Edge> {
        if edge_id == 0 {
            return Err(EngineError::MissingId("edge_id"));
        }
        validate_weight(weight)?;
        let edge = self.store.update_edge_weight(tenant, edge_id, weight)?;
        self.edge_changed(NotificationKind::EdgeUpdated, tenant, &edge);
        Ok(edge)
    }

    /// Delete an edge.
    pub fn delete_edge(&self, tenant: &TenantId, edge_id: u64) -> EngineResult<Edge> {
        if edge_id == 0 {
            return Err(EngineError::MissingId("edge_id"));
        }
        let edge = self.store.delete_edge(tenant, edge_id)?;
        self.edge_changed(NotificationKind::EdgeDeleted, tenant, &edge);
        Ok(edge)
    }
}
