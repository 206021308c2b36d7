//! Phase 3 tests: Recompute cycle, engine facade, notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use influence_engine::engine::recompute::dense_ranks;
use influence_engine::engine::{
    AnalyticsKind, AnalyticsReport, InfluenceEngine, InfluenceMetric, RecomputeStage,
};
use influence_engine::notify::{ChannelNotifier, NotificationKind, NullNotifier};
use influence_engine::store::{GraphStore, MemoryStore};
use influence_engine::types::{
    Edge, EngineError, EngineResult, EventType, InfluenceEvent, Node, ScoreUpdate, TenantId,
};
use influence_engine::{EngineConfig, ResultCache};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn node(store: &MemoryStore, t: &TenantId, id: u64) -> Node {
    store
        .list_nodes(t)
        .unwrap()
        .into_iter()
        .find(|n| n.id == id)
        .unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Store with people 1..=n in tenant `org1`.
fn seeded(n: u64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let t = tenant("org1");
    for id in 1..=n {
        store
            .upsert_node(&t, Node::new(id, format!("person{}", id)))
            .unwrap();
    }
    store
}

fn engine_for(store: Arc<MemoryStore>) -> InfluenceEngine {
    InfluenceEngine::with_store(store, EngineConfig::default()).unwrap()
}

/// A store whose commits fail while `fail_commit` is set, and whose next
/// event stamp fails once when `fail_mark` is set.
struct FlakyStore {
    inner: MemoryStore,
    fail_commit: AtomicBool,
    fail_mark: AtomicBool,
}

impl FlakyStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_commit: AtomicBool::new(false),
            fail_mark: AtomicBool::new(false),
        }
    }
}

impl GraphStore for FlakyStore {
    fn list_active_edges(&self, t: &TenantId) -> EngineResult<Vec<Edge>> {
        self.inner.list_active_edges(t)
    }
    fn list_unprocessed_events(&self, t: &TenantId) -> EngineResult<Vec<InfluenceEvent>> {
        self.inner.list_unprocessed_events(t)
    }
    fn list_nodes(&self, t: &TenantId) -> EngineResult<Vec<Node>> {
        self.inner.list_nodes(t)
    }
    fn commit_scores(&self, t: &TenantId, updates: &[ScoreUpdate]) -> EngineResult<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(EngineError::Storage("connection reset".to_string()));
        }
        self.inner.commit_scores(t, updates)
    }
    fn mark_events_processed(&self, ids: &[u64], at: u64) -> EngineResult<()> {
        if self.fail_mark.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Storage("connection reset".to_string()));
        }
        self.inner.mark_events_processed(ids, at)
    }
    fn insert_edge(&self, t: &TenantId, s: u64, d: u64, w: f64) -> EngineResult<Edge> {
        self.inner.insert_edge(t, s, d, w)
    }
    fn update_edge_weight(&self, t: &TenantId, id: u64, w: f64) -> EngineResult<Edge> {
        self.inner.update_edge_weight(t, id, w)
    }
    fn delete_edge(&self, t: &TenantId, id: u64) -> EngineResult<Edge> {
        self.inner.delete_edge(t, id)
    }
}

// ==================== Recompute Tests ====================

#[test]
fn test_event_applied_exactly_once() {
    let store = seeded(1);
    let t = tenant("org1");
    store.record_event(&t, 1, EventType::Manual, 15.0).unwrap();
    let engine = engine_for(store.clone());

    let first = engine.recompute(&t, true, true).unwrap();
    assert_eq!(first.stats.events_processed, 1);
    assert_eq!(first.stats.scores_updated, 1);
    assert_eq!(node(&store, &t, 1).score, 15.0);
    assert!(store.list_unprocessed_events(&t).unwrap().is_empty());

    let second = engine.recompute(&t, true, true).unwrap();
    assert_eq!(second.stats.events_processed, 0);
    let x = node(&store, &t, 1);
    assert_eq!(x.score, 15.0);
    assert_eq!(x.score_history, vec![15.0, 15.0]);
    assert_eq!(x.volatility, 0.0);

    let processed = store.tenant(&t).unwrap().events;
    assert!(processed[0].processed_at.is_some());
}

#[test]
fn test_recompute_scores_and_ranks() {
    let store = seeded(3);
    let t = tenant("org1");
    let engine = engine_for(store.clone());
    engine.create_edge(&t, 1, 2, 80.0).unwrap();
    engine.create_edge(&t, 2, 3, 50.0).unwrap();

    let report = engine.recompute(&t, false, true).unwrap();
    assert_eq!(report.stats.edges_processed, 2);

    let a = node(&store, &t, 1);
    assert!(approx(a.score, 80.624));
    assert_eq!(a.raw_score, 80.0);
    assert_eq!(a.rank, 1);

    let b = node(&store, &t, 2);
    assert!(approx(b.score, 50.3));
    assert_eq!(b.rank, 2);

    let c = node(&store, &t, 3);
    assert_eq!(c.score, 0.0);
    assert_eq!(c.rank, 3);

    assert_eq!(report.top_changes[0].node_id, 1);
    assert_eq!(report.top_changes[0].old_rank, 0);
    assert_eq!(report.top_changes[0].new_rank, 1);
}

#[test]
fn test_recompute_with_decay_on_fresh_edges() {
    let store = seeded(2);
    let t = tenant("org1");
    let engine = engine_for(store.clone());
    engine.create_edge(&t, 1, 2, 100.0).unwrap();

    engine.recompute(&t, true, true).unwrap();
    // Edges created moments ago have barely decayed.
    assert!((node(&store, &t, 1).score - 100.6).abs() < 1e-3);
}

#[test]
fn test_dense_ranks_share_ties() {
    let ranks = dense_ranks(&[(1, 10.0), (2, 10.0), (3, 5.0), (4, 0.0)]);
    assert_eq!(ranks[&1], 1);
    assert_eq!(ranks[&2], 1);
    assert_eq!(ranks[&3], 2);
    assert_eq!(ranks[&4], 3);
}

#[test]
fn test_negative_events_floor_score() {
    let store = seeded(1);
    let t = tenant("org1");
    let engine = engine_for(store.clone());

    store
        .record_event(&t, 1, EventType::ProjectFailure, -20.0)
        .unwrap();
    engine.recompute(&t, true, true).unwrap();
    assert_eq!(node(&store, &t, 1).score, 0.0);

    store
        .record_event(&t, 1, EventType::Recognition, 30.0)
        .unwrap();
    engine.recompute(&t, true, true).unwrap();
    let x = node(&store, &t, 1);
    assert_eq!(x.score, 10.0);
    assert_eq!(x.event_bonus, 10.0);
}

#[test]
fn test_skip_events_leaves_them_pending() {
    let store = seeded(1);
    let t = tenant("org1");
    store.record_event(&t, 1, EventType::Promotion, 5.0).unwrap();
    let engine = engine_for(store.clone());

    let report = engine.recompute(&t, true, false).unwrap();
    assert_eq!(report.stats.events_processed, 0);
    assert_eq!(node(&store, &t, 1).score, 0.0);
    assert_eq!(store.list_unprocessed_events(&t).unwrap().len(), 1);
}

#[test]
fn test_inactive_edges_are_ignored() {
    let store = seeded(2);
    let t = tenant("org1");
    let engine = engine_for(store.clone());
    let edge = engine.create_edge(&t, 1, 2, 60.0).unwrap();
    store.set_edge_active(&t, edge.id, false).unwrap();

    let report = engine.recompute(&t, false, true).unwrap();
    assert_eq!(report.stats.edges_processed, 0);
    assert_eq!(node(&store, &t, 1).score, 0.0);
}

#[test]
fn test_tenants_are_isolated() {
    let store = seeded(2);
    let org1 = tenant("org1");
    let org2 = tenant("org2");
    store.upsert_node(&org2, Node::new(1, "other")).unwrap();
    store.record_event(&org2, 1, EventType::Manual, 9.0).unwrap();
    let engine = engine_for(store.clone());
    engine.create_edge(&org1, 1, 2, 40.0).unwrap();

    engine.recompute(&org1, false, true).unwrap();
    assert_eq!(node(&store, &org2, 1).score, 0.0);
    assert_eq!(store.list_unprocessed_events(&org2).unwrap().len(), 1);

    engine.recompute(&org2, false, true).unwrap();
    assert_eq!(node(&store, &org2, 1).score, 9.0);
    assert!(approx(node(&store, &org1, 1).score, 40.24));
}

#[test]
fn test_storage_failure_is_retryable() {
    let inner = MemoryStore::new();
    let t = tenant("org1");
    inner.upsert_node(&t, Node::new(1, "x")).unwrap();
    inner.record_event(&t, 1, EventType::Manual, 15.0).unwrap();
    let store = Arc::new(FlakyStore::new(inner));
    store.fail_commit.store(true, Ordering::SeqCst);
    let engine = InfluenceEngine::with_store(store.clone(), EngineConfig::default()).unwrap();

    let err = engine.recompute(&t, true, true).unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        EngineError::Recompute {
            stage: RecomputeStage::Persist,
            ..
        }
    ));
    // Nothing was consumed, so a retry applies the event once.
    assert_eq!(store.list_unprocessed_events(&t).unwrap().len(), 1);

    store.fail_commit.store(false, Ordering::SeqCst);
    engine.recompute(&t, true, true).unwrap();
    engine.recompute(&t, true, true).unwrap();
    assert_eq!(store.list_nodes(&t).unwrap()[0].score, 15.0);
}

#[test]
fn test_retry_after_failed_event_stamp_counts_event_once() {
    let inner = MemoryStore::new();
    let t = tenant("org1");
    inner.upsert_node(&t, Node::new(1, "x")).unwrap();
    inner.record_event(&t, 1, EventType::Manual, 15.0).unwrap();
    let store = Arc::new(FlakyStore::new(inner));
    store.fail_mark.store(true, Ordering::SeqCst);
    let engine = InfluenceEngine::with_store(store.clone(), EngineConfig::default()).unwrap();

    // Scores are committed, then stamping the event fails.
    let err = engine.recompute(&t, true, true).unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        EngineError::Recompute {
            stage: RecomputeStage::Persist,
            ..
        }
    ));
    let committed = store.list_nodes(&t).unwrap().remove(0);
    assert_eq!(committed.score, 15.0);
    assert_eq!(committed.folded_events, vec![1]);
    assert_eq!(store.list_unprocessed_events(&t).unwrap().len(), 1);

    let retry = engine.recompute(&t, true, true).unwrap();
    assert_eq!(retry.stats.events_processed, 1);
    let x = store.list_nodes(&t).unwrap().remove(0);
    assert_eq!(x.score, 15.0);
    assert_eq!(x.event_bonus, 15.0);
    assert!(store.list_unprocessed_events(&t).unwrap().is_empty());

    // Once stamped, the ledger is cleared and later cycles stay at 15.
    engine.recompute(&t, true, true).unwrap();
    let x = store.list_nodes(&t).unwrap().remove(0);
    assert_eq!(x.score, 15.0);
    assert!(x.folded_events.is_empty());
}

#[test]
fn test_skipping_events_keeps_folded_ledger() {
    let inner = MemoryStore::new();
    let t = tenant("org1");
    inner.upsert_node(&t, Node::new(1, "x")).unwrap();
    inner.record_event(&t, 1, EventType::Manual, 15.0).unwrap();
    let store = Arc::new(FlakyStore::new(inner));
    store.fail_mark.store(true, Ordering::SeqCst);
    let engine = InfluenceEngine::with_store(store.clone(), EngineConfig::default()).unwrap();

    assert!(engine.recompute(&t, true, true).is_err());
    // A cycle that skips events must not forget what is already counted.
    engine.recompute(&t, true, false).unwrap();
    assert_eq!(store.list_nodes(&t).unwrap()[0].folded_events, vec![1]);

    engine.recompute(&t, true, true).unwrap();
    assert_eq!(store.list_nodes(&t).unwrap()[0].score, 15.0);
}

#[test]
fn test_concurrent_recompute_same_tenant() {
    let store = seeded(1);
    let t = tenant("org1");
    store.record_event(&t, 1, EventType::Manual, 15.0).unwrap();
    let engine = Arc::new(engine_for(store.clone()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            let t = t.clone();
            thread::spawn(move || engine.recompute(&t, true, true).unwrap())
        })
        .collect();
    let consumed: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap().stats.events_processed)
        .sum();

    assert_eq!(consumed, 1);
    let x = node(&store, &t, 1);
    assert_eq!(x.score, 15.0);
    assert_eq!(x.score_history.len(), 4);
}

// ==================== Engine Facade Tests ====================

#[test]
fn test_edge_validation_errors() {
    let store = seeded(2);
    let t = tenant("org1");
    let (tx, rx) = mpsc::channel();
    let engine = InfluenceEngine::new(
        store.clone(),
        Arc::new(ResultCache::new(EngineConfig::default().cache.default_ttl())),
        Arc::new(ChannelNotifier::new(tx)),
        EngineConfig::default(),
    )
    .unwrap();

    assert!(matches!(
        engine.create_edge(&t, 1, 1, 10.0),
        Err(EngineError::SelfEdge(1))
    ));
    assert!(matches!(
        engine.create_edge(&t, 1, 2, 150.0),
        Err(EngineError::InvalidWeight(_))
    ));
    assert!(matches!(
        engine.create_edge(&t, 0, 2, 10.0),
        Err(EngineError::MissingId(_))
    ));
    assert!(matches!(
        engine.create_edge(&t, 1, 9, 10.0),
        Err(EngineError::NodeNotFound(9))
    ));
    assert!(matches!(
        engine.delete_edge(&t, 77),
        Err(EngineError::EdgeNotFound(77))
    ));

    // Rejected requests change nothing and announce nothing.
    assert!(store.list_active_edges(&t).unwrap().is_empty());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_notifications() {
    let store = seeded(2);
    let t = tenant("org1");
    let (tx, rx) = mpsc::channel();
    let engine = InfluenceEngine::new(
        store.clone(),
        Arc::new(ResultCache::new(EngineConfig::default().cache.default_ttl())),
        Arc::new(ChannelNotifier::new(tx)),
        EngineConfig::default(),
    )
    .unwrap();

    let edge = engine.create_edge(&t, 1, 2, 30.0).unwrap();
    engine.update_edge_weight(&t, edge.id, 45.0).unwrap();
    engine.recompute(&t, false, true).unwrap();
    engine.delete_edge(&t, edge.id).unwrap();

    let kinds: Vec<NotificationKind> = rx.try_iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::EdgeCreated,
            NotificationKind::EdgeUpdated,
            NotificationKind::ScoreUpdated,
            NotificationKind::EdgeDeleted,
        ]
    );
}

#[test]
fn test_score_notification_payload() {
    let store = seeded(1);
    let t = tenant("org1");
    store.record_event(&t, 1, EventType::Manual, 3.0).unwrap();
    let (tx, rx) = mpsc::channel();
    let engine = InfluenceEngine::new(
        store,
        Arc::new(ResultCache::new(EngineConfig::default().cache.default_ttl())),
        Arc::new(ChannelNotifier::new(tx)),
        EngineConfig::default(),
    )
    .unwrap();

    engine.recompute(&t, true, true).unwrap();
    let n = rx.try_recv().unwrap();
    assert_eq!(n.kind, NotificationKind::ScoreUpdated);
    assert_eq!(n.tenant, t);
    assert_eq!(n.payload["stats"]["events_processed"], 1);
    assert_eq!(n.payload["top_changes"][0]["node_id"], 1);

    let json = serde_json::to_value(&n).unwrap();
    assert_eq!(json["kind"], "SCORE_UPDATED");
}

#[test]
fn test_notifier_survives_dropped_receiver() {
    let store = seeded(2);
    let t = tenant("org1");
    let (tx, rx) = mpsc::channel();
    drop(rx);
    let engine = InfluenceEngine::new(
        store,
        Arc::new(ResultCache::new(EngineConfig::default().cache.default_ttl())),
        Arc::new(ChannelNotifier::new(tx)),
        EngineConfig::default(),
    )
    .unwrap();
    assert!(engine.create_edge(&t, 1, 2, 10.0).is_ok());
}

#[test]
fn test_graph_view_cached_and_invalidated() {
    let store = seeded(3);
    let t = tenant("org1");
    let engine = engine_for(store);
    engine.create_edge(&t, 1, 2, 80.0).unwrap();

    let first = engine.compute_graph_view(&t, false).unwrap();
    assert_eq!(first.edges.len(), 1);
    assert!(first.propagation.is_none());
    let again = engine.compute_graph_view(&t, false).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    engine.create_edge(&t, 2, 3, 50.0).unwrap();
    let fresh = engine.compute_graph_view(&t, false).unwrap();
    assert_eq!(fresh.edges.len(), 2);

    let full = engine.compute_graph_view(&t, true).unwrap();
    let propagation = full.propagation.as_ref().unwrap();
    assert!((propagation[&1].total_influence - 80.624).abs() < 1e-3);
    let edge = &full.edges[0];
    assert!(edge.decayed_weight <= edge.edge.weight);
}

#[test]
fn test_recompute_invalidates_cached_analytics() {
    let store = seeded(2);
    let t = tenant("org1");
    let engine = engine_for(store);
    engine.create_edge(&t, 1, 2, 70.0).unwrap();

    let before = engine.top_influencers(&t, InfluenceMetric::Direct, 5).unwrap();
    assert_eq!(before[0].value, 0.0);
    assert!(engine.cache().len() > 0);

    engine.recompute(&t, false, true).unwrap();
    assert!(engine.cache().is_empty());

    let after = engine.top_influencers(&t, InfluenceMetric::Direct, 5).unwrap();
    assert_eq!(after[0].node_id, 1);
    assert!(approx(after[0].value, 70.42));
    assert_eq!(after[0].rank, 1);
}

#[test]
fn test_analytics_reports() {
    let store = Arc::new(MemoryStore::new());
    let t = tenant("org1");
    for (id, group) in [(1, "eng"), (2, "eng"), (3, "sales"), (4, "sales")] {
        store
            .upsert_node(&t, Node::new(id, format!("p{}", id)).in_group(group))
            .unwrap();
    }
    let engine = engine_for(store);
    engine.create_edge(&t, 2, 1, 50.0).unwrap();
    engine.create_edge(&t, 4, 3, 50.0).unwrap();
    engine.create_edge(&t, 1, 3, 10.0).unwrap();
    engine.recompute(&t, false, true).unwrap();

    match engine.compute_analytics(&t, AnalyticsKind::Overview).unwrap().as_ref() {
        AnalyticsReport::Overview(o) => {
            assert_eq!(o.node_count, 4);
            assert_eq!(o.edge_count, 3);
            assert!(o.total_score > 0.0);
            assert!(o.top_node_id.is_some());
        }
        other => panic!("unexpected report {:?}", other),
    }

    match engine.compute_analytics(&t, AnalyticsKind::Heatmap).unwrap().as_ref() {
        AnalyticsReport::Heatmap(m) => {
            assert_eq!(m["eng"]["sales"], 10.0);
            assert!(!m.contains_key("sales"));
        }
        other => panic!("unexpected report {:?}", other),
    }

    match engine.compute_analytics(&t, AnalyticsKind::Metrics).unwrap().as_ref() {
        AnalyticsReport::Metrics(m) => assert!(approx(m.density, 3.0 / 12.0)),
        other => panic!("unexpected report {:?}", other),
    }

    match engine.compute_analytics(&t, AnalyticsKind::Top).unwrap().as_ref() {
        AnalyticsReport::Top(entries) => {
            assert_eq!(entries.len(), 4);
            assert_eq!(entries[0].value, 50.0);
        }
        other => panic!("unexpected report {:?}", other),
    }

    match engine.compute_analytics(&t, AnalyticsKind::Communities).unwrap().as_ref() {
        AnalyticsReport::Communities(communities) => {
            // Everyone ends up following node 3 through 1.
            assert_eq!(communities.len(), 1);
            assert_eq!(communities[0].label, 3);
            assert_eq!(communities[0].members, vec![1, 2, 3, 4]);
            assert!(communities[0].total_score > 100.0);
        }
        other => panic!("unexpected report {:?}", other),
    }

    assert!(AnalyticsKind::from_name("sentiment").is_err());
    for kind in AnalyticsKind::ALL {
        assert_eq!(AnalyticsKind::from_name(kind.name()).unwrap(), kind);
    }
}

#[test]
fn test_node_influence() {
    let store = seeded(3);
    let t = tenant("org1");
    let engine = InfluenceEngine::new(
        store,
        Arc::new(ResultCache::new(EngineConfig::default().cache.default_ttl())),
        Arc::new(NullNotifier),
        EngineConfig::default(),
    )
    .unwrap();
    engine.create_edge(&t, 1, 2, 80.0).unwrap();
    engine.create_edge(&t, 2, 3, 50.0).unwrap();

    let r = engine.node_influence(&t, 1).unwrap();
    assert_eq!(r.node_id, 1);
    assert!((r.total_influence - 80.624).abs() < 1e-3);

    let err = engine.node_influence(&t, 42).unwrap_err();
    assert!(err.is_not_found());
    // Failed lookups are not cached.
    assert_eq!(engine.cache().len(), 1);
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = EngineConfig::default();
    config.decay.rate_per_day = 1.5;
    let err = InfluenceEngine::with_store(Arc::new(MemoryStore::new()), config).unwrap_err();
    assert!(matches!(err, EngineError::InvalidDecayRate(_)));

    let mut config = EngineConfig::default();
    config.propagation.decay_factor = 1.0;
    let err = InfluenceEngine::with_store(Arc::new(MemoryStore::new()), config).unwrap_err();
    assert!(matches!(err, EngineError::Misconfigured(_)));
}
