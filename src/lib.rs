//! Influence engine: time-decayed, propagated influence scores over a
//! weighted directed graph of people.
//!
//! Edges are influence relationships with weights in `[0, 100]`. The engine
//! propagates influence along them with per-hop decay, ranks people, derives
//! department and community views, and caches the results per tenant.

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod graph;
pub mod notify;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root
pub use cache::{CacheNamespace, CacheStats, ResultCache};
pub use config::EngineConfig;
pub use engine::{
    AnalyticsKind, AnalyticsReport, GraphView, InfluenceEngine, InfluenceMetric, RecomputeOptions,
    RecomputeReport, RecomputeStage,
};
pub use graph::{
    detect_communities, propagate, Adjacency, CommunityParams, GraphBuilder, PropagationParams,
    PropagationResult,
};
pub use notify::{ChannelNotifier, LogNotifier, Notification, NotificationKind, Notifier, NullNotifier};
pub use store::{GraphStore, MemoryStore};
pub use types::{
    now_micros, Edge, EngineError, EngineResult, EventType, InfluenceEvent, Node, ScoreUpdate,
    TenantId, MAX_EDGE_WEIGHT, SCORE_HISTORY_LIMIT,
};
