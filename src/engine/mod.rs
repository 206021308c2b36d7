//! High-level operations: decay, aggregation, analytics, recompute and the engine facade.

pub mod aggregate;
pub mod analytics;
pub mod decay;
pub mod recompute;
pub mod service;

pub use aggregate::{
    department_matrix, graph_metrics, top_influencers, volatility, DepartmentMatrix, GraphMetrics,
    InfluenceMetric,
};
pub use analytics::{AnalyticsKind, AnalyticsReport, Community, InfluencerEntry, Overview};
pub use decay::{decayed_weight, DEFAULT_DECAY_RATE};
pub use recompute::{
    RecomputeOptions, RecomputeReport, RecomputeStage, RecomputeStats, ScoreChange,
};
pub use service::{CachedView, EdgeView, GraphView, InfluenceEngine};
