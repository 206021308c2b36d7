//! All data types for the influence engine.

pub mod edge;
pub mod error;
pub mod event;
pub mod node;
pub mod tenant;

pub use edge::Edge;
pub use error::{EngineError, EngineResult};
pub use event::{EventType, InfluenceEvent};
pub use node::{Node, ScoreUpdate};
pub use tenant::TenantId;

/// Upper bound of an edge weight (weights live in `[0, MAX_EDGE_WEIGHT]`).
pub const MAX_EDGE_WEIGHT: f64 = 100.0;

/// Number of recent score samples kept per node and used for volatility.
pub const SCORE_HISTORY_LIMIT: usize = 30;

/// Microseconds in one day.
pub const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// Returns the current time as Unix epoch microseconds.
pub fn now_micros() -> u64 {
    chrono::Utc::now().timestamp_micros() as u64
}
