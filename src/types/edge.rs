//! The core edge struct.

use serde::{Deserialize, Serialize};

use super::{now_micros, EngineError, EngineResult, MAX_EDGE_WEIGHT};

/// A directed influence relationship between two people.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge identifier (assigned by the store).
    pub id: u64,
    /// Node exerting the influence.
    pub source_id: u64,
    /// Node being influenced.
    pub target_id: u64,
    /// Strength of the relationship in `[0, 100]`.
    pub weight: f64,
    /// When this edge was created (Unix epoch microseconds).
    pub created_at: u64,
    /// Inactive edges are kept by the store but never scored.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Edge {
    /// Create a new active edge stamped with the current time.
    pub fn new(id: u64, source_id: u64, target_id: u64, weight: f64) -> Self {
        Self::with_timestamp(id, source_id, target_id, weight, now_micros())
    }

    /// Create a new active edge with an explicit timestamp.
    pub fn with_timestamp(
        id: u64,
        source_id: u64,
        target_id: u64,
        weight: f64,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            source_id,
            target_id,
            weight,
            created_at,
            active: true,
        }
    }

    /// Check the edge invariants: distinct endpoints and weight in `[0, 100]`.
    pub fn validate(&self) -> EngineResult<()> {
        if self.source_id == self.target_id {
            return Err(EngineError::SelfEdge(self.source_id));
        }
        validate_weight(self.weight)
    }

    /// Copy of this edge carrying a different weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Reject weights outside `[0, 100]` (NaN included).
pub fn validate_weight(weight: f64) -> EngineResult<()> {
    if !(0.0..=MAX_EDGE_WEIGHT).contains(&weight) {
        return Err(EngineError::InvalidWeight(weight));
    }
    Ok(())
}
