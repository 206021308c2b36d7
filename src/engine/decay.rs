//! Time decay of edge weights.

use crate::types::{Edge, EngineError, EngineResult, MICROS_PER_DAY};

/// Default fraction of weight lost per day.
pub const DEFAULT_DECAY_RATE: f64 = 0.05;

/// Calculate the decayed weight of an edge.
///
/// Formula: weight * (1 - rate) ^ days_elapsed
///
/// - days_elapsed: fractional days between `created_at` and `now`, floored at 0
/// - rate: fraction lost per day, in `[0, 1)`
///
/// A timestamp in the future counts as zero elapsed time.
pub fn decayed_weight(weight: f64, created_at: u64, rate: f64, now: u64) -> EngineResult<f64> {
    validate_rate(rate)?;
    let elapsed_micros = now.saturating_sub(created_at) as f64;
    let days = elapsed_micros / MICROS_PER_DAY;
    if days == 0.0 {
        return Ok(weight);
    }
    Ok(weight * (1.0 - rate).powf(days))
}

/// Reject decay rates outside `[0, 1)`.
pub fn validate_rate(rate: f64) -> EngineResult<()> {
    if !(0.0..1.0).contains(&rate) {
        return Err(EngineError::InvalidDecayRate(rate));
    }
    Ok(())
}

/// Copy of `edges` with every weight replaced by its decayed value.
pub fn decay_edges(edges: &[Edge], rate: f64, now: u64) -> EngineResult<Vec<Edge>> {
    validate_rate(rate)?;
    edges
        .iter()
        .map(|e| Ok(e.with_weight(decayed_weight(e.weight, e.created_at, rate, now)?)))
        .collect()
}
