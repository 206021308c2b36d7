//! Node snapshots and the score updates written back after recompute.

use serde::{Deserialize, Serialize};

use super::SCORE_HISTORY_LIMIT;

/// A snapshot of one person in the influence graph.
///
/// Snapshots are owned by the store; the engine reads them and returns new
/// derived values as [`ScoreUpdate`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Department or team, if any.
    #[serde(default)]
    pub group_id: Option<String>,
    /// Last committed total influence.
    #[serde(default)]
    pub score: f64,
    /// Last committed direct influence.
    #[serde(default)]
    pub raw_score: f64,
    /// Last committed volatility.
    #[serde(default)]
    pub volatility: f64,
    /// Last committed rank (1-based, 0 = never ranked).
    #[serde(default)]
    pub rank: u32,
    /// Sum of all event deltas already folded into this node's score.
    #[serde(default)]
    pub event_bonus: f64,
    /// Events counted in `event_bonus` that the store has not yet stamped
    /// processed. A retried cycle skips these instead of counting them again.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folded_events: Vec<u64>,
    /// Recent committed scores, most recent first.
    #[serde(default)]
    pub score_history: Vec<f64>,
}

impl Node {
    /// Create a node with no score yet.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            group_id: None,
            score: 0.0,
            raw_score: 0.0,
            volatility: 0.0,
            rank: 0,
            event_bonus: 0.0,
            folded_events: Vec::new(),
            score_history: Vec::new(),
        }
    }

    /// Set the group (department).
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Apply a committed update, keeping at most [`SCORE_HISTORY_LIMIT`] samples.
    pub fn apply(&mut self, update: &ScoreUpdate) {
        self.score = update.score;
        self.raw_score = update.raw_score;
        self.volatility = update.volatility;
        self.rank = update.rank;
        self.event_bonus = update.event_bonus;
        self.folded_events.clone_from(&update.folded_events);
        self.score_history.insert(0, update.score);
        self.score_history.truncate(SCORE_HISTORY_LIMIT);
    }
}

/// New score fields for one node, produced by a recompute cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub node_id: u64,
    /// New total influence.
    pub score: f64,
    /// New direct influence.
    pub raw_score: f64,
    pub volatility: f64,
    /// Dense 1-based rank by descending score.
    pub rank: u32,
    /// Cumulative event bonus after this cycle.
    pub event_bonus: f64,
    /// Unstamped events included in `event_bonus`.
    #[serde(default)]
    pub folded_events: Vec<u64>,
}
