//! One-shot score adjustments applied during recompute.

use serde::{Deserialize, Serialize};

use super::now_micros;

/// What happened to produce the adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A project the person drove succeeded.
    ProjectSuccess,
    /// A project the person drove failed.
    ProjectFailure,
    /// Peer recognition or endorsement.
    Recognition,
    /// Promotion or expanded responsibility.
    Promotion,
    /// Reorganisation or role change.
    RoleChange,
    /// Anything else recorded by an operator.
    Manual,
}

impl EventType {
    /// Return a human-readable name for this event type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProjectSuccess => "project_success",
            Self::ProjectFailure => "project_failure",
            Self::Recognition => "recognition",
            Self::Promotion => "promotion",
            Self::RoleChange => "role_change",
            Self::Manual => "manual",
        }
    }

    /// Parse an event type from a string name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "project_success" => Some(Self::ProjectSuccess),
            "project_failure" => Some(Self::ProjectFailure),
            "recognition" => Some(Self::Recognition),
            "promotion" => Some(Self::Promotion),
            "role_change" => Some(Self::RoleChange),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A score adjustment for one node, consumed by exactly one recompute cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceEvent {
    /// Unique identifier (assigned by the store).
    pub id: u64,
    /// Node whose score is adjusted.
    pub subject_node_id: u64,
    /// Kind of event.
    pub event_type: EventType,
    /// Signed score adjustment.
    pub weight_delta: f64,
    /// When the event was recorded (Unix epoch microseconds).
    pub created_at: u64,
    /// Set once the event has been folded into a score.
    #[serde(default)]
    pub processed_at: Option<u64>,
}

impl InfluenceEvent {
    /// Create a new unprocessed event stamped with the current time.
    pub fn new(id: u64, subject_node_id: u64, event_type: EventType, weight_delta: f64) -> Self {
        Self {
            id,
            subject_node_id,
            event_type,
            weight_delta,
            created_at: now_micros(),
            processed_at: None,
        }
    }

    /// Whether this event has already been consumed.
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}
