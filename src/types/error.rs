//! Error types for the influence engine.

use thiserror::Error;

use crate::engine::recompute::RecomputeStage;

/// All errors that can occur in the influence engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Self-edge not allowed.
    #[error("Self-edge not allowed on node {0}")]
    SelfEdge(u64),

    /// Edge weight outside `[0, 100]`.
    #[error("Weight value out of range [0, 100]: {0}")]
    InvalidWeight(f64),

    /// Decay rate outside `[0, 1)`.
    #[error("Decay rate out of range [0, 1): {0}")]
    InvalidDecayRate(f64),

    /// A required identifier was missing or zero.
    #[error("Missing required id: {0}")]
    MissingId(&'static str),

    /// Tenant scope is empty or contains reserved characters.
    #[error("Malformed tenant scope: {0:?}")]
    InvalidTenant(String),

    /// Unknown analytics kind or metric name.
    #[error("Unknown {kind}: {value}")]
    UnknownName { kind: &'static str, value: String },

    /// Node not found by ID.
    #[error("Node ID {0} not found")]
    NodeNotFound(u64),

    /// Edge not found by ID.
    #[error("Edge ID {0} not found")]
    EdgeNotFound(u64),

    /// Parameters that would break the termination bounds of the engine.
    #[error("Misconfiguration: {0}")]
    Misconfigured(String),

    /// The graph store failed to load or persist.
    #[error("Storage failure: {0}")]
    Storage(String),

    /// A recompute cycle aborted at a given stage.
    #[error("Recompute aborted during {stage}: {source}")]
    Recompute {
        stage: RecomputeStage,
        #[source]
        source: Box<EngineError>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON snapshot error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config could not be serialized.
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}

impl EngineError {
    /// Whether the caller may retry the failed operation as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(_) | Self::Io(_) => true,
            Self::Recompute { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Whether the error was caused by caller input.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::SelfEdge(_)
            | Self::InvalidWeight(_)
            | Self::InvalidDecayRate(_)
            | Self::MissingId(_)
            | Self::InvalidTenant(_)
            | Self::UnknownName { .. } => true,
            Self::Recompute { source, .. } => source.is_invalid_input(),
            _ => false,
        }
    }

    /// Whether the error refers to an unknown node or edge.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NodeNotFound(_) | Self::EdgeNotFound(_) => true,
            Self::Recompute { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Convenience result type for influence engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
