//! Engine configuration with TOML persistence.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::decay::{validate_rate, DEFAULT_DECAY_RATE};
use crate::graph::{CommunityParams, PropagationParams};
use crate::types::{EngineError, EngineResult, SCORE_HISTORY_LIMIT};

/// Largest accepted cache TTL or sweep interval: one year.
pub const MAX_CACHE_SECS: u64 = 365 * 24 * 60 * 60;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Propagation depth, hop attenuation and pruning threshold
    pub propagation: PropagationParams,

    /// Time decay of edge weights
    pub decay: DecayConfig,

    /// Result cache lifetimes
    pub cache: CacheConfig,

    /// Ranking and reporting
    pub analytics: AnalyticsConfig,

    /// Label propagation
    pub community: CommunityParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Fraction of weight lost per day, in [0, 1)
    pub rate_per_day: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for entries stored without an explicit one
    pub default_ttl_secs: u64,

    /// TTL for graph views and per-node results
    pub graph_ttl_secs: u64,

    /// TTL for analytics reports
    pub analytics_ttl_secs: u64,

    /// How often the background sweeper evicts expired entries
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Entries in top-influencer and volatility reports
    pub top_limit: usize,

    /// Score samples used for volatility
    pub history_window: usize,

    /// Entries in the recompute change report
    pub top_changes: usize,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            rate_per_day: DEFAULT_DECAY_RATE,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            graph_ttl_secs: 60,
            analytics_ttl_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn graph_ttl(&self) -> Duration {
        Duration::from_secs(self.graph_ttl_secs)
    }

    pub fn analytics_ttl(&self) -> Duration {
        Duration::from_secs(self.analytics_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_limit: 10,
            history_window: SCORE_HISTORY_LIMIT,
            top_changes: 10,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject settings that would break the engine's bounds.
    pub fn validate(&self) -> EngineResult<()> {
        self.propagation.validate()?;
        validate_rate(self.decay.rate_per_day)?;
        if self.cache.sweep_interval_secs == 0 {
            return Err(EngineError::Misconfigured(
                "cache.sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        for (name, secs) in [
            ("default_ttl_secs", self.cache.default_ttl_secs),
            ("graph_ttl_secs", self.cache.graph_ttl_secs),
            ("analytics_ttl_secs", self.cache.analytics_ttl_secs),
            ("sweep_interval_secs", self.cache.sweep_interval_secs),
        ] {
            if secs > MAX_CACHE_SECS {
                return Err(EngineError::Misconfigured(format!(
                    "cache.{} must be at most {}, got {}",
                    name, MAX_CACHE_SECS, secs
                )));
            }
        }
        if self.analytics.history_window == 0
            || self.analytics.history_window > SCORE_HISTORY_LIMIT
        {
            return Err(EngineError::Misconfigured(format!(
                "analytics.history_window must be in 1..={}, got {}",
                SCORE_HISTORY_LIMIT, self.analytics.history_window
            )));
        }
        Ok(())
    }
}
