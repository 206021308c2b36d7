//! Recompute pipeline: turns the current graph into committed scores.
//!
//! One cycle walks LoadInputs → ApplyDecay → Propagate → MergeEvents →
//! RankAndScore → Persist → InvalidateCache → Done. Everything before Persist
//! is a pure function of the loaded snapshots, so an aborted cycle can be
//! retried in full.
//!
//! Persist is two store calls. Each committed node carries the ids of the
//! events already counted in its bonus until they are stamped processed, so a
//! cycle that committed scores but failed to stamp its events does not count
//! them again when retried.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde::Serialize;

use crate::cache::{CacheNamespace, ResultCache};
use crate::config::EngineConfig;
use crate::graph::{propagate, PropagationResult};
use crate::store::GraphStore;
use crate::types::{EngineError, EngineResult, InfluenceEvent, Node, ScoreUpdate, TenantId};

use super::aggregate::volatility_window;
use super::decay::decay_edges;

/// Steps of one recompute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecomputeStage {
    LoadInputs,
    ApplyDecay,
    Propagate,
    MergeEvents,
    RankAndScore,
    Persist,
    InvalidateCache,
    Done,
}

impl RecomputeStage {
    /// Return a human-readable name for this stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadInputs => "load_inputs",
            Self::ApplyDecay => "apply_decay",
            Self::Propagate => "propagate",
            Self::MergeEvents => "merge_events",
            Self::RankAndScore => "rank_and_score",
            Self::Persist => "persist",
            Self::InvalidateCache => "invalidate_cache",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for RecomputeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Flags controlling one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeOptions {
    /// Replace edge weights with their time-decayed values before propagating.
    pub apply_decay: bool,
    /// Fold unprocessed events into scores and mark them consumed.
    pub process_events: bool,
}

impl Default for RecomputeOptions {
    fn default() -> Self {
        Self {
            apply_decay: true,
            process_events: true,
        }
    }
}

/// Counters for a finished cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecomputeStats {
    pub edges_processed: usize,
    pub events_processed: usize,
    pub scores_updated: usize,
}

/// A node whose score moved during the cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreChange {
    pub node_id: u64,
    pub name: String,
    pub old_score: f64,
    pub new_score: f64,
    pub delta: f64,
    pub old_rank: u32,
    pub new_rank: u32,
}

/// Result of a finished cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecomputeReport {
    pub stats: RecomputeStats,
    pub duration_ms: u64,
    /// Largest absolute score changes, biggest first.
    pub top_changes: Vec<ScoreChange>,
}

fn at(stage: RecomputeStage) -> impl FnOnce(EngineError) -> EngineError {
    move |source| EngineError::Recompute {
        stage,
        source: Box::new(source),
    }
}

/// Run one cycle for a tenant.
///
/// The caller is responsible for serializing cycles of the same tenant.
pub fn run_cycle<V: Clone + Send + 'static>(
    store: &dyn GraphStore,
    cache: &ResultCache<V>,
    config: &EngineConfig,
    tenant: &TenantId,
    options: RecomputeOptions,
    now: u64,
) -> EngineResult<RecomputeReport> {
    let started = Instant::now();

    log::debug!("recompute {}: {}", tenant, RecomputeStage::LoadInputs);
    let mut edges = store
        .list_active_edges(tenant)
        .map_err(at(RecomputeStage::LoadInputs))?;
    let nodes = store
        .list_nodes(tenant)
        .map_err(at(RecomputeStage::LoadInputs))?;
    let events = if options.process_events {
        store
            .list_unprocessed_events(tenant)
            .map_err(at(RecomputeStage::LoadInputs))?
    } else {
        Vec::new()
    };

    if options.apply_decay {
        log::debug!("recompute {}: {}", tenant, RecomputeStage::ApplyDecay);
        edges = decay_edges(&edges, config.decay.rate_per_day, now)
            .map_err(at(RecomputeStage::ApplyDecay))?;
    }

    log::debug!("recompute {}: {}", tenant, RecomputeStage::Propagate);
    let node_ids: Vec<u64> = nodes.iter().map(|n| n.id).collect();
    let results = propagate(&edges, &node_ids, &config.propagation)
        .map_err(at(RecomputeStage::Propagate))?;

    log::debug!("recompute {}: {}", tenant, RecomputeStage::MergeEvents);
    let merged = if options.process_events {
        merge_events(&nodes, &events)
    } else {
        MergedEvents::default()
    };

    log::debug!("recompute {}: {}", tenant, RecomputeStage::RankAndScore);
    let updates = rank_and_score(&nodes, &results, &merged, config.analytics.history_window);
    let changes = top_changes(&nodes, &updates, config.analytics.top_changes);

    log::debug!("recompute {}: {}", tenant, RecomputeStage::Persist);
    store
        .commit_scores(tenant, &updates)
        .map_err(at(RecomputeStage::Persist))?;
    if !merged.consumed.is_empty() {
        store
            .mark_events_processed(&merged.consumed, now)
            .map_err(at(RecomputeStage::Persist))?;
    }

    log::debug!("recompute {}: {}", tenant, RecomputeStage::InvalidateCache);
    let invalidated: usize = CacheNamespace::ALL
        .iter()
        .map(|ns| cache.delete_pattern(&ns.tenant_pattern(tenant)))
        .sum();

    let report = RecomputeReport {
        stats: RecomputeStats {
            edges_processed: edges.len(),
            events_processed: merged.consumed.len(),
            scores_updated: updates.len(),
        },
        duration_ms: started.elapsed().as_millis() as u64,
        top_changes: changes,
    };
    log::info!(
        "recompute {} {}: {} edges, {} events, {} scores, {} cache keys dropped in {}ms",
        tenant,
        RecomputeStage::Done,
        report.stats.edges_processed,
        report.stats.events_processed,
        report.stats.scores_updated,
        invalidated,
        report.duration_ms
    );
    Ok(report)
}

/// Unprocessed events resolved against each node's folded-event ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedEvents {
    /// Deltas not yet counted in a node's committed bonus, per subject node.
    pub bonuses: HashMap<u64, f64>,
    /// The ledger each node commits: every unstamped event in its bonus.
    /// Nodes without an entry keep their current ledger.
    pub folded: HashMap<u64, Vec<u64>>,
    /// Event ids to stamp processed once scores are committed.
    pub consumed: Vec<u64>,
}

/// Fold unprocessed events into per-node bonuses.
///
/// Events for unknown nodes are left alone. An event already listed in its
/// subject's `folded_events` is stamped again but adds nothing to the bonus.
pub fn merge_events(nodes: &[Node], events: &[InfluenceEvent]) -> MergedEvents {
    let by_id: HashMap<u64, &Node> = nodes.iter().map(|n| (n.id, n)).collect();
    let mut merged = MergedEvents {
        folded: nodes.iter().map(|n| (n.id, Vec::new())).collect(),
        ..MergedEvents::default()
    };

    for event in events.iter().filter(|e| !e.is_processed()) {
        let Some(node) = by_id.get(&event.subject_node_id) else {
            continue;
        };
        merged.consumed.push(event.id);
        merged.folded.entry(node.id).or_default().push(event.id);
        if !node.folded_events.contains(&event.id) {
            *merged.bonuses.entry(node.id).or_insert(0.0) += event.weight_delta;
        }
    }
    merged
}

/// Compute new scores, dense ranks and volatility for every node.
///
/// `score = direct + propagated + event bonus`, floored at 0, where the event
/// bonus is the node's already-committed bonus plus its merged deltas.
/// Updates are returned in node order.
pub fn rank_and_score(
    nodes: &[Node],
    results: &BTreeMap<u64, PropagationResult>,
    merged: &MergedEvents,
    history_window: usize,
) -> Vec<ScoreUpdate> {
    let mut updates: Vec<ScoreUpdate> = nodes
        .iter()
        .map(|node| {
            let (direct, propagated) = results
                .get(&node.id)
                .map(|r| (r.direct_influence, r.propagated_influence))
                .unwrap_or((0.0, 0.0));
            let event_bonus =
                node.event_bonus + merged.bonuses.get(&node.id).copied().unwrap_or(0.0);
            let score = (direct + propagated + event_bonus).max(0.0);
            let folded_events = merged
                .folded
                .get(&node.id)
                .unwrap_or(&node.folded_events)
                .clone();

            let mut history = Vec::with_capacity(node.score_history.len() + 1);
            history.push(score);
            history.extend_from_slice(&node.score_history);

            ScoreUpdate {
                node_id: node.id,
                score,
                raw_score: direct,
                volatility: volatility_window(&history, history_window),
                rank: 0,
                event_bonus,
                folded_events,
            }
        })
        .collect();

    let scores: Vec<(u64, f64)> = updates.iter().map(|u| (u.node_id, u.score)).collect();
    let ranks = dense_ranks(&scores);
    for update in &mut updates {
        update.rank = ranks.get(&update.node_id).copied().unwrap_or(0);
    }
    updates
}

/// Dense 1-based ranks by descending score; equal scores share a rank.
pub fn dense_ranks(scores: &[(u64, f64)]) -> HashMap<u64, u32> {
    let mut ordered: Vec<(u64, f64)> = scores.to_vec();
    ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = HashMap::with_capacity(ordered.len());
    let mut rank = 0u32;
    let mut previous: Option<f64> = None;
    for (node_id, score) in ordered {
        if previous != Some(score) {
            rank += 1;
            previous = Some(score);
        }
        ranks.insert(node_id, rank);
    }
    ranks
}

/// The `limit` nodes whose score changed most, biggest absolute change first.
pub fn top_changes(nodes: &[Node], updates: &[ScoreUpdate], limit: usize) -> Vec<ScoreChange> {
    let by_id: HashMap<u64, &Node> = nodes.iter().map(|n| (n.id, n)).collect();
    let mut changes: Vec<ScoreChange> = updates
        .iter()
        .filter_map(|u| {
            let node = by_id.get(&u.node_id)?;
            let delta = u.score - node.score;
            if delta == 0.0 && u.rank == node.rank {
                return None;
            }
            Some(ScoreChange {
                node_id: u.node_id,
                name: node.name.clone(),
                old_score: node.score,
                new_score: u.score,
                delta,
                old_rank: node.rank,
                new_rank: u.rank,
            })
        })
        .collect();
    changes.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    changes.truncate(limit);
    changes
}
