//! CLI command implementations.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::engine::{AnalyticsKind, AnalyticsReport, InfluenceEngine, InfluenceMetric};
use crate::notify::LogNotifier;
use crate::store::{GraphStore, MemoryStore};
use crate::types::{EngineResult, EventType, Node, TenantId};

/// Open a snapshot file and bind an engine to it.
///
/// The CLI is short-lived, so the cache runs without a sweeper.
pub fn open_engine(
    path: &Path,
    config: &EngineConfig,
) -> EngineResult<(Arc<MemoryStore>, InfluenceEngine)> {
    let store = Arc::new(MemoryStore::open(path)?);
    let cache = Arc::new(ResultCache::new(config.cache.default_ttl()));
    let engine = InfluenceEngine::new(
        store.clone(),
        cache,
        Arc::new(LogNotifier),
        config.clone(),
    )?;
    Ok((store, engine))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> EngineResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Create a new empty snapshot file.
pub fn cmd_init(path: &Path) -> EngineResult<()> {
    MemoryStore::new().save(path)?;
    println!("Created {}", path.display());
    Ok(())
}

/// Add or replace a person.
pub fn cmd_add_node(
    path: &Path,
    tenant: &TenantId,
    id: u64,
    name: &str,
    group: Option<String>,
    json: bool,
) -> EngineResult<()> {
    let store = MemoryStore::open(path)?;
    let mut node = Node::new(id, name);
    node.group_id = group;
    store.upsert_node(tenant, node.clone())?;
    store.save(path)?;

    if json {
        print_json(&node)?;
    } else {
        println!("Added node {} ({}) to {}", id, name, tenant);
    }
    Ok(())
}

/// Add an edge between two people.
pub fn cmd_link(
    path: &Path,
    tenant: &TenantId,
    source_id: u64,
    target_id: u64,
    weight: f64,
    config: &EngineConfig,
    json: bool,
) -> EngineResult<()> {
    let (store, engine) = open_engine(path, config)?;
    let edge = engine.create_edge(tenant, source_id, target_id, weight)?;
    store.save(path)?;

    if json {
        print_json(&edge)?;
    } else {
        println!(
            "Linked {} --{:.1}--> {} (edge {})",
            source_id, weight, target_id, edge.id
        );
    }
    Ok(())
}

/// Change an edge's weight.
pub fn cmd_reweight(
    path: &Path,
    tenant: &TenantId,
    edge_id: u64,
    weight: f64,
    config: &EngineConfig,
    json: bool,
) -> EngineResult<()> {
    let (store, engine) = open_engine(path, config)?;
    let edge = engine.update_edge_weight(tenant, edge_id, weight)?;
    store.save(path)?;

    if json {
        print_json(&edge)?;
    } else {
        println!("Edge {} now weighs {:.1}", edge.id, edge.weight);
    }
    Ok(())
}

/// Remove an edge.
pub fn cmd_unlink(
    path: &Path,
    tenant: &TenantId,
    edge_id: u64,
    config: &EngineConfig,
    json: bool,
) -> EngineResult<()> {
    let (store, engine) = open_engine(path, config)?;
    let edge = engine.delete_edge(tenant, edge_id)?;
    store.save(path)?;

    if json {
        print_json(&edge)?;
    } else {
        println!(
            "Removed edge {} ({} -> {})",
            edge.id, edge.source_id, edge.target_id
        );
    }
    Ok(())
}

/// Record a one-shot score adjustment.
pub fn cmd_event(
    path: &Path,
    tenant: &TenantId,
    node_id: u64,
    event_type: EventType,
    delta: f64,
    json: bool,
) -> EngineResult<()> {
    let store = MemoryStore::open(path)?;
    let event = store.record_event(tenant, node_id, event_type, delta)?;
    store.save(path)?;

    if json {
        print_json(&event)?;
    } else {
        println!(
            "Recorded event {} ({}, {:+.1}) for node {}",
            event.id, event_type, delta, node_id
        );
    }
    Ok(())
}

/// Show propagated influence for one node or the whole tenant.
pub fn cmd_propagate(
    path: &Path,
    tenant: &TenantId,
    node_id: Option<u64>,
    show_paths: bool,
    config: &EngineConfig,
    json: bool,
) -> EngineResult<()> {
    let (_, engine) = open_engine(path, config)?;
    let results = match node_id {
        Some(id) => vec![(*engine.node_influence(tenant, id)?).clone()],
        None => engine
            .compute_graph_view(tenant, true)?
            .propagation
            .as_ref()
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default(),
    };

    if json {
        print_json(&results)?;
    } else {
        for result in &results {
            println!(
                "Node {}: direct {:.3}, propagated {:.3}, total {:.3}",
                result.node_id,
                result.direct_influence,
                result.propagated_influence,
                result.total_influence
            );
            if show_paths {
                for route in result.paths.iter().skip(1) {
                    let hops: Vec<String> = route.path.iter().map(|id| id.to_string()).collect();
                    println!(
                        "  [depth {}] {} ({:.4})",
                        route.depth,
                        hops.join(" -> "),
                        route.weight
                    );
                }
            }
        }
        println!("\n{} nodes", results.len());
    }
    Ok(())
}

/// Print one analytics report.
pub fn cmd_analytics(
    path: &Path,
    tenant: &TenantId,
    kind: AnalyticsKind,
    config: &EngineConfig,
    json: bool,
) -> EngineResult<()> {
    let (_, engine) = open_engine(path, config)?;
    let report = engine.compute_analytics(tenant, kind)?;

    if json {
        print_json(report.as_ref())?;
        return Ok(());
    }

    match report.as_ref() {
        AnalyticsReport::Overview(o) => {
            println!("Nodes: {}", o.node_count);
            println!("Edges: {}", o.edge_count);
            println!("Total score: {:.2}", o.total_score);
            println!("Average score: {:.2}", o.average_score);
            println!("Max score: {:.2}", o.max_score);
            println!("Density: {:.4}", o.density);
            println!("Communities: {}", o.community_count);
            if let Some(id) = o.top_node_id {
                println!("Top node: {}", id);
            }
        }
        AnalyticsReport::Top(entries) | AnalyticsReport::Volatility(entries) => {
            for (i, e) in entries.iter().enumerate() {
                println!(
                    "{:>3}. Node {} ({}): {:.3}",
                    i + 1,
                    e.node_id,
                    e.name,
                    e.value
                );
            }
        }
        AnalyticsReport::Heatmap(matrix) => {
            for (source, row) in matrix {
                for (target, weight) in row {
                    println!("{} -> {}: {:.2}", source, target, weight);
                }
            }
        }
        AnalyticsReport::Metrics(m) => {
            println!("Nodes: {}", m.node_count);
            println!("Edges: {}", m.edge_count);
            println!("Density: {:.4}", m.density);
            println!("Clustering: {:.4}", m.clustering);
        }
        AnalyticsReport::Communities(communities) => {
            for c in communities {
                println!(
                    "Community {} ({} members, score {:.2}): {:?}",
                    c.label,
                    c.members.len(),
                    c.total_score,
                    c.members
                );
            }
        }
    }
    Ok(())
}

/// Rank people by a chosen metric.
pub fn cmd_top(
    path: &Path,
    tenant: &TenantId,
    metric: InfluenceMetric,
    limit: usize,
    config: &EngineConfig,
    json: bool,
) -> EngineResult<()> {
    let (_, engine) = open_engine(path, config)?;
    let entries = engine.top_influencers(tenant, metric, limit)?;

    if json {
        print_json(entries.as_ref())?;
    } else {
        for (i, e) in entries.iter().enumerate() {
            println!(
                "{:>3}. Node {} ({}) {}: {:.3}",
                i + 1,
                e.node_id,
                e.name,
                metric,
                e.value
            );
        }
    }
    Ok(())
}

/// Run a recompute cycle and write the new scores back.
pub fn cmd_recompute(
    path: &Path,
    tenant: &TenantId,
    apply_decay: bool,
    process_events: bool,
    config: &EngineConfig,
    json: bool,
) -> EngineResult<()> {
    let (store, engine) = open_engine(path, config)?;
    let report = engine.recompute(tenant, apply_decay, process_events)?;
    store.save(path)?;

    if json {
        print_json(&report)?;
    } else {
        println!("Edges processed: {}", report.stats.edges_processed);
        println!("Events processed: {}", report.stats.events_processed);
        println!("Scores updated: {}", report.stats.scores_updated);
        println!("Duration: {}ms", report.duration_ms);
        if !report.top_changes.is_empty() {
            println!("Top changes:");
            for c in &report.top_changes {
                println!(
                    "  Node {} ({}): {:.2} -> {:.2} ({:+.2}), rank {} -> {}",
                    c.node_id, c.name, c.old_score, c.new_score, c.delta, c.old_rank, c.new_rank
                );
            }
        }
    }
    Ok(())
}

/// Summary of every tenant in the snapshot.
pub fn cmd_stats(path: &Path, json: bool) -> EngineResult<()> {
    let store = MemoryStore::open(path)?;
    let mut rows = Vec::new();
    for tenant in store.tenants()? {
        let graph = store.tenant(&tenant)?;
        let pending = store.list_unprocessed_events(&tenant)?.len();
        rows.push(serde_json::json!({
            "tenant": tenant.as_str(),
            "nodes": graph.nodes.len(),
            "edges": graph.edges.len(),
            "active_edges": graph.edges.iter().filter(|e| e.active).count(),
            "events": graph.events.len(),
            "pending_events": pending,
        }));
    }

    if json {
        print_json(&rows)?;
    } else {
        println!("File: {}", path.display());
        for row in &rows {
            println!(
                "Tenant {}: {} nodes, {} edges ({} active), {} events ({} pending)",
                row["tenant"].as_str().unwrap_or_default(),
                row["nodes"],
                row["edges"],
                row["active_edges"],
                row["events"],
                row["pending_events"]
            );
        }
    }
    Ok(())
}

/// Print the default configuration, or write it to a file.
pub fn cmd_config(output: Option<&Path>, config: &EngineConfig) -> EngineResult<()> {
    match output {
        Some(path) => {
            config.save(path)?;
            println!("Wrote {}", path.display());
        }
        None => {
            let text = toml::to_string_pretty(config)?;
            print!("{}", text);
        }
    }
    Ok(())
}
