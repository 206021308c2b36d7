//! CLI entry point for the `infl` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use influence_engine::cli::commands;
use influence_engine::engine::{AnalyticsKind, InfluenceMetric};
use influence_engine::types::{EventType, TenantId};
use influence_engine::{EngineConfig, EngineError};

#[derive(Parser)]
#[command(
    name = "infl",
    about = "Influence engine CLI: decayed, propagated influence scores over a people graph"
)]
struct Cli {
    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text")]
    format: String,

    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tenant scope to operate on
    #[arg(long, default_value = "default")]
    tenant: String,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty snapshot file
    Init {
        /// Path to the snapshot file to create
        file: PathBuf,
    },
    /// Add or replace a person
    AddNode {
        /// Path to the snapshot file
        file: PathBuf,
        /// Node ID (non-zero)
        id: u64,
        /// Display name
        name: String,
        /// Department or group
        #[arg(long)]
        group: Option<String>,
    },
    /// Add an influence edge between two people
    Link {
        /// Path to the snapshot file
        file: PathBuf,
        /// Source node ID
        source_id: u64,
        /// Target node ID
        target_id: u64,
        /// Edge weight 0-100
        #[arg(long, default_value = "50")]
        weight: f64,
    },
    /// Change the weight of an edge
    Reweight {
        /// Path to the snapshot file
        file: PathBuf,
        /// Edge ID
        edge_id: u64,
        /// New weight 0-100
        weight: f64,
    },
    /// Remove an edge
    Unlink {
        /// Path to the snapshot file
        file: PathBuf,
        /// Edge ID
        edge_id: u64,
    },
    /// Record a score-adjusting event for a person
    Event {
        /// Path to the snapshot file
        file: PathBuf,
        /// Subject node ID
        node_id: u64,
        /// Event type: project_success, project_failure, recognition, promotion, role_change, manual
        #[arg(value_name = "TYPE")]
        event_type: String,
        /// Score delta, may be negative
        #[arg(allow_negative_numbers = true)]
        delta: f64,
    },
    /// Show propagated influence
    Propagate {
        /// Path to the snapshot file
        file: PathBuf,
        /// Only this node
        #[arg(long)]
        node: Option<u64>,
        /// Print every explored path
        #[arg(long)]
        paths: bool,
    },
    /// Build an analytics report
    Analytics {
        /// Path to the snapshot file
        file: PathBuf,
        /// Report: overview, top, heatmap, volatility, metrics, communities
        #[arg(default_value = "overview")]
        kind: String,
    },
    /// Rank people by a metric
    Top {
        /// Path to the snapshot file
        file: PathBuf,
        /// Metric: total, direct, propagated, volatility
        #[arg(long, default_value = "total")]
        metric: String,
        /// Maximum entries
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Recompute and commit scores
    Recompute {
        /// Path to the snapshot file
        file: PathBuf,
        /// Propagate over raw weights instead of decayed ones
        #[arg(long)]
        no_decay: bool,
        /// Leave pending events untouched
        #[arg(long)]
        skip_events: bool,
    },
    /// Summary of every tenant in a snapshot
    Stats {
        /// Path to the snapshot file
        file: PathBuf,
    },
    /// Print the effective configuration, or write it to a file
    Config {
        /// Write to this path instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let json = cli.format == "json";

    if cli.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid config {}: {}", path.display(), e);
                process::exit(2);
            }
        },
        None => EngineConfig::default(),
    };

    let tenant: TenantId = match cli.tenant.parse() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(3);
        }
    };

    let result = match cli.command {
        Commands::Init { file } => commands::cmd_init(&file),
        Commands::AddNode {
            file,
            id,
            name,
            group,
        } => commands::cmd_add_node(&file, &tenant, id, &name, group, json),
        Commands::Link {
            file,
            source_id,
            target_id,
            weight,
        } => commands::cmd_link(&file, &tenant, source_id, target_id, weight, &config, json),
        Commands::Reweight {
            file,
            edge_id,
            weight,
        } => commands::cmd_reweight(&file, &tenant, edge_id, weight, &config, json),
        Commands::Unlink { file, edge_id } => {
            commands::cmd_unlink(&file, &tenant, edge_id, &config, json)
        }
        Commands::Event {
            file,
            node_id,
            event_type,
            delta,
        } => {
            let et = match EventType::from_name(&event_type) {
                Some(et) => et,
                None => {
                    eprintln!("Invalid event type: {}", event_type);
                    process::exit(3);
                }
            };
            commands::cmd_event(&file, &tenant, node_id, et, delta, json)
        }
        Commands::Propagate { file, node, paths } => {
            commands::cmd_propagate(&file, &tenant, node, paths, &config, json)
        }
        Commands::Analytics { file, kind } => AnalyticsKind::from_name(&kind)
            .and_then(|k| commands::cmd_analytics(&file, &tenant, k, &config, json)),
        Commands::Top {
            file,
            metric,
            limit,
        } => InfluenceMetric::from_name(&metric)
            .and_then(|m| commands::cmd_top(&file, &tenant, m, limit, &config, json)),
        Commands::Recompute {
            file,
            no_decay,
            skip_events,
        } => commands::cmd_recompute(&file, &tenant, !no_decay, !skip_events, &config, json),
        Commands::Stats { file } => commands::cmd_stats(&file, json),
        Commands::Config { output } => commands::cmd_config(output.as_deref(), &config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = match &e {
            EngineError::Io(_) => 1,
            EngineError::Json(_) | EngineError::ConfigParse(_) | EngineError::ConfigWrite(_) => 2,
            e if e.is_invalid_input() => 3,
            e if e.is_not_found() => 4,
            _ => 5,
        };
        process::exit(code);
    }
}
