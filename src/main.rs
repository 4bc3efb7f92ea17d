//! Binary entry point for conflict-graph.
//!
//! This binary provides the operator CLI over the conflict graph store.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use conflict_graph::config::ConflictGraphConfig;
use conflict_graph::gc::{CacheExpiryService, JobScheduler};
use conflict_graph::models::{EntityId, EntityType, PathOptions, RelationshipType, TimeWindow};
use conflict_graph::observability::{self, InitOptions};
use conflict_graph::services::{DataAggregator, GraphService, RelationshipDetector};
use conflict_graph::storage::SqliteGraphBackend;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Conflict-of-interest detection over an entity relationship graph.
#[derive(Parser)]
#[command(name = "conflict-graph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "CONFLICT_GRAPH_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Analyze the conflict risk between a subject and an opposing party.
    Analyze {
        /// Subject entity ID (e.g. the prospective neutral).
        subject: String,

        /// Opposing party entity ID.
        opposing: String,

        /// Maximum path length.
        #[arg(short, long)]
        max_depth: Option<usize>,

        /// Skip the cached result.
        #[arg(long)]
        bypass_cache: bool,

        /// Print the full assessment as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List every path between two entities.
    Paths {
        /// Source entity ID.
        source: String,

        /// Target entity ID.
        target: String,

        /// Maximum path length.
        #[arg(short, long)]
        max_depth: Option<usize>,

        /// Relationship types to follow (comma-separated).
        #[arg(short, long, value_delimiter = ',')]
        types: Vec<String>,
    },

    /// Check direct and shared-employer lobbying ties.
    Lobbying {
        /// Subject entity ID.
        subject: String,

        /// Opposing party entity ID.
        opposing: String,
    },

    /// Show connection statistics for an entity.
    Stats {
        /// Entity ID.
        entity: String,
    },

    /// Find likely duplicate entities of one type.
    Duplicates {
        /// Entity type (neutral, organization, government_agency, ...).
        entity_type: String,
    },

    /// Merge one entity into another.
    Merge {
        /// Entity ID to keep.
        keep: String,

        /// Entity ID to fold into `keep`.
        merge: String,
    },

    /// Infer shared-employer edges for a company.
    InferEmployment {
        /// Company entity ID.
        company: String,
    },

    /// Roll up donations, lobbying or cases over a date window.
    Summary {
        /// What to summarize.
        #[arg(value_enum)]
        kind: SummaryKind,

        /// Entity ID, or the industry label for `industry`.
        subject: String,

        /// First day included (YYYY-MM-DD).
        #[arg(long)]
        from: NaiveDate,

        /// Last day included (YYYY-MM-DD).
        #[arg(long)]
        to: NaiveDate,
    },

    /// Purge expired conflict-path cache entries.
    SweepCache {
        /// Only report what would be purged.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the maintenance scheduler until Ctrl-C.
    Jobs,
}

/// Roll-up kinds.
#[derive(Clone, Copy, ValueEnum)]
enum SummaryKind {
    /// Donations made by an entity.
    Donations,
    /// Lobbying filings involving an entity.
    Lobbying,
    /// Court cases involving an entity.
    Cases,
    /// Donations from an industry.
    Industry,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.data_dir.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_config(
        &config.logging,
        InitOptions {
            verbose: cli.verbose,
        },
    ) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration: explicit file, else the default location, then env overrides.
fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<ConflictGraphConfig> {
    let config = match path {
        Some(path) => ConflictGraphConfig::load_from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => ConflictGraphConfig::load_default(),
    };
    let config = config.with_env_overrides();
    Ok(match data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}

fn open_backend(config: &ConflictGraphConfig) -> Result<Arc<SqliteGraphBackend>> {
    let path = config.database_path();
    let backend = SqliteGraphBackend::new(&path)
        .with_context(|| format!("opening graph store at {}", path.display()))?;
    Ok(Arc::new(backend))
}

/// Runs the selected command.
async fn run_command(command: Commands, config: ConflictGraphConfig) -> Result<()> {
    let backend = open_backend(&config)?;

    match command {
        Commands::Analyze {
            subject,
            opposing,
            max_depth,
            bypass_cache,
            json,
        } => {
            let service = GraphService::with_config(backend, &config);
            let mut options = path_options(&service, max_depth, &[])?;
            if bypass_cache {
                options = options.bypassing_cache();
            }
            cmd_analyze(&service, &subject, &opposing, &options, json)
        },

        Commands::Paths {
            source,
            target,
            max_depth,
            types,
        } => {
            let service = GraphService::with_config(backend, &config);
            let options = path_options(&service, max_depth, &types)?;
            let paths = service.find_paths(&EntityId::new(source), &EntityId::new(target), &options)?;
            print_json(&paths)
        },

        Commands::Lobbying { subject, opposing } => {
            let service = GraphService::with_config(backend, &config);
            let assessment = service
                .check_lobbying_conflicts(&EntityId::new(subject), &EntityId::new(opposing))?;
            print_json(&assessment)
        },

        Commands::Stats { entity } => {
            let service = GraphService::with_config(backend, &config);
            print_json(&service.get_network_stats(&EntityId::new(entity))?)
        },

        Commands::Duplicates { entity_type } => {
            let entity_type = EntityType::parse(&entity_type)
                .ok_or_else(|| anyhow!("unknown entity type: {entity_type}"))?;
            let detector = RelationshipDetector::with_config(backend, config.inference);
            print_json(&detector.find_duplicates(entity_type)?)
        },

        Commands::Merge { keep, merge } => {
            let detector = RelationshipDetector::with_config(backend, config.inference);
            let outcome =
                detector.merge_duplicate_entities(&EntityId::new(keep), &EntityId::new(merge))?;
            print_json(&outcome)
        },

        Commands::InferEmployment { company } => {
            let detector = RelationshipDetector::with_config(backend, config.inference);
            let written = detector.detect_shared_employment(&EntityId::new(company))?;
            println!("Wrote {written} shared-employer relationships");
            Ok(())
        },

        Commands::Summary {
            kind,
            subject,
            from,
            to,
        } => cmd_summary(backend, kind, &subject, TimeWindow::new(from, to)),

        Commands::SweepCache { dry_run } => {
            let result = CacheExpiryService::new(backend).sweep(dry_run)?;
            println!("{}", result.summary());
            Ok(())
        },

        Commands::Jobs => {
            let report = JobScheduler::new(backend, &config).run().await;
            print_json(&report)
        },
    }
}

fn path_options(
    service: &GraphService<SqliteGraphBackend>,
    max_depth: Option<usize>,
    types: &[String],
) -> Result<PathOptions> {
    let mut options = service.default_path_options();
    if let Some(depth) = max_depth {
        options = options.with_max_depth(depth);
    }
    if !types.is_empty() {
        let parsed = types
            .iter()
            .map(|t| t.parse::<RelationshipType>().map_err(|e| anyhow!(e)))
            .collect::<Result<Vec<_>>>()?;
        options = options.with_types(&parsed);
    }
    Ok(options)
}

fn cmd_analyze(
    service: &GraphService<SqliteGraphBackend>,
    subject: &str,
    opposing: &str,
    options: &PathOptions,
    json: bool,
) -> Result<()> {
    let assessment =
        service.analyze_conflict(&EntityId::new(subject), &EntityId::new(opposing), options)?;
    if json {
        return print_json(&assessment);
    }

    println!(
        "{} vs {}: {} (score {:.2}, {} paths{})",
        assessment.subject.name,
        assessment.opposing_party.name,
        assessment.risk_level,
        assessment.risk_score,
        assessment.total_paths,
        if assessment.from_cache { ", cached" } else { "" }
    );
    println!("{}", assessment.recommendation);
    Ok(())
}

fn cmd_summary(
    backend: Arc<SqliteGraphBackend>,
    kind: SummaryKind,
    subject: &str,
    window: TimeWindow,
) -> Result<()> {
    if subject.trim().is_empty() {
        bail!("summary subject is empty");
    }
    let aggregator = DataAggregator::new(backend);
    let id = EntityId::new(subject);
    match kind {
        SummaryKind::Donations => print_json(&aggregator.donation_summary(&id, window)?),
        SummaryKind::Lobbying => print_json(&aggregator.lobbying_summary(&id, window)?),
        SummaryKind::Cases => print_json(&aggregator.case_summary(&id, window)?),
        SummaryKind::Industry => print_json(&aggregator.industry_summary(subject, window)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
