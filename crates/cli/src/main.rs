//! Command line front end: inspect what a harvest would change in the
//! catalog, or merge a batch of works into it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use bibmerge_core::{MergeConfig, Record};
use bibmerge_engine::{Merger, Work};
use bibmerge_storage::{Catalog, SqliteCatalog, UpsertOutcome, diff_timestamps, load_harvest_timestamps};

/// Priority-based merger of bibliographic source records.
#[derive(Parser, Debug)]
#[command(name = "bibmerge")]
#[command(about = "Merges partial bibliographic records into a catalog")]
struct Args {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show which works a harvest adds, modifies and deletes
    Status {
        /// Catalog database file
        #[arg(long, env = "BIBMERGE_CATALOG")]
        catalog: String,

        /// Timestamp files, least important first
        #[arg(long = "timestamps", required = true, num_args = 1..)]
        timestamps: Vec<PathBuf>,

        /// Mapping of eprints to their published identifiers
        #[arg(long)]
        published_eprints: Option<PathBuf>,
    },
    /// Merge the works of a JSON file and store them in the catalog
    Merge {
        /// Merge configuration (TOML); built-in defaults when omitted
        #[arg(long, env = "BIBMERGE_CONFIG")]
        config: Option<PathBuf>,

        /// Catalog database file
        #[arg(long, env = "BIBMERGE_CATALOG")]
        catalog: String,

        /// Works to merge: identifier -> { timestamp, sources }
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Deserialize, Debug)]
struct InputWork {
    timestamp: String,
    sources: Vec<Record>,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.log_json);

    if let Err(e) = run(args) {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        Command::Status {
            catalog,
            timestamps,
            published_eprints,
        } => status(&catalog, &timestamps, published_eprints),
        Command::Merge {
            config,
            catalog,
            input,
        } => merge(config, &catalog, input),
    }
}

fn status(
    catalog: &str,
    files: &[PathBuf],
    published_eprints: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = SqliteCatalog::open(catalog)?;
    let harvest = load_harvest_timestamps(files, published_eprints.as_deref())?;
    let status = diff_timestamps(&harvest, &catalog.timestamps()?);

    println!("added:    {}", status.added.len());
    println!("modified: {}", status.modified.len());
    println!("deleted:  {}", status.deleted.len());
    Ok(())
}

fn merge(config: Option<PathBuf>, catalog: &str, input: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &config {
        Some(path) => MergeConfig::load(path)?,
        None => MergeConfig::default(),
    };
    let merger = Merger::new(config)?;

    let text = std::fs::read_to_string(&input)?;
    let input: BTreeMap<String, InputWork> = serde_json::from_str(&text)?;
    info!(works = input.len(), "loaded input");

    let mut timestamps = BTreeMap::new();
    let works: Vec<Work> = input
        .into_iter()
        .map(|(identifier, work)| {
            timestamps.insert(identifier.clone(), work.timestamp);
            Work::new(identifier, work.sources)
        })
        .collect();

    let report = merger.merge_batch(&works);

    let mut catalog = SqliteCatalog::open(catalog)?;
    let (mut inserted, mut updated, mut unchanged) = (0usize, 0usize, 0usize);
    for outcome in &report.merged {
        let timestamp = timestamps.get(&outcome.identifier).map(String::as_str).unwrap_or_default();
        let stored = catalog.store_merged(
            &outcome.identifier,
            timestamp,
            &outcome.record,
            &outcome.violations,
            &outcome.skipped_tags(),
        )?;
        match stored {
            UpsertOutcome::Inserted(_) => inserted += 1,
            UpsertOutcome::Updated(_) => updated += 1,
            UpsertOutcome::Unchanged(_) => unchanged += 1,
        }
    }

    println!("inserted:   {inserted}");
    println!("updated:    {updated}");
    println!("unchanged:  {unchanged}");
    println!("degraded:   {}", report.degraded_count());
    println!("violations: {}", report.violation_count());
    println!("failed:     {}", report.failed.len());
    for (identifier, e) in &report.failed {
        println!("  {identifier}: {e}");
    }
    Ok(())
}
