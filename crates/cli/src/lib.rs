//! Command-line driver: load, cluster, score and write artifacts.

pub mod artifacts;
pub mod config;
mod fingerprint;
pub mod pipeline;
pub mod report;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{Overrides, RunConfig};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "attribution")]
#[command(about = "Cluster landing pages by shared keywords and rank revenue opportunities", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write every artifact into --out
    Run(RunArgs),

    /// Compare clustering under the Jaccard and co-occurrence edge rules
    Diagnose(DiagnoseArgs),

    /// Print the JSON schema of blueprints.json
    Schema,
}

#[derive(Args)]
struct InputArgs {
    /// Observation CSV
    #[arg(long)]
    input: PathBuf,

    /// Keyword taxonomy CSV (keyword, angle, category)
    #[arg(long)]
    taxonomy: PathBuf,

    /// TOML run configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Output directory
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Args)]
struct DiagnoseArgs {
    #[command(flatten)]
    inputs: InputArgs,

    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Args)]
struct OverrideArgs {
    /// Minimum distinct slugs per eligible keyword
    #[arg(long)]
    min_fanout: Option<usize>,

    /// Minimum Jaccard similarity for an edge
    #[arg(long)]
    min_jaccard: Option<f64>,

    /// Minimum shared eligible keywords for an edge
    #[arg(long)]
    min_shared: Option<usize>,

    /// Largest cluster as a share of all slugs before the run is degraded
    #[arg(long)]
    max_cluster_share: Option<f64>,

    /// Opportunities to keep
    #[arg(long)]
    top_n: Option<usize>,

    /// Extra denylist phrase (repeatable)
    #[arg(long = "deny", value_name = "PHRASE")]
    deny: Vec<String>,

    /// Drop the configured denylist; only --deny phrases apply
    #[arg(long)]
    no_default_denylist: bool,
}

impl From<OverrideArgs> for Overrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            min_fanout: args.min_fanout,
            min_jaccard: args.min_jaccard,
            min_shared: args.min_shared,
            max_cluster_share: args.max_cluster_share,
            top_n: args.top_n,
            deny: args.deny,
            no_default_denylist: args.no_default_denylist,
        }
    }
}

/// Compact result printed on stdout after `run`
#[derive(Serialize)]
struct RunSummary {
    status: &'static str,
    out_dir: PathBuf,
    clusters: usize,
    largest_cluster: usize,
    excluded_clusters: usize,
    opportunities: usize,
    artifacts: Vec<PathBuf>,
}

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn effective_config(inputs: &InputArgs, overrides: OverrideArgs) -> Result<RunConfig> {
    let mut config = RunConfig::load_or_default(inputs.config.as_deref())?;
    config.apply(&overrides.into());
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run(args: RunArgs) -> Result<()> {
    let config = effective_config(&args.inputs, args.overrides)?;
    let inputs = pipeline::load_inputs(&args.inputs.input, &args.inputs.taxonomy, &config)?;
    let output = pipeline::run_pipeline(&inputs.observations.observations, &inputs.taxonomy, &config)?;
    let report = pipeline::RunReport::new(&inputs, &output, &config)?;
    let written = artifacts::write_artifacts(&args.out, &output, &report)?;

    if output.degraded {
        log::warn!("Run finished degraded: at least one cluster is above the size ceiling");
    }

    let summary = RunSummary {
        status: if output.degraded { "degraded" } else { "ok" },
        out_dir: args.out,
        clusters: report.clusters,
        largest_cluster: report.largest_cluster,
        excluded_clusters: report.excluded_clusters,
        opportunities: report.opportunities,
        artifacts: written,
    };
    print_stdout(&serde_json::to_string_pretty(&summary)?)
}

fn diagnose(args: DiagnoseArgs) -> Result<()> {
    let config = effective_config(&args.inputs, args.overrides)?;
    let inputs = pipeline::load_inputs(&args.inputs.input, &args.inputs.taxonomy, &config)?;
    let diagnosis = pipeline::diagnose(
        &inputs.observations.observations,
        &inputs.taxonomy,
        &config.graph,
    )?;
    print_stdout(&serde_json::to_string_pretty(&diagnosis)?)
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Diagnose(args) => diagnose(args),
        Commands::Schema => print_stdout(&attribution_protocol::blueprint_schema()?),
    }
}
