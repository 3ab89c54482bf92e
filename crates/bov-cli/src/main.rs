use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use bov_pre_processing::{
    pipeline::{self, BuildReport},
    progress::{NoProgress, ProgressObserver},
    BuildParams, DimensionPolicy,
};
use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod progress;

use progress::ProgressBarObserver;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "bov")]
#[command(
    about = "Create a bag of vectors from a word2vec model and a tokenized corpus",
    long_about = None
)]
struct Cli {
    /// Word vectors in word2vec text format
    #[arg(short, long, value_name = "PATH")]
    model: PathBuf,

    /// Corpus root holding one directory of tokenized documents per class
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Directory receiving one matrix file per n-gram order
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    /// Largest n-gram order (natural number); overrides the config file
    #[arg(long = "n-gram", value_name = "NUM", value_parser = clap::value_parser!(u32).range(1..))]
    n_gram: Option<u32>,

    /// Output file prefix; files are named <PREFIX><order>
    #[arg(long, value_name = "STR")]
    prefix: Option<String>,

    /// JSON file with build parameters
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Drop embedding rows with the wrong dimension instead of failing
    #[arg(long)]
    skip_mismatched: bool,

    /// Aggregate documents on a single thread
    #[arg(long)]
    sequential: bool,

    /// Summary format
    #[arg(short = 'f', long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Log progress of each phase
    #[arg(long)]
    log: bool,

    /// Quiet mode (errors only, no progress bar)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    /// Human-readable summary
    Human,
    /// Summary as JSON
    Json,
}

#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Log,
    Verbose,
}

impl Verbosity {
    fn filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Log => "info",
            Self::Verbose => "debug",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = match (cli.quiet, cli.verbose, cli.log) {
        (true, _, _) => Verbosity::Quiet,
        (_, true, _) => Verbosity::Verbose,
        (_, _, true) => Verbosity::Log,
        _ => Verbosity::Normal,
    };
    init_logging(verbosity);

    let params = build_params(&cli)?;
    debug!(?params, "Build parameters");
    let start = Instant::now();

    let show_progress = !cli.no_progress && !matches!(verbosity, Verbosity::Quiet);
    let report = if show_progress {
        let observer = ProgressBarObserver::new("Building bag of vectors");
        run(&cli, &params, &observer)?
    } else {
        run(&cli, &params, &NoProgress)?
    };

    output_report(&report, &cli, start)?;
    Ok(())
}

/// `RUST_LOG` wins over the command line flags.
fn init_logging(verbosity: Verbosity) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file first, then command line overrides.
fn build_params(cli: &Cli) -> Result<BuildParams> {
    let mut params = match &cli.config {
        Some(path) => BuildParams::from_json_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => BuildParams::default(),
    };

    if let Some(n) = cli.n_gram {
        params = params.with_max_order(n as usize);
    }
    if let Some(prefix) = &cli.prefix {
        params = params.with_output_prefix(prefix.clone());
    }
    if cli.skip_mismatched {
        params = params.with_dimension_policy(DimensionPolicy::Skip);
    }
    if cli.sequential {
        params = params.with_parallel(false);
    }
    params.validate().context("Invalid build parameters")?;
    Ok(params)
}

fn run(cli: &Cli, params: &BuildParams, observer: &dyn ProgressObserver) -> Result<BuildReport> {
    pipeline::run(&cli.model, &cli.input, &cli.output, params, observer).with_context(|| {
        format!(
            "Failed to build bag of vectors from {} with model {}",
            cli.input.display(),
            cli.model.display()
        )
    })
}

fn output_report(report: &BuildReport, cli: &Cli, start: Instant) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(report)?);
        }
        OutputFormat::Human => {
            println!(
                "Documents: {}  Dimension: {}  Vocabulary: {}",
                report.num_documents, report.dimension, report.vocab_size
            );
            if report.skipped_table_rows > 0 {
                println!("Skipped embedding rows: {}", report.skipped_table_rows);
            }
            for order in &report.orders {
                let status = if order.kept { "KEPT" } else { "REMOVED" };
                println!(
                    "{}\t{status}\t(zero vectors: {})",
                    order.path.display(),
                    order.empty_rows
                );
            }
            println!("Elapsed: {:.1?}", start.elapsed());
        }
    }
    Ok(())
}
