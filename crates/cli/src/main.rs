//! Pipeline / memory-hierarchy simulator CLI.
//!
//! This binary provides a single entry point for the harness. It performs:
//! 1. **Run:** Load a JSON configuration, apply command-line overrides, load one listing
//!    per thread context and simulate until every workload exits or the tick budget
//!    runs out.
//! 2. **Check:** Validate a configuration and its workloads without simulating.
//!
//! The process exit code is the workload's exit code, 139 when a thread faulted, 124
//! when the tick budget ran out and 1 for configuration or workload errors.

mod loader;

use std::path::PathBuf;
use std::{fs, process};

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use pipesim_core::common::ConfigError;
use pipesim_core::config::{BranchPredictor, Config, CoreType};
use pipesim_core::{Simulator, System, Workload};

use crate::loader::ListingLoader;

#[derive(Parser, Debug)]
#[command(
    name = "pipesim",
    author,
    version,
    about = "Cycle-level pipeline and memory-hierarchy simulator",
    long_about = "Simulate one or more workload listings on a configurable core (in-order or \
out-of-order, 1-8 hardware threads) backed by L1 caches, an optional L2, buses, DRAM and an \
interrupt controller.\n\nExamples:\n  pipesim run -c configs/base.json prog.s\n  pipesim run \
--threads 2 --core-type in-order a.s 'b.s 10 20'\n  pipesim check -c configs/smt.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate the configured workloads.
    Run(RunArgs),

    /// Validate configuration and workloads, then exit.
    Check(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON configuration file. Defaults are used for missing keys.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workloads, one per thread context: `path [numeric args...]`. Replaces
    /// `workloadPaths` from the configuration.
    workloads: Vec<String>,

    /// Hardware thread contexts.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Pipeline organisation.
    #[arg(long, value_enum)]
    core_type: Option<CoreTypeArg>,

    /// Branch predictor.
    #[arg(long, value_enum)]
    branch_predictor: Option<PredictorArg>,

    /// Stop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Statistics sections to print (summary, threads, branch, memory). Repeatable.
    #[arg(long = "stats", value_name = "SECTION")]
    stats: Vec<String>,

    /// Skip the statistics dump.
    #[arg(long)]
    quiet: bool,

    /// Log every commit and memory transaction (same as `RUST_LOG=trace`).
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CoreTypeArg {
    InOrder,
    OutOfOrder,
}

impl From<CoreTypeArg> for CoreType {
    fn from(arg: CoreTypeArg) -> Self {
        match arg {
            CoreTypeArg::InOrder => Self::InOrder,
            CoreTypeArg::OutOfOrder => Self::OutOfOrder,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PredictorArg {
    Null,
    Local,
}

impl From<PredictorArg> for BranchPredictor {
    fn from(arg: PredictorArg) -> Self {
        match arg {
            PredictorArg::Null => Self::Null,
            PredictorArg::Local => Self::Local,
        }
    }
}

/// Failures that end the process with status 1.
#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run(args) => cmd_run(&args),
        Commands::Check(args) => cmd_check(&args),
    };
    process::exit(code);
}

fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Splits `path arg1 arg2` into a workload.
fn parse_workload(spec: &str) -> Option<Workload> {
    let mut parts = spec.split_whitespace();
    parts.next().map(|path| Workload::new(path).with_args(parts))
}

/// Reads the configuration file (or defaults) and applies command-line overrides.
fn build_config(args: &RunArgs) -> Result<Config, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
            Config::from_json(&text)?
        }
        None => Config::default(),
    };
    if !args.workloads.is_empty() {
        config.workload_paths = args.workloads.iter().filter_map(|w| parse_workload(w)).collect();
    }
    if let Some(threads) = args.threads {
        config.core.thread_count = threads;
    }
    if let Some(core_type) = args.core_type {
        config.core.core_type = core_type.into();
    }
    if let Some(predictor) = args.branch_predictor {
        config.core.branch_predictor = predictor.into();
    }
    if args.max_ticks.is_some() {
        config.max_ticks = args.max_ticks;
    }
    Ok(config)
}

fn setup(args: &RunArgs) -> Result<Simulator, CliError> {
    let config = build_config(args)?;
    debug!(?config, "configuration resolved");
    Ok(Simulator::new(config, &ListingLoader)?)
}

fn cmd_run(args: &RunArgs) -> i32 {
    init_tracing(args.trace);
    let mut sim = match setup(args) {
        Ok(sim) => sim,
        Err(e) => {
            error!("{e}");
            eprintln!("pipesim: {e}");
            return 1;
        }
    };

    let report = sim.run();
    println!("Exiting @ tick {} because {}", report.final_tick, report.cause);
    for t in &report.threads {
        if let Some(path) = &t.workload {
            println!("  thread {} ({path}): {} after {} instructions", t.thread, t.state, t.committed);
        }
    }
    if !args.quiet {
        sim.stats().print_sections(&args.stats);
    }
    report.exit_code()
}

fn cmd_check(args: &RunArgs) -> i32 {
    init_tracing(args.trace);
    match setup(args) {
        Ok(sim) => {
            let system: &System = sim.system();
            println!(
                "configuration ok: {} thread context(s), {} cache(s), {} bus(es)",
                system.core.threads().len(),
                system.caches.len(),
                system.buses.len()
            );
            0
        }
        Err(e) => {
            eprintln!("pipesim: {e}");
            1
        }
    }
}
