use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan",
    version,
    about = "PackMC CLI - Monte Carlo packing of hard and soft particles in triclinic periodic boxes.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of threads used for whole-packing scans and rescaling.
    /// Overrides `packing.scaling-threads`; 0 uses every logical core.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a Metropolis Monte Carlo simulation described by a TOML file.
    Run(RunArgs),
    /// Build the initial packing and report its grid, overlaps and energy.
    Inspect(InspectArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the run description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Start from a snapshot written by a previous run instead of a fresh lattice.
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Write the final packing as a TOML snapshot.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Override `monte-carlo.cycles` from the config file.
    #[arg(short = 'n', long, value_name = "INT")]
    pub cycles: Option<usize>,

    /// Override `monte-carlo.seed` from the config file.
    #[arg(short, long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Skip volume moves even if a pressure is configured.
    #[arg(long)]
    pub no_volume_moves: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S monte-carlo.temperature=2.0
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the run description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Inspect a snapshot instead of the configured lattice.
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,
}
