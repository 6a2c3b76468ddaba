use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "mdflow CLI - Run molecular-dynamics simulations with pluggable force-field terms under periodic boundary conditions.",
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

    /// Set the number of threads used by the accelerator kernel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Minimize (optionally) and integrate a system described by a TOML run file.
    Run(RunArgs),
}

/// Execution path for force-field terms.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelArg {
    Host,
    Accelerator,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the run file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Write one CSV row of energies per report interval.
    #[arg(short, long, value_name = "PATH")]
    pub energy_log: Option<PathBuf>,

    /// Write the final positions and velocities as CSV.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    // --- Simulation Overrides ---
    /// Override the number of integration steps.
    #[arg(short = 'n', long, value_name = "INT")]
    pub steps: Option<usize>,

    /// Override the integration time step in fs.
    #[arg(short = 't', long, value_name = "FLOAT")]
    pub time_step: Option<f64>,

    /// Override the report interval in steps.
    #[arg(long, value_name = "INT")]
    pub report_interval: Option<usize>,

    /// Override the execution kernel of every force-field term.
    #[arg(short, long, value_enum, value_name = "KERNEL")]
    pub kernel: Option<KernelArg>,

    /// Skip energy minimization, even if it is defined in the run file.
    #[arg(long)]
    pub no_minimize: bool,
}
