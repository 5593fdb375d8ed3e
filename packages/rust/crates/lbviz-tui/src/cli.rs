//! Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use lbviz_types::Algorithm;

/// Command line of the `lbviz` binary.
#[derive(Parser, Debug)]
#[command(name = "lbviz")]
#[command(about = "Load balancer visualizer: drive a decision service and watch where requests land.")]
pub struct Cli {
    /// Override config directory (reads `<dir>/lbviz/settings.yaml`).
    #[arg(long, global = true)]
    pub conf: Option<PathBuf>,

    /// Decision service root URL (overrides `decision.base_url`).
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Defaults to `tui`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Balancing algorithm as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlgorithmArg {
    /// `round_robin`
    #[value(name = "round_robin", alias = "round-robin")]
    RoundRobin,
    /// `random`
    Random,
    /// `least_connections`
    #[value(name = "least_connections", alias = "least-connections")]
    LeastConnections,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(value: AlgorithmArg) -> Self {
        match value {
            AlgorithmArg::RoundRobin => Algorithm::RoundRobin,
            AlgorithmArg::Random => Algorithm::Random,
            AlgorithmArg::LeastConnections => Algorithm::LeastConnections,
        }
    }
}

/// Subcommands.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Interactive terminal UI.
    Tui,
    /// Headless load test. Prints result lines and a summary.
    Run {
        /// Requests per second, clamped to 1..=100 (default: `run.rate_per_second`).
        #[arg(long)]
        rate: Option<f64>,

        /// Run length in seconds (default: `run.duration_seconds`).
        #[arg(long, conflicts_with = "continuous")]
        duration: Option<f64>,

        /// Keep going until Ctrl-C.
        #[arg(long)]
        continuous: bool,

        /// Switch the service to this algorithm first.
        #[arg(long, value_enum)]
        algorithm: Option<AlgorithmArg>,

        /// Print every controller event as a JSON line.
        #[arg(long)]
        json: bool,
    },
    /// Send single requests, one after another.
    Send {
        /// Number of requests.
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Print every controller event as a JSON line.
        #[arg(long)]
        json: bool,
    },
    /// Add a target and register it with the decision service.
    AddTarget {
        /// Display index of the new target (default: next free index).
        #[arg(long)]
        index: Option<u32>,
    },
}
