use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "atomic-weaver")]
#[command(about = "Rewrite atomic-annotated methods to run under a transactional execution context")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the prerequisite schema artifacts.
    #[arg(long, value_name = "DIR")]
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Weave every compiled-class artifact under the given paths in place.
    Weave {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Decode one artifact and print its structural model.
    Inspect {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Print the loaded option defaults and configuration field list.
    Schema,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
