//! CLI struct definitions for the kg-cwl command-line interface.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[clap(
    name = "kg-cwl",
    version = env!("CARGO_PKG_VERSION"),
    about = "Download the input descriptor for a CWL workflow from an EBRAINS model instance ID"
)]
pub struct Cli {
    /// ID of the model instance to download.
    #[clap(long, value_name = "INSTANCE_ID")]
    pub id: Option<String>,
    /// Authentication token used to log in to EBRAINS.
    #[clap(long, value_name = "TOKEN")]
    pub token: Option<String>,
    /// Run instruction for the model (defaults to the record's own, then `./run`).
    #[clap(long, value_name = "INSTRUCTION", allow_hyphen_values = true)]
    pub run: Option<String>,
    /// Descriptor file to write (defaults to `input.json` in the current directory).
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Working directory recorded in the descriptor (defaults to the current directory).
    #[clap(long, value_name = "DIR")]
    pub workdir: Option<String>,
    /// Config file (defaults to `kg-cwl.toml` in the current directory, if present).
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Registry base URL.
    #[clap(long, value_name = "URL")]
    pub api_url: Option<String>,
    /// Write the instance's stored `parameters` JSON verbatim instead of assembling a descriptor.
    #[clap(long)]
    pub from_parameters: bool,
    /// Do not echo the descriptor to stdout.
    #[clap(short, long)]
    pub quiet: bool,
    /// Increase log verbosity (-v info, -vv debug).
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
