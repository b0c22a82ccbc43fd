use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tt", version, about = "Converts timed-text caption files between formats", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reads a timed-text file and writes it back out in another format.
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    #[arg(short = 'i', long, help = "Input file path")]
    pub input: PathBuf,

    #[arg(short = 'o', long, help = "Output file path")]
    pub output: PathBuf,

    #[arg(long, value_name = "FORMAT", help = "TTML, SCC, STL, SRT, or VTT; inferred from --input's extension if omitted")]
    pub itype: Option<String>,

    #[arg(long, value_name = "FORMAT", help = "TTML, SCC, SRT, or VTT; inferred from --output's extension if omitted")]
    pub otype: Option<String>,

    #[arg(long = "filter", value_name = "NAME", help = "Name of a registered filter to apply, in order (repeatable)")]
    pub filters: Vec<String>,

    #[arg(long, value_name = "JSON", help = "Inline JSON configuration, layered on top of --config_file")]
    pub config: Option<String>,

    #[arg(long, value_name = "PATH", help = "Path to a JSON configuration file")]
    pub config_file: Option<PathBuf>,
}
