use std::path::PathBuf;

use clap::Parser;

/// Download YouTube links to the output folder in the highest available
/// quality.
#[derive(Debug, Parser)]
#[command(name = "ytmp4", version)]
pub struct Cli {
    /// Optional YouTube links or video IDs. If omitted, interactive
    /// input is used.
    pub urls: Vec<String>,

    /// Optional text file containing YouTube links.
    #[arg(long, value_name = "FILE")]
    pub links_file: Option<PathBuf>,

    /// Start downloads without the interactive confirmation prompt.
    #[arg(long)]
    pub no_confirm: bool,
}
