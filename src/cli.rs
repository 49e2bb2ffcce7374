use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "tcaudit",
    version,
    about = "Cross-check a spreadsheet test inventory against Polarion test cases"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Scan(ScanArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Inventory workbook (.xlsx) with "Polarion ID" and "Test case name" columns.
    pub spreadsheet: PathBuf,

    /// {'user':'token'} or {'user':'token.txt'}.
    pub credentials: String,

    /// Identifiers queried per request.
    #[arg(default_value = "15")]
    pub chunk_size: NonZeroUsize,

    #[arg(long)]
    pub server_url: String,

    #[arg(long)]
    pub project: String,

    #[arg(long, default_value_t = false)]
    pub insecure: bool,

    #[arg(long, default_value = "__cache__.json")]
    pub checkpoint_path: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "__cache__.json")]
    pub checkpoint_path: PathBuf,

    #[arg(long)]
    pub spreadsheet: Option<PathBuf>,
}
