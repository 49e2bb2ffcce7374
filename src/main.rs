mod cli;
mod commands;
mod interrupt;
mod model;
mod tracker;
mod util;
mod workbook;

use anyhow::Result;
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::interrupt::{INTERRUPTED_EXIT_CODE, Interrupted};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        if let Some(interrupted) = err.downcast_ref::<Interrupted>() {
            warn!(
                checkpoint = %interrupted.checkpoint_path.display(),
                cursor = interrupted.cursor,
                total = interrupted.total,
                "scan interrupted, rerun the same command to resume"
            );
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }

        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => commands::scan::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
