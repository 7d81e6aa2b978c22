//! Binary entry point: parses arguments and dispatches to the subcommand.

use clap::Parser;
use std::process;

use cutmark_cli::{logging, run_encode, run_watch, Cli, Commands};

fn main() {
    logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Watch(args) => run_watch(args),
        Commands::Encode(args) => run_encode(args),
    };

    if let Err(e) = result {
        log::error!("{e}");
        process::exit(1);
    }
}
