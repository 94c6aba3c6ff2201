//! Stratum CLI - Lay out JSON graph documents

mod cli;
mod document;

use clap::Parser;

fn main() {
    let cli_args = cli::Cli::parse();
    let mut app = cli::StratumApp::new();

    // Logging is installed by the app from the parsed flags
    if let Err(e) = app.run(cli_args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
