//! nc-update entry point
//!
//! Parses the command line, runs the interactive update and turns any failure into a
//! colored `error:` / `details:` / `suggestion:` report plus the matching exit status.

use clap::Parser;
use nc_updater::cli::Cli;
use nc_updater::core::{exit_code_for, user_friendly_error};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        let code = exit_code_for(&e);
        user_friendly_error(e).display();
        std::process::exit(code);
    }
}
