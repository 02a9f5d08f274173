//! pep723-server entry point
//!
//! Parses arguments, runs the selected command and renders failures with
//! details and suggestions before exiting with status 1.

use anyhow::Result;
use clap::Parser;
use pep723_server::cli;
use pep723_server::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
