//! Command-line interface.
//!
//! ```bash
//! pep723-server serve                        # Run with ~/.pep723/config.toml
//! pep723-server serve --listen 0.0.0.0:8723  # Override the bind address
//! pep723-server -v serve --uv-path ~/bin/uv  # Debug logging, explicit uv
//! pep723-server doctor                       # Check the environment
//! ```
//!
//! # Global Options
//!
//! - `-v, --verbose`: debug logging
//! - `-q, --quiet`: errors only
//! - `-c, --config <PATH>`: config file (also `PEP723_CONFIG`)
//!
//! `RUST_LOG`, when set, takes precedence over `--verbose` and `--quiet`.

mod doctor;
mod serve;

pub use doctor::DoctorCommand;
pub use serve::ServeCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Runtime configuration derived from the global options.
///
/// Kept separate from [`Cli`] so tests can drive commands without parsing
/// arguments or installing a subscriber.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Explicit config file path; `None` means the default location.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global tracing subscriber.
    ///
    /// Logs go to stderr. Calling this twice is harmless; the second call
    /// leaves the first subscriber in place.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    }
}

/// PEP 723 inline script metadata service.
#[derive(Parser, Debug)]
#[command(name = "pep723-server", author, version, about, long_about = None)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file.
    ///
    /// Defaults to `~/.pep723/config.toml`. A missing file means defaults.
    #[arg(short, long, global = true, env = "PEP723_CONFIG")]
    config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service.
    Serve(ServeCommand),

    /// Check that uv and the configuration are usable.
    Doctor(DoctorCommand),
}

impl Cli {
    /// Execute the parsed command.
    ///
    /// # Errors
    ///
    /// Returns whatever error the subcommand produced.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Derive the runtime configuration from the global options.
    ///
    /// ```rust,ignore
    /// use clap::Parser;
    /// use pep723_server::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["pep723-server", "-v", "doctor"]);
    /// assert_eq!(cli.build_config().log_level, "debug");
    /// ```
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit runtime configuration.
    ///
    /// Does not install a tracing subscriber.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Serve(cmd) => cmd.execute(config.config_path).await,
            Commands::Doctor(cmd) => cmd.execute(config.config_path).await,
        }
    }
}
