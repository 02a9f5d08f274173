//! `doctor` subcommand: check the environment the service would run in.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use semver::Version;
use std::path::{Path, PathBuf};

use crate::config::ServerConfig;
use crate::uv::{ToolLocator, UvCommand};
use crate::workspace::ScratchWorkspace;

/// Oldest uv release whose `init`, `lock`, `add` and `tree` all accept `--script`.
pub const MIN_UV_VERSION: Version = Version::new(0, 6, 0);

/// Check uv, the configuration and the scratch directory.
///
/// Exits with an error when uv cannot be located; every other finding is
/// reported without failing.
#[derive(Args, Debug, Default)]
pub struct DoctorCommand {
    /// Check this uv executable instead of the configured one.
    #[arg(long, value_name = "PATH")]
    uv_path: Option<String>,
}

impl DoctorCommand {
    /// Run all checks and print a report to stdout.
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let path = match config_path {
            Some(path) => path,
            None => ServerConfig::default_path()?,
        };

        println!("{}", "Configuration".bold());
        if path.exists() {
            report_ok(&format!("config file: {}", path.display()));
        } else {
            report_note(&format!("config file: {} (not found, using defaults)", path.display()));
        }

        let mut config = ServerConfig::load_with_optional(Some(path)).await?;
        if self.uv_path.is_some() {
            config.uv_path = self.uv_path;
        }

        match config.socket_addr() {
            Ok(addr) => report_ok(&format!("listen address: {addr}")),
            Err(e) => report_fail(&e.to_string()),
        }
        report_ok(&format!("routes under: {}pep723widget/", config.normalized_base_url()));

        println!("\n{}", "Scratch directory".bold());
        let scratch_root = config.scratch_root()?;
        check_scratch_root(&scratch_root).await;

        println!("\n{}", "uv".bold());
        let uv = match config.locator()?.locate() {
            Ok(uv) => uv,
            Err(e) => {
                report_fail(&e.to_string());
                return Err(e.into());
            }
        };
        report_ok(&format!("found at: {}", uv.display()));
        check_uv_version(&uv).await;

        Ok(())
    }
}

async fn check_scratch_root(root: &Path) {
    match ScratchWorkspace::acquire(root).await {
        Ok(workspace) => {
            workspace.release().await;
            report_ok(&format!("writable: {}", root.display()));
        }
        Err(e) => report_fail(&format!("{e}")),
    }
}

async fn check_uv_version(uv: &Path) {
    let output = match UvCommand::version(uv).execute_stdout().await {
        Ok(output) => output,
        Err(e) => {
            report_fail(&format!("`uv --version` failed: {e:#}"));
            return;
        }
    };

    match parse_uv_version(&output) {
        Some(version) if version >= MIN_UV_VERSION => report_ok(&format!("version: {version}")),
        Some(version) => report_fail(&format!(
            "version {version} is older than {MIN_UV_VERSION}; `--script` support is incomplete"
        )),
        None => report_note(&format!("unrecognized version output: {output}")),
    }
}

/// Parse `uv 0.6.3 (a1b2c3d 2025-02-24)` into `0.6.3`.
fn parse_uv_version(output: &str) -> Option<Version> {
    let token = output.split_whitespace().nth(1)?;
    Version::parse(token).ok()
}

fn report_ok(message: &str) {
    println!("  {} {}", "✓".green(), message);
}

fn report_note(message: &str) {
    println!("  {} {}", "-".yellow(), message);
}

fn report_fail(message: &str) {
    println!("  {} {}", "✗".red(), message);
}
