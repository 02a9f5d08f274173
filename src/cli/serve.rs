//! `serve` subcommand.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::config::{ConfigOverrides, ServerConfig};

/// Run the HTTP service.
///
/// Flags override the matching keys of the config file.
#[derive(Args, Debug, Default)]
pub struct ServeCommand {
    /// Socket address to bind (e.g. 127.0.0.1:8723).
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// URL prefix for all routes.
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Path of the uv executable instead of searching PATH.
    #[arg(long, value_name = "PATH")]
    uv_path: Option<String>,

    /// Parent directory for per-request scratch workspaces.
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<String>,
}

impl ServeCommand {
    /// The command-line values as config overrides.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen_address: self.listen.clone(),
            base_url: self.base_url.clone(),
            uv_path: self.uv_path.clone(),
            scratch_dir: self.scratch_dir.clone(),
        }
    }

    /// Load the configuration, apply overrides and serve until shutdown.
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = ServerConfig::load_with_optional(config_path).await?.with_overrides(self.overrides());
        tracing::debug!("Effective configuration: {:?}", config);
        crate::server::serve(config).await
    }
}
