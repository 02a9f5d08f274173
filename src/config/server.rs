//! Service configuration file.
//!
//! # Configuration File Location
//!
//! - **Unix/macOS**: `~/.pep723/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\pep723\config.toml`
//!
//! The location can be overridden with `--config` or `PEP723_CONFIG`. A missing
//! file is not an error; every key has a default.
//!
//! # File Format
//!
//! ```toml
//! listen_address = "127.0.0.1:8723"
//! base_url = "/"
//! uv_path = "~/.local/bin/uv"
//! scratch_dir = "/var/tmp/pep723"
//! tool_timeout_secs = 120
//! max_body_bytes = 5242880
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::core::WidgetError;
use crate::utils::expand_path;
use crate::uv::SystemLocator;

/// Default address the HTTP service binds to.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:8723";

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_base_url() -> String {
    "/".to_string()
}

/// Default request body limit: 5 MiB.
const fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

/// Settings for the HTTP service.
///
/// # Examples
///
/// ```rust
/// use pep723_server::config::ServerConfig;
///
/// let config: ServerConfig = toml::from_str("base_url = \"/user/alice\"").unwrap();
/// assert_eq!(config.normalized_base_url(), "/user/alice/");
/// assert_eq!(config.listen_address, "127.0.0.1:8723");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:8723`.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// URL prefix under which the `pep723widget/` routes are mounted.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Explicit path of the uv executable. `~` and `$VAR` are expanded.
    ///
    /// When unset, `uv` is looked up in `PATH` on first use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv_path: Option<String>,

    /// Parent directory for per-request scratch workspaces.
    ///
    /// Defaults to the system temporary directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<String>,

    /// Kill uv invocations running longer than this many seconds.
    ///
    /// Unset means no timeout: a hung uv process hangs its request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            base_url: default_base_url(),
            uv_path: None,
            scratch_dir: None,
            tool_timeout_secs: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Values given on the command line; `Some` fields replace file values.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--listen`
    pub listen_address: Option<String>,
    /// `--base-url`
    pub base_url: Option<String>,
    /// `--uv-path`
    pub uv_path: Option<String>,
    /// `--scratch-dir`
    pub scratch_dir: Option<String>,
}

impl ServerConfig {
    /// Load configuration from an optional path.
    ///
    /// If `path` is `None` the default location is used. A file that does not
    /// exist yields [`ServerConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };

        if fs::try_exists(&path).await.unwrap_or(false) {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (permissions, not found, etc.)
    /// - The file contains invalid TOML syntax or unknown keys
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| WidgetError::ConfigError {
            message: format!("{}: {}", path.display(), e.message()),
        })?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the default file path for the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or, on Windows, local data) directory
    /// cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("pep723")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".pep723")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Replace file values with the ones given on the command line.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(listen_address) = overrides.listen_address {
            self.listen_address = listen_address;
        }
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if overrides.uv_path.is_some() {
            self.uv_path = overrides.uv_path;
        }
        if overrides.scratch_dir.is_some() {
            self.scratch_dir = overrides.scratch_dir;
        }
        self
    }

    /// Parse [`ServerConfig::listen_address`].
    pub fn socket_addr(&self) -> Result<SocketAddr, WidgetError> {
        self.listen_address.parse().map_err(|e| WidgetError::ConfigError {
            message: format!("invalid listen_address '{}': {e}", self.listen_address),
        })
    }

    /// [`ServerConfig::base_url`] with exactly one leading and one trailing `/`.
    #[must_use]
    pub fn normalized_base_url(&self) -> String {
        let trimmed = self.base_url.trim().trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        }
    }

    /// Build the uv locator described by this configuration.
    pub fn locator(&self) -> Result<SystemLocator> {
        match &self.uv_path {
            Some(path) => Ok(SystemLocator::with_path(expand_path(path)?)),
            None => Ok(SystemLocator::new()),
        }
    }

    /// Directory under which scratch workspaces are created.
    ///
    /// A relative `scratch_dir` is resolved against the current directory.
    pub fn scratch_root(&self) -> Result<PathBuf> {
        match &self.scratch_dir {
            Some(dir) => {
                let dir = expand_path(dir)?;
                let root = std::path::absolute(&dir).map_err(|e| WidgetError::ConfigError {
                    message: format!("invalid scratch_dir '{}': {e}", dir.display()),
                })?;
                Ok(root)
            }
            None => Ok(std::env::temp_dir()),
        }
    }

    /// Subprocess timeout, if configured.
    #[must_use]
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}
