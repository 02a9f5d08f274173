//! Locating the uv executable.
//!
//! Lookup happens at request time, not at startup, so a service started
//! before uv was installed begins working once uv appears. The first
//! successful lookup is cached for the life of the locator.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::core::WidgetError;

/// Name of the uv binary searched for in `PATH`.
pub const UV_BINARY_NAME: &str = "uv";

/// Resolves the path of the dependency tool.
pub trait ToolLocator: Send + Sync {
    /// Return the path of an executable uv binary.
    ///
    /// # Errors
    ///
    /// [`WidgetError::ToolNotFound`] when no usable binary exists.
    fn locate(&self) -> Result<PathBuf, WidgetError>;
}

/// Locates uv from an explicit path or from `PATH`.
#[derive(Debug, Default)]
pub struct SystemLocator {
    configured: Option<PathBuf>,
    resolved: OnceLock<PathBuf>,
}

impl SystemLocator {
    /// Search `PATH` for `uv`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `path` instead of searching `PATH`.
    ///
    /// The path is still checked for existence and executability on lookup.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            configured: Some(path.into()),
            resolved: OnceLock::new(),
        }
    }

    /// The explicitly configured path, if any.
    #[must_use]
    pub fn configured_path(&self) -> Option<&Path> {
        self.configured.as_deref()
    }

    fn resolve(&self) -> Result<PathBuf, WidgetError> {
        match &self.configured {
            Some(path) => which::which(path).map_err(|e| WidgetError::ToolNotFound {
                reason: format!("configured uv path {} is not executable: {e}", path.display()),
            }),
            None => which::which(UV_BINARY_NAME).map_err(|e| WidgetError::ToolNotFound {
                reason: format!("{UV_BINARY_NAME} was not found in PATH: {e}"),
            }),
        }
    }
}

impl ToolLocator for SystemLocator {
    fn locate(&self) -> Result<PathBuf, WidgetError> {
        if let Some(path) = self.resolved.get() {
            return Ok(path.clone());
        }

        let path = self.resolve()?;
        tracing::debug!(target: "uv", "Resolved uv executable: {}", path.display());
        // A concurrent lookup may have won; both resolved the same binary.
        let _ = self.resolved.set(path.clone());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configured_path() {
        let locator = SystemLocator::with_path("/definitely/not/here/uv");
        let err = locator.locate().unwrap_err();
        assert!(matches!(err, WidgetError::ToolNotFound { .. }));
        assert!(err.to_string().starts_with("uv not available: configured uv path"));
    }

    #[cfg(unix)]
    #[test]
    fn test_configured_path_is_cached() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("uv");
        std::fs::write(&fake, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let locator = SystemLocator::with_path(&fake);
        assert_eq!(locator.locate().unwrap(), fake);

        // Once resolved, lookups no longer touch the filesystem.
        std::fs::remove_file(&fake).unwrap();
        assert_eq!(locator.locate().unwrap(), fake);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("uv");
        std::fs::write(&fake, "not a program").unwrap();

        let locator = SystemLocator::with_path(&fake);
        assert!(locator.locate().is_err());
    }
}
