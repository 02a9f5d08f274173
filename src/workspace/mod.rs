//! Per-request scratch workspaces.
//!
//! A [`ScratchWorkspace`] is a uniquely named directory holding `script.py`
//! and `script.py.lock` for exactly one request. It is removed when
//! [`ScratchWorkspace::release`] is called or, failing that, when the value is
//! dropped, so early returns and panics still clean up.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pep723_server::workspace::ScratchWorkspace;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let workspace = ScratchWorkspace::acquire(&std::env::temp_dir()).await?;
//! workspace.write_script("# /// script\n# dependencies = []\n# ///\n").await?;
//! // ... run uv against workspace.script_path() ...
//! let lockfile = workspace.read_lockfile_if_present().await?;
//! workspace.release().await;
//! # let _ = lockfile;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::core::WidgetError;

/// File name of the script inside a workspace.
pub const SCRIPT_FILE_NAME: &str = "script.py";

/// File name uv uses for the script's lockfile.
pub const LOCKFILE_NAME: &str = "script.py.lock";

/// Prefix of workspace directory names.
pub const WORKSPACE_PREFIX: &str = "pep723_";

/// A scratch directory that is deleted exactly once.
///
/// Cleanup failures are logged and otherwise ignored; they never replace the
/// result of the operation that used the workspace.
#[derive(Debug)]
pub struct ScratchWorkspace {
    path: PathBuf,
    released: bool,
}

impl ScratchWorkspace {
    /// Create a new workspace directory under `root`.
    ///
    /// The directory is named `pep723_{uuid}`. `root` is created if missing. A
    /// relative `root` is resolved against the current directory; the paths
    /// handed to uv must stay valid when uv runs inside the workspace.
    ///
    /// # Errors
    ///
    /// [`WidgetError::Workspace`] when `root` cannot be made absolute or the
    /// directory cannot be created.
    pub async fn acquire(root: &Path) -> Result<Self, WidgetError> {
        let root = std::path::absolute(root).map_err(|source| WidgetError::Workspace {
            operation: "resolve".to_string(),
            path: root.display().to_string(),
            source,
        })?;
        let path = root.join(format!("{WORKSPACE_PREFIX}{}", uuid::Uuid::new_v4()));

        fs::create_dir_all(&path).await.map_err(|source| WidgetError::Workspace {
            operation: "create".to_string(),
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!("Acquired scratch workspace {}", path.display());
        Ok(Self {
            path,
            released: false,
        })
    }

    /// The workspace directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `script.py` inside the workspace.
    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.path.join(SCRIPT_FILE_NAME)
    }

    /// Path of `script.py.lock` inside the workspace.
    #[must_use]
    pub fn lockfile_path(&self) -> PathBuf {
        self.path.join(LOCKFILE_NAME)
    }

    /// Overwrite `script.py` with `content`.
    pub async fn write_script(&self, content: &str) -> Result<(), WidgetError> {
        write_file(&self.script_path(), content).await
    }

    /// Overwrite `script.py.lock` with `content`.
    pub async fn write_lockfile(&self, content: &str) -> Result<(), WidgetError> {
        write_file(&self.lockfile_path(), content).await
    }

    /// Read `script.py`.
    pub async fn read_script(&self) -> Result<String, WidgetError> {
        read_file(&self.script_path()).await
    }

    /// Read `script.py.lock`, or `None` when uv did not produce one.
    pub async fn read_lockfile_if_present(&self) -> Result<Option<String>, WidgetError> {
        let path = self.lockfile_path();
        if fs::try_exists(&path).await.unwrap_or(false) {
            read_file(&path).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Remove the workspace directory.
    pub async fn release(mut self) {
        self.released = true;
        let result = fs::remove_dir_all(&self.path).await;
        self.log_removal(result);
    }

    fn log_removal(&self, result: std::io::Result<()>) {
        match result {
            Ok(()) => tracing::debug!("Released scratch workspace {}", self.path.display()),
            Err(e) => tracing::debug!(
                "Ignoring failure to remove scratch workspace {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let result = std::fs::remove_dir_all(&self.path);
        self.log_removal(result);
    }
}

async fn write_file(path: &Path, content: &str) -> Result<(), WidgetError> {
    fs::write(path, content).await.map_err(|source| WidgetError::Workspace {
        operation: "write".to_string(),
        path: path.display().to_string(),
        source,
    })
}

async fn read_file(path: &Path) -> Result<String, WidgetError> {
    fs::read_to_string(path).await.map_err(|source| WidgetError::Workspace {
        operation: "read".to_string(),
        path: path.display().to_string(),
        source,
    })
}
