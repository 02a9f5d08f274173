//! Script operations behind the HTTP endpoints.
//!
//! Each operation is a short pipeline that stops at the first failure:
//!
//! | Operation | Steps |
//! |---|---|
//! | [`ScriptService::initialize`] | locate uv, `init`, `lock`, extract block, read lockfile |
//! | [`ScriptService::add_dependency`] | validate, locate uv, write inputs, `lock` if needed, `add`, `tree`, read back |
//! | [`ScriptService::get_tree`] | validate, locate uv, write inputs, `lock` if needed, `tree`, read lockfile |
//!
//! Input validation happens before the tool is located and before any
//! workspace exists, so rejected requests never touch the filesystem. Every
//! workspace is released on every exit path. `uv tree` is the only step whose
//! failure is tolerated; its output is replaced by [`TREE_FALLBACK`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::WidgetError;
use crate::metadata::extract_metadata_block;
use crate::utils::validate_dependency_spec;
use crate::uv::{ToolLocator, ToolRunner, UvInvocation};
use crate::workspace::ScratchWorkspace;

/// Tree text returned when `uv tree` fails.
pub const TREE_FALLBACK: &str = "Tree generation failed";

/// Body of `POST add-dependency`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AddDependencyRequest {
    /// Current script text, metadata block included
    #[serde(default)]
    pub script_metadata: Option<String>,
    /// Dependency specifier to add, e.g. `requests>=2.0`
    #[serde(default)]
    pub dependency: Option<String>,
    /// Existing lockfile; when absent one is generated first
    #[serde(default)]
    pub lockfile_content: Option<String>,
}

/// Body of `POST get-tree`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct GetTreeRequest {
    /// Current script text, metadata block included
    #[serde(default)]
    pub script_metadata: Option<String>,
    /// Existing lockfile; when absent one is generated first
    #[serde(default)]
    pub lockfile_content: Option<String>,
}

/// Response of `POST initialize`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InitializeResponse {
    /// Canonical metadata block of a freshly initialized script
    pub initial_metadata: String,
    /// Lockfile produced by `uv lock`, if any
    pub lockfile_content: Option<String>,
}

/// Response of `POST add-dependency`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AddDependencyResponse {
    /// Full script text after `uv add`
    pub updated_metadata: String,
    /// Lockfile after `uv add`, if any
    pub lockfile_content: Option<String>,
    /// Output of `uv tree`, or [`TREE_FALLBACK`]
    pub tree_output: String,
}

/// Response of `POST get-tree`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GetTreeResponse {
    /// Output of `uv tree`, or [`TREE_FALLBACK`]
    pub tree_output: String,
    /// Lockfile in the workspace after the tree step, if any
    pub lockfile_content: Option<String>,
}

/// Runs script operations against injected tool capabilities.
#[derive(Clone)]
pub struct ScriptService {
    locator: Arc<dyn ToolLocator>,
    runner: Arc<dyn ToolRunner>,
    scratch_root: PathBuf,
}

impl std::fmt::Debug for ScriptService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptService").field("scratch_root", &self.scratch_root).finish_non_exhaustive()
    }
}

impl ScriptService {
    /// Create a service creating its workspaces under `scratch_root`.
    pub fn new(
        locator: Arc<dyn ToolLocator>,
        runner: Arc<dyn ToolRunner>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            locator,
            runner,
            scratch_root: scratch_root.into(),
        }
    }

    /// Directory under which workspaces are created.
    #[must_use]
    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Create a new script with uv and return its metadata block and lockfile.
    ///
    /// # Errors
    ///
    /// - [`WidgetError::ToolNotFound`] when uv cannot be located
    /// - [`WidgetError::ToolCommandFailed`] when `init` or `lock` fails
    /// - [`WidgetError::MetadataExtractionFailed`] when the generated script has no block
    pub async fn initialize(&self) -> Result<InitializeResponse> {
        let uv = self.locator.locate()?;
        let workspace = ScratchWorkspace::acquire(&self.scratch_root).await?;
        let result = self.initialize_in(&uv, &workspace).await;
        workspace.release().await;
        result
    }

    async fn initialize_in(&self, uv: &Path, workspace: &ScratchWorkspace) -> Result<InitializeResponse> {
        let script = workspace.script_path();

        self.run_required(UvInvocation::init(uv, &script, workspace.path())).await?;
        self.run_required(UvInvocation::lock(uv, &script, workspace.path())).await?;

        let text = workspace.read_script().await?;
        let block = extract_metadata_block(&text)?;
        let lockfile_content = workspace.read_lockfile_if_present().await?;

        tracing::debug!("Initialized script with `{}` metadata block", block.block_type);
        Ok(InitializeResponse {
            initial_metadata: block.render(),
            lockfile_content,
        })
    }

    /// Add `request.dependency` to the script and return the updated state.
    ///
    /// # Errors
    ///
    /// - [`WidgetError::MissingField`] when either required field is absent or empty
    /// - [`WidgetError::InvalidDependency`] when the specifier fails the allow-list
    /// - [`WidgetError::ToolNotFound`] when uv cannot be located
    /// - [`WidgetError::ToolCommandFailed`] when `lock` or `add` fails
    pub async fn add_dependency(&self, request: AddDependencyRequest) -> Result<AddDependencyResponse> {
        let (script_metadata, dependency) = match (
            non_empty(request.script_metadata.as_deref()),
            non_empty(request.dependency.as_deref()),
        ) {
            (Some(script), Some(dependency)) => (script, dependency),
            _ => return Err(WidgetError::missing_field("Both script_metadata and dependency are required").into()),
        };
        validate_dependency_spec(dependency)?;

        let uv = self.locator.locate()?;
        let workspace = ScratchWorkspace::acquire(&self.scratch_root).await?;
        let result = self
            .add_dependency_in(&uv, &workspace, script_metadata, dependency, request.lockfile_content.as_deref())
            .await;
        workspace.release().await;
        result
    }

    async fn add_dependency_in(
        &self,
        uv: &Path,
        workspace: &ScratchWorkspace,
        script_metadata: &str,
        dependency: &str,
        lockfile_content: Option<&str>,
    ) -> Result<AddDependencyResponse> {
        let script = workspace.script_path();
        self.prepare(uv, workspace, script_metadata, lockfile_content).await?;

        self.run_required(UvInvocation::add(uv, &script, dependency, workspace.path())).await?;
        tracing::info!("Added dependency {}", dependency);

        let tree_output = self.tree(uv, workspace).await;
        let updated_metadata = workspace.read_script().await?;
        let lockfile_content = workspace.read_lockfile_if_present().await?;

        Ok(AddDependencyResponse {
            updated_metadata,
            lockfile_content,
            tree_output,
        })
    }

    /// Render the dependency tree of `request.script_metadata`.
    ///
    /// # Errors
    ///
    /// - [`WidgetError::MissingField`] when `script_metadata` is absent or empty
    /// - [`WidgetError::ToolNotFound`] when uv cannot be located
    /// - [`WidgetError::ToolCommandFailed`] when a required `lock` fails
    pub async fn get_tree(&self, request: GetTreeRequest) -> Result<GetTreeResponse> {
        let Some(script_metadata) = non_empty(request.script_metadata.as_deref()) else {
            return Err(WidgetError::missing_field("script_metadata is required").into());
        };

        let uv = self.locator.locate()?;
        let workspace = ScratchWorkspace::acquire(&self.scratch_root).await?;
        let result = self.get_tree_in(&uv, &workspace, script_metadata, request.lockfile_content.as_deref()).await;
        workspace.release().await;
        result
    }

    async fn get_tree_in(
        &self,
        uv: &Path,
        workspace: &ScratchWorkspace,
        script_metadata: &str,
        lockfile_content: Option<&str>,
    ) -> Result<GetTreeResponse> {
        self.prepare(uv, workspace, script_metadata, lockfile_content).await?;

        let tree_output = self.tree(uv, workspace).await;
        let lockfile_content = workspace.read_lockfile_if_present().await?;

        Ok(GetTreeResponse {
            tree_output,
            lockfile_content,
        })
    }

    /// Write the caller's script and lockfile; lock when no lockfile was given.
    async fn prepare(
        &self,
        uv: &Path,
        workspace: &ScratchWorkspace,
        script_metadata: &str,
        lockfile_content: Option<&str>,
    ) -> Result<()> {
        workspace.write_script(script_metadata).await?;

        match non_empty(lockfile_content) {
            Some(lockfile) => workspace.write_lockfile(lockfile).await?,
            None => {
                self.run_required(UvInvocation::lock(uv, &workspace.script_path(), workspace.path())).await?;
            }
        }
        Ok(())
    }

    /// Run `uv tree`, substituting [`TREE_FALLBACK`] when it does not succeed.
    async fn tree(&self, uv: &Path, workspace: &ScratchWorkspace) -> String {
        let invocation = UvInvocation::tree(uv, &workspace.script_path(), workspace.path());
        match self.runner.run(&invocation).await {
            Ok(output) if output.success() => output.stdout,
            Ok(output) => {
                tracing::warn!("uv tree exited with {:?}: {}", output.exit_code, output.stderr.trim());
                TREE_FALLBACK.to_string()
            }
            Err(e) => {
                tracing::warn!("uv tree could not be run: {e:#}");
                TREE_FALLBACK.to_string()
            }
        }
    }

    /// Run a step that must succeed.
    async fn run_required(&self, invocation: UvInvocation) -> Result<()> {
        let output = self.runner.run(&invocation).await?;
        if output.success() {
            Ok(())
        } else {
            Err(WidgetError::ToolCommandFailed {
                operation: invocation.subcommand.to_string(),
                stderr: output.stderr,
            }
            .into())
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeUv, FixedLocator, UnavailableLocator};
    use crate::uv::UvSubcommand;

    fn service(fake: &Arc<FakeUv>, root: &std::path::Path) -> ScriptService {
        ScriptService::new(Arc::new(FixedLocator::new("/fake/uv")), fake.clone(), root)
    }

    fn widget_error(err: &anyhow::Error) -> &WidgetError {
        err.downcast_ref::<WidgetError>().expect("expected a WidgetError")
    }

    fn scratch_is_empty(root: &std::path::Path) -> bool {
        std::fs::read_dir(root).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_initialize() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());

        let response = service(&fake, root.path()).initialize().await.unwrap();

        assert!(response.initial_metadata.starts_with("# /// script\n"));
        assert!(response.initial_metadata.ends_with("# ///"));
        assert!(response.initial_metadata.contains("# dependencies = []"));
        assert!(response.lockfile_content.is_some());
        assert_eq!(fake.subcommands(), vec![UvSubcommand::Init, UvSubcommand::Lock]);
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_initialize_lock_failure() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new().failing(UvSubcommand::Lock, "No solution found"));

        let err = service(&fake, root.path()).initialize().await.unwrap_err();

        assert_eq!(err.to_string(), "uv lock failed: No solution found");
        assert_eq!(widget_error(&err).status_code(), 500);
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_initialize_without_metadata_block() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new().with_init_script("print('no block')\n"));

        let err = service(&fake, root.path()).initialize().await.unwrap_err();

        assert!(matches!(widget_error(&err), WidgetError::MetadataExtractionFailed));
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_initialize_tool_unavailable() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());
        let service = ScriptService::new(Arc::new(UnavailableLocator), fake.clone(), root.path());

        let err = service.initialize().await.unwrap_err();

        assert!(matches!(widget_error(&err), WidgetError::ToolNotFound { .. }));
        assert!(fake.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_add_dependency_generates_lockfile() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());

        let response = service(&fake, root.path())
            .add_dependency(AddDependencyRequest {
                script_metadata: Some("# /// script\n# dependencies = []\n# ///\n".to_string()),
                dependency: Some("requests>=2.0".to_string()),
                lockfile_content: None,
            })
            .await
            .unwrap();

        assert!(response.updated_metadata.contains("requests>=2.0"));
        assert!(response.lockfile_content.is_some());
        assert!(response.tree_output.contains("requests"));
        assert_eq!(
            fake.subcommands(),
            vec![UvSubcommand::Lock, UvSubcommand::Add, UvSubcommand::Tree]
        );
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_add_dependency_with_lockfile_skips_lock() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());

        let response = service(&fake, root.path())
            .add_dependency(AddDependencyRequest {
                script_metadata: Some("# /// script\n# dependencies = []\n# ///\n".to_string()),
                dependency: Some("rich".to_string()),
                lockfile_content: Some("version = 1\n".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(fake.subcommands(), vec![UvSubcommand::Add, UvSubcommand::Tree]);
        assert!(response.lockfile_content.unwrap().starts_with("version = 1\n"));
    }

    #[tokio::test]
    async fn test_add_dependency_empty_lockfile_is_absent() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());

        service(&fake, root.path())
            .add_dependency(AddDependencyRequest {
                script_metadata: Some("# /// script\n# dependencies = []\n# ///\n".to_string()),
                dependency: Some("rich".to_string()),
                lockfile_content: Some(String::new()),
            })
            .await
            .unwrap();

        assert_eq!(fake.subcommands()[0], UvSubcommand::Lock);
    }

    #[tokio::test]
    async fn test_add_dependency_missing_fields() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());
        let service = service(&fake, root.path());

        for request in [
            AddDependencyRequest::default(),
            AddDependencyRequest {
                script_metadata: Some("# /// script\n# ///".to_string()),
                ..AddDependencyRequest::default()
            },
            AddDependencyRequest {
                script_metadata: Some(String::new()),
                dependency: Some("requests".to_string()),
                lockfile_content: None,
            },
        ] {
            let err = service.add_dependency(request).await.unwrap_err();
            assert_eq!(err.to_string(), "Both script_metadata and dependency are required");
            assert_eq!(widget_error(&err).status_code(), 400);
        }
        assert!(fake.invocations().is_empty());
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_add_dependency_rejects_injection_before_running_uv() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());

        let err = service(&fake, root.path())
            .add_dependency(AddDependencyRequest {
                script_metadata: Some("# /// script\n# ///".to_string()),
                dependency: Some("req; rm -rf /".to_string()),
                lockfile_content: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid dependency name");
        assert_eq!(widget_error(&err).status_code(), 400);
        assert!(fake.invocations().is_empty());
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_add_dependency_validation_precedes_tool_lookup() {
        let root = tempfile::tempdir().unwrap();
        let service =
            ScriptService::new(Arc::new(UnavailableLocator), Arc::new(FakeUv::new()), root.path());

        let err = service
            .add_dependency(AddDependencyRequest {
                script_metadata: Some("# /// script\n# ///".to_string()),
                dependency: Some("bad|name".to_string()),
                lockfile_content: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(widget_error(&err), WidgetError::InvalidDependency { .. }));
    }

    #[tokio::test]
    async fn test_add_dependency_add_failure_reports_stderr() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new().failing(UvSubcommand::Add, "package `nope` not found"));

        let err = service(&fake, root.path())
            .add_dependency(AddDependencyRequest {
                script_metadata: Some("# /// script\n# ///".to_string()),
                dependency: Some("nope".to_string()),
                lockfile_content: Some("version = 1\n".to_string()),
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "uv add failed: package `nope` not found");
        assert!(!fake.subcommands().contains(&UvSubcommand::Tree));
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_add_dependency_tree_failure_is_tolerated() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new().failing(UvSubcommand::Tree, "boom"));

        let response = service(&fake, root.path())
            .add_dependency(AddDependencyRequest {
                script_metadata: Some("# /// script\n# dependencies = []\n# ///\n".to_string()),
                dependency: Some("httpx".to_string()),
                lockfile_content: None,
            })
            .await
            .unwrap();

        assert_eq!(response.tree_output, TREE_FALLBACK);
        assert!(response.updated_metadata.contains("httpx"));
    }

    #[tokio::test]
    async fn test_get_tree() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());

        let response = service(&fake, root.path())
            .get_tree(GetTreeRequest {
                script_metadata: Some("# /// script\n# dependencies = [\n#   \"rich\",\n# ]\n# ///\n".to_string()),
                lockfile_content: None,
            })
            .await
            .unwrap();

        assert!(response.tree_output.contains("rich"));
        assert!(response.lockfile_content.is_some());
        assert_eq!(fake.subcommands(), vec![UvSubcommand::Lock, UvSubcommand::Tree]);
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_get_tree_requires_script() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());

        let err = service(&fake, root.path())
            .get_tree(GetTreeRequest {
                script_metadata: Some(String::new()),
                lockfile_content: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "script_metadata is required");
        assert_eq!(widget_error(&err).status_code(), 400);
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_get_tree_lock_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new().failing(UvSubcommand::Lock, "resolution failed"));

        let err = service(&fake, root.path())
            .get_tree(GetTreeRequest {
                script_metadata: Some("# /// script\n# ///".to_string()),
                lockfile_content: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "uv lock failed: resolution failed");
    }

    #[tokio::test]
    async fn test_get_tree_failure_is_tolerated() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new().failing(UvSubcommand::Tree, "boom"));

        let response = service(&fake, root.path())
            .get_tree(GetTreeRequest {
                script_metadata: Some("# /// script\n# ///".to_string()),
                lockfile_content: Some("version = 1\n".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(response.tree_output, TREE_FALLBACK);
        assert_eq!(response.lockfile_content.as_deref(), Some("version = 1\n"));
    }

    #[tokio::test]
    async fn test_runs_happen_inside_workspace() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeUv::new());

        service(&fake, root.path()).initialize().await.unwrap();

        for invocation in fake.invocations() {
            assert!(invocation.current_dir.starts_with(root.path()));
            assert_eq!(invocation.program, PathBuf::from("/fake/uv"));
            assert_eq!(invocation.args[0], "--script");
        }
    }
}
