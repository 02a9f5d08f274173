//! Drives the real process runner against a shell script standing in for uv.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pep723_server::operations::{AddDependencyRequest, GetTreeRequest, ScriptService, TREE_FALLBACK};
use pep723_server::test_utils::{FixedLocator, init_test_logging};
use pep723_server::uv::{ProcessRunner, SystemLocator};
use tempfile::TempDir;

/// Understands `<sub> --script <file> [-- dependency]` like uv does.
const FAKE_UV: &str = r#"#!/bin/sh
cmd="$1"
[ "$2" = "--script" ] || { echo "expected --script" >&2; exit 2; }
script="$3"
case "$cmd" in
  init)
    printf '# /// script\n# requires-python = ">=3.12"\n# dependencies = []\n# ///\n\nprint("hi")\n' > "$script"
    ;;
  lock)
    printf 'version = 1\n' > "$script.lock"
    ;;
  add)
    [ "$4" = "--" ] || { echo "expected -- before the dependency" >&2; exit 2; }
    printf '# /// script\n# dependencies = [\n#   "%s",\n# ]\n# ///\n' "$5" > "$script"
    printf 'version = 1\n\n[[package]]\nname = "%s"\n' "$5" >> "$script.lock"
    ;;
  tree)
    if [ -n "$FAKE_UV_TREE_SLEEP" ]; then sleep "$FAKE_UV_TREE_SLEEP"; fi
    grep '^#   "' "$script" | sed 's/^#   "\(.*\)",$/\1 v1.0.0/'
    ;;
  *)
    echo "unknown subcommand $cmd" >&2
    exit 2
    ;;
esac
"#;

fn install_fake_uv(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("uv");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn service(uv: &Path, scratch: &Path, timeout: Option<Duration>) -> ScriptService {
    init_test_logging(None);
    ScriptService::new(
        Arc::new(FixedLocator::new(uv)),
        Arc::new(ProcessRunner::with_timeout(timeout)),
        scratch,
    )
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[tokio::test]
async fn test_initialize_with_process_runner() {
    let bin = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let uv = install_fake_uv(bin.path(), FAKE_UV);

    let response = service(&uv, scratch.path(), None).initialize().await.unwrap();

    assert_eq!(
        response.initial_metadata,
        "# /// script\n# requires-python = \">=3.12\"\n# dependencies = []\n# ///"
    );
    assert_eq!(response.lockfile_content.as_deref(), Some("version = 1\n"));
    assert!(is_empty_dir(scratch.path()));
}

#[tokio::test]
async fn test_add_dependency_with_process_runner() {
    let bin = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let uv = install_fake_uv(bin.path(), FAKE_UV);

    let response = service(&uv, scratch.path(), None)
        .add_dependency(AddDependencyRequest {
            script_metadata: Some("# /// script\n# ///".to_string()),
            dependency: Some("httpx[http2] >=0.27, <1".to_string()),
            lockfile_content: None,
        })
        .await
        .unwrap();

    // The specifier arrives as one argument, spaces and all.
    assert!(response.updated_metadata.contains("#   \"httpx[http2] >=0.27, <1\","));
    assert_eq!(response.tree_output, "httpx[http2] >=0.27, <1 v1.0.0\n");
    assert!(response.lockfile_content.unwrap().contains("name = \"httpx[http2] >=0.27, <1\""));
    assert!(is_empty_dir(scratch.path()));
}

#[tokio::test]
async fn test_failing_uv_reports_stderr() {
    let bin = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let uv = install_fake_uv(bin.path(), "#!/bin/sh\necho \"error: failed to resolve\" >&2\nexit 1\n");

    let err = service(&uv, scratch.path(), None)
        .get_tree(GetTreeRequest {
            script_metadata: Some("# /// script\n# ///".to_string()),
            lockfile_content: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "uv lock failed: error: failed to resolve\n");
    assert!(is_empty_dir(scratch.path()));
}

#[tokio::test]
async fn test_hung_tree_falls_back_after_timeout() {
    let bin = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let body = FAKE_UV.replace("if [ -n \"$FAKE_UV_TREE_SLEEP\" ]; then sleep \"$FAKE_UV_TREE_SLEEP\"; fi", "sleep 30");
    let uv = install_fake_uv(bin.path(), &body);

    let response = service(&uv, scratch.path(), Some(Duration::from_secs(2)))
        .get_tree(GetTreeRequest {
            script_metadata: Some("# /// script\n# ///".to_string()),
            lockfile_content: Some("version = 1\n".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(response.tree_output, TREE_FALLBACK);
    assert!(is_empty_dir(scratch.path()));
}

#[tokio::test]
async fn test_system_locator_with_configured_path() {
    let bin = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let uv = install_fake_uv(bin.path(), FAKE_UV);

    let service = ScriptService::new(
        Arc::new(SystemLocator::with_path(&uv)),
        Arc::new(ProcessRunner::new()),
        scratch.path(),
    );

    let response = service.initialize().await.unwrap();
    assert!(response.initial_metadata.starts_with("# /// script"));
}

#[tokio::test]
async fn test_relative_scratch_root() {
    let bin = TempDir::new().unwrap();
    let uv = install_fake_uv(bin.path(), FAKE_UV);
    let scratch = tempfile::Builder::new().prefix("scratch-").tempdir_in(".").unwrap();
    let relative = Path::new(scratch.path().file_name().unwrap());
    assert!(relative.is_relative());

    let service = service(&uv, relative, None);

    let response = service.initialize().await.unwrap();
    assert!(response.initial_metadata.starts_with("# /// script"));

    let response = service
        .add_dependency(AddDependencyRequest {
            script_metadata: Some(response.initial_metadata),
            dependency: Some("rich".to_string()),
            lockfile_content: response.lockfile_content,
        })
        .await
        .unwrap();
    assert_eq!(response.tree_output, "rich v1.0.0\n");
    assert!(is_empty_dir(scratch.path()));
}

#[tokio::test]
async fn test_option_like_dependency_is_passed_as_package() {
    let bin = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let uv = install_fake_uv(bin.path(), FAKE_UV);

    let response = service(&uv, scratch.path(), None)
        .add_dependency(AddDependencyRequest {
            script_metadata: Some("# /// script\n# ///".to_string()),
            dependency: Some("--frozen".to_string()),
            lockfile_content: Some("version = 1\n".to_string()),
        })
        .await
        .unwrap();

    assert!(response.updated_metadata.contains("#   \"--frozen\","));
}
