//! Test utilities for the service.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests in `tests/`.
//!
//! - [`init_test_logging`] - opt-in tracing output for tests
//! - [`FakeUv`] - in-process [`ToolRunner`] that imitates uv on disk
//! - [`FixedLocator`] / [`UnavailableLocator`] - [`ToolLocator`] stand-ins

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::WidgetError;
use crate::uv::{ToolLocator, ToolOutput, ToolRunner, UvInvocation, UvSubcommand};

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Does nothing unless a level is given or `RUST_LOG` is set, so test output
/// stays quiet by default. Safe to call from every test.
///
/// ```rust,no_run
/// use tracing::Level;
///
/// pep723_server::test_utils::init_test_logging(Some(Level::DEBUG));
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Script body `uv init --script` writes in [`FakeUv`].
pub const FAKE_INIT_SCRIPT: &str = "# /// script\n\
# requires-python = \">=3.12\"\n\
# dependencies = []\n\
# ///\n\
\n\
\n\
def main() -> None:\n    print(\"Hello from script.py!\")\n\
\n\
\n\
if __name__ == \"__main__\":\n    main()\n";

/// In-process imitation of uv.
///
/// Each subcommand acts on the `--script` path of the invocation:
///
/// - `init` writes [`FAKE_INIT_SCRIPT`] (or the script set with [`FakeUv::with_init_script`])
/// - `lock` writes `<script>.lock` listing the script's dependencies
/// - `add` inserts the dependency into the metadata block and relocks
/// - `tree` prints one line per dependency
///
/// Subcommands registered with [`FakeUv::failing`] exit with status 1 and the
/// given stderr instead. Every invocation is recorded.
#[derive(Debug)]
pub struct FakeUv {
    init_script: String,
    failures: HashMap<UvSubcommand, String>,
    invocations: Mutex<Vec<UvInvocation>>,
}

impl Default for FakeUv {
    fn default() -> Self {
        Self {
            init_script: FAKE_INIT_SCRIPT.to_string(),
            failures: HashMap::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }
}

impl FakeUv {
    /// A fake where every subcommand succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `subcommand` exit with status 1 and `stderr`.
    #[must_use]
    pub fn failing(mut self, subcommand: UvSubcommand, stderr: impl Into<String>) -> Self {
        self.failures.insert(subcommand, stderr.into());
        self
    }

    /// Replace the script written by `init`.
    #[must_use]
    pub fn with_init_script(mut self, script: impl Into<String>) -> Self {
        self.init_script = script.into();
        self
    }

    /// All invocations so far, in order.
    pub fn invocations(&self) -> Vec<UvInvocation> {
        self.invocations.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Subcommands of all invocations so far, in order.
    pub fn subcommands(&self) -> Vec<UvSubcommand> {
        self.invocations().into_iter().map(|call| call.subcommand).collect()
    }

    async fn lock(script: &Path) -> Result<()> {
        let text = tokio::fs::read_to_string(script).await.context("fake uv: script missing")?;
        tokio::fs::write(lockfile_path(script), render_lockfile(&dependencies(&text))).await?;
        Ok(())
    }
}

#[async_trait]
impl ToolRunner for FakeUv {
    async fn run(&self, invocation: &UvInvocation) -> Result<ToolOutput> {
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(invocation.clone());
        }

        if let Some(stderr) = self.failures.get(&invocation.subcommand) {
            return Ok(ToolOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: stderr.clone(),
            });
        }

        let script = invocation
            .args
            .iter()
            .position(|arg| arg == "--script")
            .and_then(|i| invocation.args.get(i + 1))
            .map(PathBuf::from)
            .context("fake uv: missing --script argument")?;

        let mut stdout = String::new();
        match invocation.subcommand {
            UvSubcommand::Init => {
                tokio::fs::write(&script, &self.init_script).await?;
            }
            UvSubcommand::Lock => Self::lock(&script).await?,
            UvSubcommand::Add => {
                let dependency = invocation
                    .args
                    .iter()
                    .position(|arg| arg == "--")
                    .and_then(|i| invocation.args.get(i + 1))
                    .context("fake uv: missing `-- <dependency>`")?;
                let text = tokio::fs::read_to_string(&script).await?;
                tokio::fs::write(&script, add_dependency(&text, dependency)).await?;
                Self::lock(&script).await?;
            }
            UvSubcommand::Tree => {
                let text = tokio::fs::read_to_string(&script).await?;
                for dependency in dependencies(&text) {
                    stdout.push_str(&format!("{} v1.0.0\n", package_name(&dependency)));
                }
            }
        }

        Ok(ToolOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
        })
    }
}

/// [`ToolLocator`] that always returns the same path.
#[derive(Debug, Clone)]
pub struct FixedLocator {
    path: PathBuf,
}

impl FixedLocator {
    /// Locator returning `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }
}

impl ToolLocator for FixedLocator {
    fn locate(&self) -> Result<PathBuf, WidgetError> {
        Ok(self.path.clone())
    }
}

/// [`ToolLocator`] for a machine without uv.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLocator;

impl ToolLocator for UnavailableLocator {
    fn locate(&self) -> Result<PathBuf, WidgetError> {
        Err(WidgetError::ToolNotFound {
            reason: "uv was not found in PATH".to_string(),
        })
    }
}

fn lockfile_path(script: &Path) -> PathBuf {
    let mut name = script.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Quoted entries of the `dependencies` array, one per line.
fn dependencies(script: &str) -> Vec<String> {
    script
        .lines()
        .filter_map(|line| line.strip_prefix("#   \""))
        .filter_map(|rest| rest.strip_suffix("\","))
        .map(str::to_string)
        .collect()
}

fn package_name(spec: &str) -> &str {
    let end = spec.find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')).unwrap_or(spec.len());
    &spec[..end]
}

fn render_lockfile(dependencies: &[String]) -> String {
    let mut lock = String::from("version = 1\nrequires-python = \">=3.12\"\n");
    for dependency in dependencies {
        lock.push_str(&format!("\n[[package]]\nname = \"{}\"\nversion = \"1.0.0\"\n", package_name(dependency)));
    }
    lock
}

fn add_dependency(script: &str, dependency: &str) -> String {
    let entry = format!("#   \"{dependency}\",");
    let mut lines: Vec<String> = script.lines().map(str::to_string).collect();

    if let Some(i) = lines.iter().position(|l| l == "# dependencies = []") {
        lines.splice(i..=i, ["# dependencies = [".to_string(), entry, "# ]".to_string()]);
    } else if let Some(i) = lines.iter().position(|l| l == "# ]") {
        lines.insert(i, entry);
    } else if let Some(i) = lines.iter().rposition(|l| l == "# ///") {
        lines.splice(i..i, ["# dependencies = [".to_string(), entry, "# ]".to_string()]);
    }

    let mut out = lines.join("\n");
    if script.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_dependency_to_empty_list() {
        let updated = add_dependency("# /// script\n# dependencies = []\n# ///\n", "rich");
        assert_eq!(updated, "# /// script\n# dependencies = [\n#   \"rich\",\n# ]\n# ///\n");
        assert_eq!(dependencies(&updated), vec!["rich"]);
    }

    #[test]
    fn test_add_dependency_without_list() {
        let updated = add_dependency("# /// script\n# ///", "requests>=2.0");
        assert_eq!(updated, "# /// script\n# dependencies = [\n#   \"requests>=2.0\",\n# ]\n# ///");
    }

    #[test]
    fn test_add_dependency_appends() {
        let updated = add_dependency("# /// script\n# dependencies = [\n#   \"rich\",\n# ]\n# ///\n", "httpx");
        assert_eq!(dependencies(&updated), vec!["rich", "httpx"]);
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("requests>=2.0"), "requests");
        assert_eq!(package_name("httpx[http2]"), "httpx");
        assert_eq!(package_name("typing_extensions"), "typing_extensions");
    }

    #[test]
    fn test_lockfile_path() {
        assert_eq!(lockfile_path(Path::new("/w/script.py")), PathBuf::from("/w/script.py.lock"));
    }

    #[tokio::test]
    async fn test_fake_records_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeUv::new().failing(UvSubcommand::Lock, "nope");
        let script = dir.path().join("script.py");

        let init = fake.run(&UvInvocation::init("uv", &script, dir.path())).await.unwrap();
        assert!(init.success());
        assert!(script.exists());

        let lock = fake.run(&UvInvocation::lock("uv", &script, dir.path())).await.unwrap();
        assert_eq!(lock.exit_code, Some(1));
        assert_eq!(lock.stderr, "nope");

        assert_eq!(fake.subcommands(), vec![UvSubcommand::Init, UvSubcommand::Lock]);
    }
}
