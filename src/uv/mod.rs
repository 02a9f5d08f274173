//! Dependency tool (uv) integration
//!
//! Every operation the service performs on a script is a `uv <sub> --script
//! <file>` invocation inside a scratch workspace. This module provides:
//!
//! - [`UvSubcommand`] / [`UvInvocation`] - what to run
//! - [`ToolRunner`] - how to run it; [`ProcessRunner`] spawns real processes,
//!   tests substitute an in-process fake
//! - [`ToolLocator`] - where uv lives; [`SystemLocator`] searches `PATH`
//! - [`command_builder::UvCommand`] - the process builder behind [`ProcessRunner`]
//!
//! # Example
//!
//! ```rust,no_run
//! use pep723_server::uv::{ProcessRunner, SystemLocator, ToolLocator, ToolRunner, UvInvocation};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let uv = SystemLocator::new().locate()?;
//! let dir = Path::new("/tmp/pep723_scratch");
//! let invocation = UvInvocation::lock(&uv, &dir.join("script.py"), dir);
//! let output = ProcessRunner::new().run(&invocation).await?;
//! println!("exit code: {:?}", output.exit_code);
//! # Ok(())
//! # }
//! ```

pub mod command_builder;
pub mod locator;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use command_builder::{UvCommand, UvCommandOutput};
pub use locator::{SystemLocator, ToolLocator, UV_BINARY_NAME};

/// The uv subcommands the service uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UvSubcommand {
    /// `uv init --script`: create a new script skeleton with a metadata block
    Init,
    /// `uv lock --script`: write `<script>.lock` next to the script
    Lock,
    /// `uv add --script`: add a dependency to the metadata block
    Add,
    /// `uv tree --script`: print the resolved dependency tree
    Tree,
}

impl UvSubcommand {
    /// The subcommand as passed on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Lock => "lock",
            Self::Add => "add",
            Self::Tree => "tree",
        }
    }
}

impl fmt::Display for UvSubcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully specified uv invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UvInvocation {
    /// Path of the uv executable
    pub program: PathBuf,
    /// Subcommand to run
    pub subcommand: UvSubcommand,
    /// Arguments following the subcommand
    pub args: Vec<String>,
    /// Working directory of the process
    pub current_dir: PathBuf,
}

impl UvInvocation {
    /// `uv <subcommand> --script <script>` run inside `current_dir`.
    pub fn for_script(
        program: impl Into<PathBuf>,
        subcommand: UvSubcommand,
        script: &Path,
        current_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            subcommand,
            args: vec!["--script".to_string(), script.display().to_string()],
            current_dir: current_dir.into(),
        }
    }

    /// `uv init --script <script>`
    pub fn init(program: impl Into<PathBuf>, script: &Path, current_dir: impl Into<PathBuf>) -> Self {
        Self::for_script(program, UvSubcommand::Init, script, current_dir)
    }

    /// `uv lock --script <script>`
    pub fn lock(program: impl Into<PathBuf>, script: &Path, current_dir: impl Into<PathBuf>) -> Self {
        Self::for_script(program, UvSubcommand::Lock, script, current_dir)
    }

    /// `uv add --script <script> -- <dependency>`
    ///
    /// The `--` keeps a specifier starting with `-` from being read as an option.
    pub fn add(
        program: impl Into<PathBuf>,
        script: &Path,
        dependency: &str,
        current_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut invocation = Self::for_script(program, UvSubcommand::Add, script, current_dir);
        invocation.args.push("--".to_string());
        invocation.args.push(dependency.to_string());
        invocation
    }

    /// `uv tree --script <script>`
    pub fn tree(program: impl Into<PathBuf>, script: &Path, current_dir: impl Into<PathBuf>) -> Self {
        Self::for_script(program, UvSubcommand::Tree, script, current_dir)
    }

    /// Arguments as passed to the process: subcommand first.
    #[must_use]
    pub fn command_args(&self) -> Vec<String> {
        std::iter::once(self.subcommand.as_str().to_string()).chain(self.args.iter().cloned()).collect()
    }
}

/// Captured result of a uv invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the process exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl From<UvCommandOutput> for ToolOutput {
    fn from(output: UvCommandOutput) -> Self {
        Self {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Runs uv invocations.
///
/// Implementations must not treat a non-zero exit status as an error; that
/// decision belongs to the caller. `Err` is reserved for failing to run the
/// process at all.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `invocation` to completion and capture its output.
    async fn run(&self, invocation: &UvInvocation) -> Result<ToolOutput>;
}

/// [`ToolRunner`] that spawns real uv processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Runner without a timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that abandons (and kills) processes running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
        }
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &UvInvocation) -> Result<ToolOutput> {
        let context = invocation
            .current_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let output = UvCommand::new(&invocation.program)
            .args(invocation.command_args())
            .current_dir(&invocation.current_dir)
            .env("NO_COLOR", "1")
            .with_timeout(self.timeout)
            .with_context(context)
            .execute()
            .await?;

        Ok(output.into())
    }
}
