//! Builder for uv process invocations
//!
//! Mirrors how the service drives uv: one subcommand, a handful of
//! arguments, a working directory, captured output. Unlike a typical command
//! wrapper it does not turn a non-zero exit status into an error; callers
//! inspect [`UvCommandOutput::exit_code`] themselves because some steps
//! (`uv tree`) are allowed to fail.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::WidgetError;

/// Fluent builder for a single uv invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use pep723_server::uv::command_builder::UvCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let output = UvCommand::new("/usr/local/bin/uv")
///     .args(["lock", "--script", "script.py"])
///     .current_dir("/tmp/pep723_scratch")
///     .execute()
///     .await?;
///
/// if output.exit_code != Some(0) {
///     eprintln!("uv lock failed: {}", output.stderr);
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Default Configuration
///
/// - **Timeout**: none; a hung uv process hangs the caller
/// - **Working directory**: current process directory
/// - **Environment**: inherited from the parent process
pub struct UvCommand {
    /// Path of the uv executable
    program: PathBuf,

    /// Arguments passed to uv (e.g. ["add", "--script", "script.py", "requests"])
    args: Vec<String>,

    /// Working directory for command execution
    current_dir: Option<PathBuf>,

    /// Environment variables to set for the uv process
    env_vars: Vec<(String, String)>,

    /// Maximum duration to wait for the process (None = wait forever)
    timeout_duration: Option<Duration>,

    /// Optional context string for log messages
    context: Option<String>,
}

impl UvCommand {
    /// Creates a builder for the given executable with no arguments.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            timeout_duration: None,
            context: None,
        }
    }

    /// Create a `uv --version` command
    pub fn version(program: impl AsRef<Path>) -> Self {
        Self::new(program).arg("--version")
    }

    /// Sets the working directory for the process.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the uv process.
    ///
    /// Useful for `NO_COLOR=1` so captured tree output carries no ANSI codes.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a custom timeout for the command (None for no timeout)
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set a context for logging (e.g., the scratch directory name)
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    /// Execute the command and capture its output.
    ///
    /// # Errors
    ///
    /// Fails only when the process cannot be spawned or exceeds the timeout.
    /// A non-zero exit status is reported through the returned output.
    pub async fn execute(self) -> Result<UvCommandOutput> {
        let start = std::time::Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        let command_line = format!("{} {}", self.program.display(), self.args.join(" "));
        if let Some(ref ctx) = self.context {
            tracing::debug!(target: "uv", "({}) Executing command: {}", ctx, command_line);
        } else {
            tracing::debug!(target: "uv", "Executing command: {}", command_line);
        }

        for (key, value) in &self.env_vars {
            tracing::trace!(target: "uv", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output_future = cmd.output();

        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.with_context(|| format!("Failed to execute {command_line}"))?
            } else {
                tracing::warn!(
                    target: "uv",
                    "Command timed out after {} seconds: {}",
                    duration.as_secs(),
                    command_line
                );
                return Err(WidgetError::ToolCommandFailed {
                    operation: self.operation(),
                    stderr: format!("uv command timed out after {} seconds", duration.as_secs()),
                }
                .into());
            }
        } else {
            output_future.await.with_context(|| format!("Failed to execute {command_line}"))?
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code();

        if output.status.success() {
            if !stdout.is_empty() {
                tracing::trace!(target: "uv", "{}", stdout.trim());
            }
        } else {
            tracing::debug!(target: "uv", "Command failed with exit code: {:?}", exit_code);
            if !stderr.is_empty() {
                tracing::debug!(target: "uv", "Error: {}", stderr.trim());
            }
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "uv::perf", "uv {} took {:.2}s", self.operation(), elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "uv::perf", "uv {} took {}ms", self.operation(), elapsed.as_millis());
        }

        Ok(UvCommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Execute the command and return trimmed stdout, failing on non-zero exit.
    pub async fn execute_stdout(self) -> Result<String> {
        let operation = self.operation();
        let output = self.execute().await?;
        if output.exit_code == Some(0) {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(WidgetError::ToolCommandFailed {
                operation,
                stderr: output.stderr,
            }
            .into())
        }
    }
}

/// Output from a uv process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UvCommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}
