//! pep723-server - a small HTTP service for PEP 723 inline script metadata
//!
//! Notebook front-ends call this service to create, extend and inspect the
//! `# /// script` metadata block of a Python script. All dependency work is
//! delegated to [uv](https://docs.astral.sh/uv/): every request gets its own
//! scratch directory, runs `uv <subcommand> --script script.py` there, reads the
//! results back and removes the directory.
//!
//! # Endpoints
//!
//! | Method | Path | Request | Response |
//! |---|---|---|---|
//! | GET | `{base}pep723widget/get-example` | - | `{data}` |
//! | POST | `{base}pep723widget/initialize` | - | `{initial_metadata, lockfile_content}` |
//! | POST | `{base}pep723widget/add-dependency` | `{script_metadata, dependency, lockfile_content?}` | `{updated_metadata, lockfile_content, tree_output}` |
//! | POST | `{base}pep723widget/get-tree` | `{script_metadata, lockfile_content?}` | `{tree_output, lockfile_content}` |
//!
//! Failures are `{error}` with status 400 (bad input) or 500 (everything else).
//!
//! # Modules
//!
//! - [`cli`] - `serve` and `doctor` commands
//! - [`config`] - `~/.pep723/config.toml` and command-line overrides
//! - [`core`] - error types and user-facing error rendering
//! - [`metadata`] - locating the metadata block in script text
//! - [`operations`] - the request pipelines
//! - [`server`] - axum routing and HTTP error mapping
//! - [`utils`] - dependency specifier validation and path expansion
//! - [`uv`] - locating and running uv
//! - [`workspace`] - per-request scratch directories
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pep723_server::operations::ScriptService;
//! use pep723_server::uv::{ProcessRunner, SystemLocator};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = ScriptService::new(
//!     Arc::new(SystemLocator::new()),
//!     Arc::new(ProcessRunner::new()),
//!     std::env::temp_dir(),
//! );
//! let created = service.initialize().await?;
//! println!("{}", created.initial_metadata);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod metadata;
pub mod operations;
pub mod server;
pub mod utils;
pub mod uv;
pub mod workspace;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
