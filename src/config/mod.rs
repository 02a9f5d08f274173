//! Configuration for the service.
//!
//! Settings come from a TOML file (see [`server`] for the format and location)
//! with command-line flags layered on top through [`ConfigOverrides`].
//!
//! # Precedence
//!
//! 1. `serve` flags (`--listen`, `--base-url`, `--uv-path`, `--scratch-dir`)
//! 2. The config file given by `--config` / `PEP723_CONFIG`, else `~/.pep723/config.toml`
//! 3. Built-in defaults

pub mod server;

pub use server::{ConfigOverrides, DEFAULT_LISTEN_ADDRESS, ServerConfig};
