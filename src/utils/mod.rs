//! Shared helpers
//!
//! # Modules
//!
//! - [`security`] - Allow-list validation for dependency specifiers
//! - [`paths`] - Home-directory and environment expansion for configured paths

pub mod paths;
pub mod security;

pub use paths::expand_path;
pub use security::{is_valid_dependency_spec, validate_dependency_spec};
