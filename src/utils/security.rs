//! Input validation for values that end up on a subprocess command line
//!
//! Dependency specifiers are passed to `uv add` as a single argument. The
//! allow-list below keeps them to package names, extras and version
//! constraints so they can never be read as anything but one argument token.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::WidgetError;

/// Maximum accepted length of a dependency specifier, in characters.
pub const MAX_DEPENDENCY_SPEC_LEN: usize = 200;

/// Characters allowed in a dependency specifier: ASCII alphanumerics,
/// `-_.`, extras brackets, whitespace and the comparison/list characters
/// `<>=!,`.
static DEPENDENCY_SPEC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9\-_\.\[\]\s<>=!,]+$").expect("dependency allow-list pattern is valid")
});

/// Check a dependency specifier against the allow-list.
///
/// Purely syntactic: `requests>=2.0` and `not-a-real-package` both pass.
///
/// # Examples
/// ```
/// use pep723_server::utils::security::is_valid_dependency_spec;
///
/// assert!(is_valid_dependency_spec("requests>=2.0"));
/// assert!(is_valid_dependency_spec("httpx[http2] >=0.27, <1"));
/// assert!(!is_valid_dependency_spec("req; rm -rf /"));
/// assert!(!is_valid_dependency_spec(""));
/// ```
#[must_use]
pub fn is_valid_dependency_spec(dependency: &str) -> bool {
    dependency.chars().count() <= MAX_DEPENDENCY_SPEC_LEN
        && DEPENDENCY_SPEC_PATTERN.is_match(dependency)
}

/// Validate a dependency specifier, returning [`WidgetError::InvalidDependency`]
/// when it is empty, too long, or contains a disallowed character.
pub fn validate_dependency_spec(dependency: &str) -> Result<(), WidgetError> {
    if is_valid_dependency_spec(dependency) {
        Ok(())
    } else {
        tracing::debug!("Rejected dependency specifier: {:?}", dependency);
        Err(WidgetError::InvalidDependency {
            dependency: dependency.to_string(),
        })
    }
}
