//! Path expansion for user-supplied configuration values.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Resolves a configured path with tilde expansion and environment variable
/// substitution.
///
/// # Supported Patterns
///
/// - `~/path` - Expands to `{home}/path`
/// - `$VAR/path` or `${VAR}/path` - Expands environment variables
///
/// # Examples
///
/// ```rust,no_run
/// use pep723_server::utils::expand_path;
///
/// # fn example() -> anyhow::Result<()> {
/// let uv = expand_path("~/.local/bin/uv")?;
/// println!("uv: {}", uv.display());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Fails on `~user` forms, when the home directory cannot be determined, or
/// when a referenced environment variable is not set.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    if path.starts_with('~') && path != "~" && !path.starts_with("~/") {
        return Err(anyhow::anyhow!(
            "Invalid path: {path}\n\n\
            Tilde expansion only supports '~/' for the home directory"
        ));
    }

    let expanded = shellexpand::full(path).with_context(|| {
        format!(
            "Failed to expand path: {path}\n\n\
            Common issues:\n\
            - Undefined environment variable (e.g., $UNDEFINED_VAR)\n\
            - Invalid variable syntax (use $VAR or ${{VAR}})"
        )
    })?;

    Ok(PathBuf::from(expanded.into_owned()))
}
