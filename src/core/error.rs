//! Error handling for the PEP 723 service
//!
//! Two audiences consume these errors:
//! 1. **HTTP callers**, who get a status code and a one-line `{ "error": ... }` body
//! 2. **CLI users**, who get a colored message with details and a suggestion
//!
//! # Architecture
//!
//! - [`WidgetError`] - every failure the service distinguishes
//! - [`ErrorContext`] - wrapper adding details and a suggestion for terminal output
//!
//! # Error Categories
//!
//! - **Malformed input**: [`WidgetError::InvalidJson`]
//! - **Validation**: [`WidgetError::MissingField`], [`WidgetError::InvalidDependency`]
//! - **Dependency tool**: [`WidgetError::ToolNotFound`], [`WidgetError::ToolCommandFailed`]
//! - **Extraction**: [`WidgetError::MetadataExtractionFailed`]
//! - **Local resources**: [`WidgetError::Workspace`]
//! - **Configuration**: [`WidgetError::ConfigError`]
//!
//! The first three categories carry messages that are returned to HTTP callers
//! verbatim. Anything else is reported as an internal server error.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pep723_server::core::{WidgetError, user_friendly_error};
//!
//! let error = WidgetError::ToolNotFound {
//!     reason: "uv was not found in PATH".to_string(),
//! };
//! assert_eq!(error.status_code(), 500);
//!
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for service operations.
///
/// The `Display` text of the caller-facing variants is exactly what ends up in
/// the JSON `error` field, so the wording is part of the HTTP contract.
#[derive(Error, Debug)]
pub enum WidgetError {
    /// The request body is not a JSON object of the expected shape.
    #[error("Invalid JSON in request body")]
    InvalidJson,

    /// A required request field is absent or empty.
    #[error("{message}")]
    MissingField {
        /// Caller-facing description of what is missing
        message: String,
    },

    /// A dependency specifier failed the character allow-list.
    #[error("Invalid dependency name")]
    InvalidDependency {
        /// The rejected specifier
        dependency: String,
    },

    /// The dependency tool executable could not be located.
    ///
    /// Common solutions:
    /// - Install uv from <https://docs.astral.sh/uv/>
    /// - Point `uv_path` in the config file at the binary
    #[error("uv not available: {reason}")]
    ToolNotFound {
        /// Why the lookup failed
        reason: String,
    },

    /// A required dependency tool step exited unsuccessfully.
    #[error("uv {operation} failed: {stderr}")]
    ToolCommandFailed {
        /// The subcommand that failed (e.g. "lock", "add")
        operation: String,
        /// Captured standard error of the tool
        stderr: String,
    },

    /// The tool-generated script does not contain a metadata block.
    #[error("Failed to extract PEP 723 metadata from generated script")]
    MetadataExtractionFailed,

    /// A scratch workspace file operation failed.
    #[error("Workspace error: failed to {operation} {path}")]
    Workspace {
        /// The operation that failed (e.g. "write", "read")
        operation: String,
        /// Path involved in the failure
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl WidgetError {
    /// HTTP status code this error maps to.
    ///
    /// Input problems are the caller's fault (400); every other failure,
    /// including a missing or failing dependency tool, is a server-side
    /// condition (500).
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidJson | Self::MissingField { .. } | Self::InvalidDependency { .. } => 400,
            _ => 500,
        }
    }

    /// Whether the `Display` text may be sent to HTTP callers unchanged.
    ///
    /// Unexpected failures are wrapped as `Internal server error: ...` instead.
    #[must_use]
    pub const fn is_caller_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidJson
                | Self::MissingField { .. }
                | Self::InvalidDependency { .. }
                | Self::ToolNotFound { .. }
                | Self::ToolCommandFailed { .. }
                | Self::MetadataExtractionFailed
        )
    }

    /// Shorthand for a [`WidgetError::MissingField`].
    pub fn missing_field(message: impl Into<String>) -> Self {
        Self::MissingField {
            message: message.into(),
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps a [`WidgetError`] and adds optional details and a
/// suggestion. The CLI uses it to present failures of `serve` and `doctor`.
///
/// # Display Format
///
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context in yellow (optional)
/// 3. **Suggestion**: Actionable steps in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: WidgetError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: WidgetError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`WidgetError`] variants and [`std::io::Error`] kinds; anything
/// else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(widget_error) = error.downcast_ref::<WidgetError>() {
        return create_error_context(widget_error);
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::AddrInUse => {
                return ErrorContext::new(WidgetError::Other {
                    message: format!("Cannot bind listen address: {io_error}"),
                })
                .with_suggestion(
                    "Stop the process using the port or pass a different --listen address",
                );
            }
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(WidgetError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Check file ownership and permissions of the paths involved")
                .with_details(
                    "This error occurs when the service cannot read or write a required file",
                );
            }
            _ => {}
        }
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(WidgetError::Other {
        message,
    })
}

fn create_error_context(error: &WidgetError) -> ErrorContext {
    match error {
        WidgetError::ToolNotFound {
            reason,
        } => ErrorContext::new(WidgetError::ToolNotFound {
            reason: reason.clone(),
        })
        .with_suggestion(
            "Install uv (https://docs.astral.sh/uv/) or set `uv_path` in the config file",
        )
        .with_details("The service shells out to uv for every metadata operation"),
        WidgetError::ToolCommandFailed {
            operation,
            stderr,
        } => ErrorContext::new(WidgetError::ToolCommandFailed {
            operation: operation.clone(),
            stderr: stderr.clone(),
        })
        .with_suggestion(format!("Run `uv {operation} --script <file>` manually to inspect the failure")),
        WidgetError::ConfigError {
            message,
        } => ErrorContext::new(WidgetError::ConfigError {
            message: message.clone(),
        })
        .with_suggestion("Check the config file against the documented keys")
        .with_details(
            "Known keys: listen_address, base_url, uv_path, scratch_dir, tool_timeout_secs, max_body_bytes",
        ),
        other => ErrorContext::new(WidgetError::Other {
            message: other.to_string(),
        }),
    }
}
