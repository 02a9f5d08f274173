//! Core types shared across the service
//!
//! # Modules
//!
//! ## `error` - Error Handling
//!
//! - [`WidgetError`] - Enumerated failure modes, each mapped to an HTTP status
//! - [`ErrorContext`] - User-friendly error wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any error to user-friendly format
//!
//! # Examples
//!
//! ```rust
//! use pep723_server::core::{WidgetError, user_friendly_error};
//! use anyhow::Result;
//!
//! fn example_operation() -> Result<String> {
//!     Err(WidgetError::MetadataExtractionFailed.into())
//! }
//!
//! if let Err(e) = example_operation() {
//!     let friendly = user_friendly_error(e);
//!     assert!(friendly.to_string().contains("PEP 723"));
//! }
//! ```

pub mod error;

pub use error::{ErrorContext, WidgetError, user_friendly_error};
