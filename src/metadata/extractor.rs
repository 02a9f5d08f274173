//! Locate the PEP 723 metadata block inside script text.
//!
//! A block looks like:
//!
//! ```text
//! # /// script
//! # requires-python = ">=3.12"
//! # dependencies = []
//! # ///
//! ```
//!
//! The header, every interior line and the footer must start at column 0.
//! Interior lines are `#` alone or `#` followed by a space and content.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::WidgetError;

static METADATA_BLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^# /// (?P<type>[a-zA-Z0-9-]+)$\s(?P<content>(^#( .*)?$\s)+)^# ///$")
        .expect("metadata block pattern is valid")
});

/// A metadata block as found in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBlock {
    /// The type token from the header line (`script` for PEP 723 scripts).
    pub block_type: String,
    /// Interior lines verbatim, each including its trailing newline.
    pub content: String,
}

impl MetadataBlock {
    /// Render the block in canonical form: header, interior lines, footer.
    ///
    /// The result has no trailing newline after the footer.
    #[must_use]
    pub fn render(&self) -> String {
        format!("# /// {}\n{}# ///", self.block_type, self.content)
    }
}

/// Find the first metadata block in `text`, if any.
///
/// When a run of comment lines contains several `# ///` lines, the block
/// extends to the last of them.
#[must_use]
pub fn find_metadata_block(text: &str) -> Option<MetadataBlock> {
    let captures = METADATA_BLOCK_PATTERN.captures(text)?;
    Some(MetadataBlock {
        block_type: captures["type"].to_string(),
        content: captures["content"].to_string(),
    })
}

/// Extract the metadata block from tool-generated script text.
///
/// # Errors
///
/// Returns [`WidgetError::MetadataExtractionFailed`] when no block is present.
pub fn extract_metadata_block(text: &str) -> Result<MetadataBlock, WidgetError> {
    find_metadata_block(text).ok_or_else(|| {
        tracing::debug!("No metadata block found in {} bytes of script text", text.len());
        WidgetError::MetadataExtractionFailed
    })
}
