//! PEP 723 inline script metadata handling.
//!
//! Recognition is a textual pattern match; the block interior is never parsed
//! as TOML. See [`extractor`] for the exact rules.

pub mod extractor;

pub use extractor::{MetadataBlock, extract_metadata_block, find_metadata_block};
