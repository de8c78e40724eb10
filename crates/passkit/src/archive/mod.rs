//! Bundle archive packaging and extraction.
//!
//! Pass bundles are flat ZIP archives: every member is a file keyed by its
//! `/`-separated name, with no directory entries. [`write`] packages a
//! staged directory into that form; [`read`] validates and extracts it.

pub mod read;
pub mod write;

pub use read::{extract_archive, validate_archive};
pub use write::{archive_to_vec, write_archive, CompressionLevel};
