//! Manifest generation and cross-checking.
//!
//! A pass bundle carries a `manifest.json` mapping every member name to the
//! SHA-1 digest of its contents. The manifest itself and the `signature`
//! member are the only files excluded from that mapping (they cannot
//! reference themselves). The serialized form is canonical: keys are sorted
//! and the JSON layout is fixed, so identical inputs always produce
//! byte-identical manifests. This matters because the signature covers the
//! exact serialized bytes and verification re-derives comparable bytes
//! independently.

use crate::digest::digest_file;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Bundle member holding the opaque pass descriptor.
pub const DESCRIPTOR_NAME: &str = "pass.json";
/// Bundle member holding the serialized manifest.
pub const MANIFEST_NAME: &str = "manifest.json";
/// Bundle member holding the detached signature.
pub const SIGNATURE_NAME: &str = "signature";

/// Members every bundle must contain, non-empty.
pub const REQUIRED_MEMBERS: [&str; 3] = [DESCRIPTOR_NAME, MANIFEST_NAME, SIGNATURE_NAME];

/// Builder that derives a manifest from a staged bundle directory.
///
/// # Examples
///
/// ```no_run
/// use passkit::manifest::ManifestBuilder;
///
/// let mut builder = ManifestBuilder::new("/path/to/staging");
/// builder.scan()?;
/// let manifest_bytes = builder.build()?;
/// # Ok::<(), passkit::Error>(())
/// ```
pub struct ManifestBuilder {
    /// Root of the staged bundle
    staging_path: PathBuf,
    /// Member name -> hex digest
    entries: BTreeMap<String, String>,
}

impl ManifestBuilder {
    /// Create a new builder rooted at the given staging directory.
    pub fn new(staging_path: impl AsRef<Path>) -> Self {
        Self {
            staging_path: staging_path.as_ref().to_path_buf(),
            entries: BTreeMap::new(),
        }
    }

    /// Whether a member name is excluded from the manifest.
    ///
    /// Only the manifest and signature artifacts themselves are excluded;
    /// the descriptor and every asset are listed.
    fn should_exclude(name: &str) -> bool {
        name == MANIFEST_NAME || name == SIGNATURE_NAME
    }

    /// Walk the staging directory and hash every regular file.
    ///
    /// Directories contribute no entries of their own; files inside
    /// subdirectories are keyed by their `/`-separated relative path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the walk fails or a file cannot be read.
    pub fn scan(&mut self) -> Result<&mut Self> {
        let staging_path = self.staging_path.clone();

        for entry in WalkDir::new(&staging_path).follow_links(false) {
            let entry = entry.map_err(|e| {
                Error::Io(io::Error::other(format!(
                    "Failed to walk staging directory: {}",
                    e
                )))
            })?;

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&staging_path).map_err(|_| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Failed to compute relative path",
                ))
            })?;
            let name = member_name(relative);

            if Self::should_exclude(&name) {
                continue;
            }

            let digest = digest_file(path)?;
            self.entries.insert(name, digest);
        }

        Ok(self)
    }

    /// Add an entry manually.
    pub fn add_entry(&mut self, name: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(name.into(), digest.into());
    }

    /// The collected entries, sorted by member name.
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Number of entries collected so far.
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    /// Serialize the manifest to its canonical JSON form.
    ///
    /// Two-space-indented JSON with keys in sorted order; repeated builds
    /// over identical inputs are byte-identical.
    pub fn build(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.entries)?)
    }
}

/// Parse a stored manifest into its name -> digest mapping.
///
/// # Errors
///
/// Returns [`Error::Json`] if the bytes are not a JSON object of strings.
pub fn parse(bytes: &[u8]) -> Result<BTreeMap<String, String>> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Compare a stored manifest against a freshly derived one.
///
/// Reports every discrepancy in both directions: digest mismatches,
/// manifest entries whose file is gone, and files the manifest never
/// listed. An empty result means the two mappings agree exactly.
pub fn compare(
    stored: &BTreeMap<String, String>,
    derived: &BTreeMap<String, String>,
) -> Vec<EntryFault> {
    let mut faults = Vec::new();

    for (name, expected) in stored {
        match derived.get(name) {
            None => faults.push(EntryFault::Missing { name: name.clone() }),
            Some(actual) if actual != expected => faults.push(EntryFault::DigestMismatch {
                name: name.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            }),
            Some(_) => {}
        }
    }

    for name in derived.keys() {
        if !stored.contains_key(name) {
            faults.push(EntryFault::Unlisted { name: name.clone() });
        }
    }

    faults
}

/// A single manifest discrepancy found during verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryFault {
    /// The stored digest does not match the extracted file's bytes.
    DigestMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    /// The manifest lists a file that is not present in the bundle.
    Missing { name: String },
    /// The bundle contains a file the manifest does not list.
    Unlisted { name: String },
}

impl EntryFault {
    /// The member name this fault refers to.
    pub fn name(&self) -> &str {
        match self {
            EntryFault::DigestMismatch { name, .. }
            | EntryFault::Missing { name }
            | EntryFault::Unlisted { name } => name,
        }
    }
}

impl fmt::Display for EntryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryFault::DigestMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "{}: digest mismatch (expected {}, actual {})",
                name, expected, actual
            ),
            EntryFault::Missing { name } => {
                write!(f, "{}: listed in manifest but missing from bundle", name)
            }
            EntryFault::Unlisted { name } => {
                write!(f, "{}: present in bundle but not listed in manifest", name)
            }
        }
    }
}

/// Convert a relative path to a `/`-separated member name.
///
/// Zip member names and manifest keys use forward slashes on every
/// platform.
pub(crate) fn member_name(relative: &Path) -> String {
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    parts.join("/")
}
