//! Bundle archive creation.
//!
//! Packages a staged bundle directory into a flat ZIP archive. The archive
//! namespace contains exactly the staged files; directories contribute no
//! entries of their own. Output is written to a temporary file in the
//! destination directory and renamed into place.
//!
//! For the reverse operation, see the [`read`](super::read) module.
//!
//! # Examples
//!
//! ```no_run
//! use passkit::archive::{write_archive, CompressionLevel};
//! use std::path::Path;
//!
//! let staging = Path::new("/tmp/pass-staging");
//! write_archive(staging, "Event.pkpass", CompressionLevel::MAX)?;
//! # Ok::<(), passkit::Error>(())
//! ```

use crate::manifest::member_name;
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// ZIP compression level for bundle packaging.
///
/// Controls the trade-off between compression speed and output file size.
/// Use the provided constants for common use cases, or [`CompressionLevel::new`]
/// for custom levels.
///
/// # Examples
///
/// ```
/// use passkit::CompressionLevel;
///
/// // Use predefined levels
/// let fast = CompressionLevel::NONE;        // No compression
/// let balanced = CompressionLevel::DEFAULT; // Level 6
/// let small = CompressionLevel::MAX;        // Maximum compression
///
/// // Or create a custom level (clamped to 0-9)
/// let custom = CompressionLevel::new(3);
/// assert_eq!(custom.level(), 3);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression (level 0).
    ///
    /// Fastest creation, largest file size. Members are stored rather
    /// than deflated.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default compression (level 6).
    ///
    /// Balanced trade-off between compression speed and output size.
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum compression (level 9).
    ///
    /// Smallest file size, slowest creation. Pass bundles are small and
    /// downloaded by devices, so builders default to this.
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Package a staged bundle directory into a `.pkpass` archive.
///
/// An existing file at `output_path` is replaced. The archive becomes
/// visible at `output_path` only once it is completely written.
///
/// # Arguments
///
/// * `staging_path` - Directory holding the finalized bundle members
/// * `output_path` - Path for the output archive
/// * `compression_level` - ZIP compression level (see [`CompressionLevel`])
///
/// # Errors
///
/// Returns [`Error::Io`] if:
/// - The staging directory doesn't exist or is not a directory
/// - The output file cannot be created or renamed into place
/// - Any file cannot be read during archiving
///
/// Returns [`Error::Zip`] if the ZIP archive cannot be written.
pub fn write_archive(
    staging_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    compression_level: CompressionLevel,
) -> Result<()> {
    let staging_path = staging_path.as_ref();
    let output_path = output_path.as_ref();

    // Validate staging directory exists
    if !staging_path.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Staging directory not found: {}", staging_path.display()),
        )));
    }

    if !staging_path.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Not a directory: {}", staging_path.display()),
        )));
    }

    // Create parent directories for output if needed
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    // Write into a temp file beside the destination, then rename into place
    let staging_parent = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(staging_parent)?;
    write_archive_to(staging_path, tmp.as_file_mut(), compression_level)?;
    tmp.persist(output_path).map_err(|e| Error::Io(e.error))?;

    Ok(())
}

/// Package a staged bundle directory and return the archive bytes.
pub fn archive_to_vec(
    staging_path: impl AsRef<Path>,
    compression_level: CompressionLevel,
) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_archive_to(staging_path.as_ref(), &mut cursor, compression_level)?;
    Ok(cursor.into_inner())
}

fn write_archive_to<W: Write + Seek>(
    staging_path: &Path,
    writer: W,
    compression_level: CompressionLevel,
) -> Result<()> {
    let mut zip = ZipWriter::new(writer);

    // Configure compression options
    let options = if compression_level.level() == 0 {
        // For stored (no compression), don't set compression level
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        // For deflate, set the compression level
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level.level() as i64))
    };

    // Walk the staging directory and add every file - don't follow symlinks
    for entry in WalkDir::new(staging_path).follow_links(false) {
        let entry = entry.map_err(|e| {
            Error::Io(io::Error::other(format!("Failed to walk directory: {}", e)))
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(staging_path).map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Failed to compute relative path",
            ))
        })?;
        let archive_name = member_name(relative);

        #[cfg(unix)]
        let options = {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::symlink_metadata(path)?.permissions().mode();
            options.unix_permissions(mode)
        };

        zip.start_file(archive_name.as_str(), options)
            .map_err(Error::Zip)?;

        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        zip.write_all(&buffer)?;
    }

    // Finalize the archive
    zip.finish().map_err(Error::Zip)?;

    Ok(())
}
