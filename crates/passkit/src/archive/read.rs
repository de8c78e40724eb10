//! Bundle archive validation and extraction.
//!
//! Extracts pass archives into a destination directory, typically a
//! temporary one scoped to a single verification run.

use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use zip::ZipArchive;

/// Validate that a path looks like a pass archive.
///
/// Checks that the file exists and has a ZIP signature.
///
/// # Errors
///
/// Returns [`Error::Io`] with kind `NotFound` if the file does not exist,
/// [`Error::Io`] if it cannot be read, and [`Error::Zip`] if it is too
/// short for the ZIP magic bytes or does not start with them.
pub fn validate_archive(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Bundle not found: {}", path.display()),
        )));
    }

    // Check ZIP magic bytes (PK)
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    if let Err(e) = file.read_exact(&mut magic) {
        // A file too short for the magic is malformed, not unreadable
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Err(Error::Zip(zip::result::ZipError::InvalidArchive(
                "Not a valid ZIP archive",
            )));
        }
        return Err(Error::Io(e));
    }

    // ZIP magic: PK\x03\x04 or PK\x05\x06 (empty) or PK\x07\x08 (spanned)
    if &magic[0..2] != b"PK" {
        return Err(Error::Zip(zip::result::ZipError::InvalidArchive(
            "Not a valid ZIP archive",
        )));
    }

    Ok(())
}

/// Extract a pass archive into a destination directory.
///
/// Returns the `/`-separated names of the extracted file members, in
/// archive order. Directory entries create directories but are not
/// reported as members.
///
/// # Errors
///
/// Returns an error if:
/// - The archive cannot be opened or is not a valid ZIP
/// - An entry name would escape the destination directory
/// - Extraction fails due to I/O errors
pub fn extract_archive(
    archive_path: impl AsRef<Path>,
    dest_dir: impl AsRef<Path>,
) -> Result<Vec<String>> {
    let archive_path = archive_path.as_ref();
    let dest_dir = dest_dir.as_ref();

    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(Error::Zip)?;

    fs::create_dir_all(dest_dir)?;

    let mut members = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(Error::Zip)?;

        // Reject names that would land outside the destination
        let outpath = match entry.enclosed_name() {
            Some(path) => dest_dir.join(path),
            None => {
                return Err(Error::Zip(zip::result::ZipError::InvalidArchive(
                    "Entry name escapes extraction directory",
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;

        // Restore file permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let perms = mode & 0o7777;
                fs::set_permissions(&outpath, fs::Permissions::from_mode(perms))?;
            }
        }

        members.push(entry.name().to_string());
    }

    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Create a minimal pass archive with a nested member.
    fn create_test_archive(dir: &Path) -> PathBuf {
        let archive_path = dir.join("test.pkpass");
        let file = File::create(&archive_path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        zip.start_file("pass.json", options).unwrap();
        zip.write_all(b"{\"serialNumber\":\"123\"}").unwrap();

        zip.start_file("icon.png", options).unwrap();
        zip.write_all(b"PNG_DATA").unwrap();

        zip.start_file("en.lproj/pass.strings", options).unwrap();
        zip.write_all(b"\"label\" = \"Hello\";").unwrap();

        zip.finish().unwrap();

        archive_path
    }

    #[test]
    fn test_validate_archive_valid() {
        let temp_dir = TempDir::new().unwrap();
        let archive_path = create_test_archive(temp_dir.path());

        assert!(validate_archive(&archive_path).is_ok());
    }

    #[test]
    fn test_validate_archive_not_found() {
        let result = validate_archive("/nonexistent/file.pkpass");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_validate_archive_invalid_format() {
        let temp_dir = TempDir::new().unwrap();
        let invalid_path = temp_dir.path().join("invalid.pkpass");
        fs::write(&invalid_path, b"not a zip file").unwrap();

        let result = validate_archive(&invalid_path);
        assert!(matches!(result, Err(Error::Zip(_))));
    }

    #[test]
    fn test_validate_archive_truncated_file() {
        let temp_dir = TempDir::new().unwrap();
        let tiny_path = temp_dir.path().join("tiny.pkpass");
        fs::write(&tiny_path, b"PK").unwrap();

        let result = validate_archive(&tiny_path);
        assert!(matches!(result, Err(Error::Zip(_))));
    }

    #[test]
    fn test_extract_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive_path = create_test_archive(temp_dir.path());
        let extract_dir = temp_dir.path().join("extracted");

        let members = extract_archive(&archive_path, &extract_dir).unwrap();

        assert_eq!(
            members,
            vec!["pass.json", "icon.png", "en.lproj/pass.strings"]
        );
        assert_eq!(
            fs::read(extract_dir.join("pass.json")).unwrap(),
            b"{\"serialNumber\":\"123\"}"
        );
        assert!(extract_dir.join("en.lproj/pass.strings").exists());
    }

    #[test]
    fn test_extract_archive_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = extract_archive("/nonexistent/file.pkpass", temp_dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_archive_not_a_zip() {
        let temp_dir = TempDir::new().unwrap();
        let invalid_path = temp_dir.path().join("invalid.pkpass");
        fs::write(&invalid_path, b"not a zip file").unwrap();

        let result = extract_archive(&invalid_path, temp_dir.path().join("out"));
        assert!(matches!(result, Err(Error::Zip(_))));
    }

    #[test]
    fn test_extract_archive_rejects_escaping_names() {
        let temp_dir = TempDir::new().unwrap();
        let archive_path = temp_dir.path().join("hostile.pkpass");

        let file = File::create(&archive_path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        zip.start_file("../escape.txt", options).unwrap();
        zip.write_all(b"outside").unwrap();
        zip.finish().unwrap();

        let extract_dir = temp_dir.path().join("extracted");
        let result = extract_archive(&archive_path, &extract_dir);
        assert!(matches!(result, Err(Error::Zip(_))));
        assert!(!temp_dir.path().join("escape.txt").exists());
    }
}
