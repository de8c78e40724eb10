//! Pass builder API
//!
//! Provides a builder pattern interface for assembling, signing, and
//! packaging pass bundles.

use crate::archive::{archive_to_vec, write_archive, CompressionLevel};
use crate::crypto::{smime, SigningIdentity};
use crate::manifest::{
    member_name, ManifestBuilder, DESCRIPTOR_NAME, MANIFEST_NAME, SIGNATURE_NAME,
};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

/// Pass bundle builder with a chainable configuration API.
///
/// Collects the descriptor and assets, then [`build`](PassBuilder::build)
/// stages them, derives the manifest, signs it, and packages the archive.
///
/// # Example
///
/// ```ignore
/// use passkit::{PassBuilder, SigningIdentity};
///
/// let identity = SigningIdentity::from_pem_files("cert.pem", "key.pem", "wwdr.pem", None)?;
/// PassBuilder::new()
///     .descriptor_file("pass.json")
///     .asset_dir("assets/")
///     .build(&identity, "Event.pkpass")?;
/// ```
#[derive(Clone)]
pub struct PassBuilder {
    descriptor: Option<Vec<u8>>,
    descriptor_path: Option<PathBuf>,
    assets: BTreeMap<String, Vec<u8>>,
    asset_dir: Option<PathBuf>,
    compression_level: CompressionLevel,
}

impl Default for PassBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PassBuilder {
    /// Create a new pass builder.
    pub fn new() -> Self {
        Self {
            descriptor: None,
            descriptor_path: None,
            assets: BTreeMap::new(),
            asset_dir: None,
            compression_level: CompressionLevel::MAX,
        }
    }

    /// Set the descriptor from in-memory bytes.
    ///
    /// The bytes are carried into the bundle unchanged; they must parse as
    /// JSON but their content is otherwise opaque. Use either this or
    /// [`descriptor_file`](PassBuilder::descriptor_file), not both.
    pub fn descriptor(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.descriptor = Some(bytes.into());
        self
    }

    /// Set the descriptor source file.
    ///
    /// Use either this or [`descriptor`](PassBuilder::descriptor), not both.
    pub fn descriptor_file(mut self, path: impl AsRef<Path>) -> Self {
        self.descriptor_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add a single asset from in-memory bytes.
    ///
    /// The name becomes the archive member name and may contain `/` for
    /// nested assets such as `en.lproj/pass.strings`.
    pub fn asset(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(name.into(), bytes.into());
        self
    }

    /// Add every file under a directory as assets.
    ///
    /// Files keep their directory-relative, `/`-separated names.
    pub fn asset_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.asset_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set ZIP compression level for the output archive (0-9).
    ///
    /// 0 = no compression (fastest), 9 = maximum compression (smallest).
    /// Default is 9; bundles are small and shipped to devices.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = CompressionLevel::new(level);
        self
    }

    /// Validate the builder configuration.
    ///
    /// Returns an error if:
    /// - Both inline and file descriptor sources are specified
    /// - Neither descriptor source is specified
    /// - An asset name is empty, non-relative, traversing, or reserved
    pub fn validate(&self) -> Result<()> {
        let has_inline = self.descriptor.is_some();
        let has_file = self.descriptor_path.is_some();

        if has_inline && has_file {
            return Err(Error::Config(
                "Cannot specify both an inline descriptor and a descriptor file".into(),
            ));
        }

        if !has_inline && !has_file {
            return Err(Error::Config(
                "Must specify a descriptor, inline or as a file".into(),
            ));
        }

        for name in self.assets.keys() {
            validate_asset_name(name)?;
        }

        Ok(())
    }

    /// Build the bundle and write the archive to `output_path`.
    ///
    /// Stages everything in a scoped temporary directory: descriptor,
    /// assets, derived manifest, and detached signature over the manifest
    /// bytes. The staging area is removed on every exit path; an existing
    /// archive at `output_path` is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid or the descriptor is not JSON
    /// - An asset cannot be read or collides with another member
    /// - Signing fails or produces empty output
    /// - The archive cannot be written
    pub fn build(&self, identity: &SigningIdentity, output_path: impl AsRef<Path>) -> Result<()> {
        let staging = self.stage(identity)?;
        write_archive(staging.path(), output_path.as_ref(), self.compression_level)?;

        debug!("Bundle written to {}", output_path.as_ref().display());
        Ok(())
    }

    /// Build the bundle and return the archive bytes.
    pub fn build_to_vec(&self, identity: &SigningIdentity) -> Result<Vec<u8>> {
        let staging = self.stage(identity)?;
        archive_to_vec(staging.path(), self.compression_level)
    }

    /// Stage descriptor, assets, manifest, and signature into a scoped
    /// temporary directory ready for archiving.
    fn stage(&self, identity: &SigningIdentity) -> Result<TempDir> {
        self.validate()?;

        let descriptor = match (&self.descriptor, &self.descriptor_path) {
            (Some(bytes), _) => bytes.clone(),
            (None, Some(path)) => fs::read(path)?,
            (None, None) => {
                return Err(Error::Config(
                    "Must specify a descriptor, inline or as a file".into(),
                ))
            }
        };

        // The descriptor must at least parse; content stays opaque
        serde_json::from_slice::<serde_json::Value>(&descriptor)
            .map_err(|e| Error::Config(format!("Descriptor is not valid JSON: {}", e)))?;

        let staging = TempDir::new().map_err(|e| {
            Error::Io(io::Error::other(format!(
                "Failed to create staging directory: {}",
                e
            )))
        })?;

        let mut staged: BTreeSet<String> = BTreeSet::new();
        staged.insert(DESCRIPTOR_NAME.to_string());
        fs::write(staging.path().join(DESCRIPTOR_NAME), &descriptor)?;

        if let Some(ref asset_dir) = self.asset_dir {
            self.stage_asset_dir(asset_dir, staging.path(), &mut staged)?;
        }

        for (name, bytes) in &self.assets {
            stage_member(staging.path(), name, &mut staged)?;
            fs::write(staging.path().join(name), bytes)?;
        }

        debug!("Staged {} bundle member(s)", staged.len());

        // Manifest over everything staged so far
        let mut manifest = ManifestBuilder::new(staging.path());
        manifest.scan()?;
        let manifest_bytes = manifest.build()?;
        fs::write(staging.path().join(MANIFEST_NAME), &manifest_bytes)?;

        // Detached signature over the exact manifest bytes
        let signature = smime::sign_detached(&manifest_bytes, identity)?;
        fs::write(staging.path().join(SIGNATURE_NAME), &signature)?;

        debug!(
            "Signed manifest covering {} file(s), signature {} bytes",
            manifest.file_count(),
            signature.len()
        );

        Ok(staging)
    }

    fn stage_asset_dir(
        &self,
        asset_dir: &Path,
        staging: &Path,
        staged: &mut BTreeSet<String>,
    ) -> Result<()> {
        if !asset_dir.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Asset directory not found: {}", asset_dir.display()),
            )));
        }

        for entry in WalkDir::new(asset_dir).follow_links(false) {
            let entry = entry.map_err(|e| {
                Error::Io(io::Error::other(format!(
                    "Failed to walk asset directory: {}",
                    e
                )))
            })?;

            if entry.file_type().is_dir() {
                continue;
            }

            let relative = entry.path().strip_prefix(asset_dir).map_err(|_| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Failed to compute relative path",
                ))
            })?;
            let name = member_name(relative);

            stage_member(staging, &name, staged)?;
            let dest = staging.join(&name);
            fs::copy(entry.path(), &dest)?;
        }

        Ok(())
    }
}

/// Register a member name, creating parent directories in staging.
///
/// Rejects names that are invalid, reserved, or already staged.
fn stage_member(staging: &Path, name: &str, staged: &mut BTreeSet<String>) -> Result<()> {
    validate_asset_name(name)?;

    if !staged.insert(name.to_string()) {
        return Err(Error::Config(format!("Duplicate asset name: {}", name)));
    }

    let dest = staging.join(name);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    Ok(())
}

/// Check that a name is usable as an archive member for an asset.
fn validate_asset_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("Asset name cannot be empty".into()));
    }

    if name == DESCRIPTOR_NAME || name == MANIFEST_NAME || name == SIGNATURE_NAME {
        return Err(Error::Config(format!("Asset name {} is reserved", name)));
    }

    if name.contains('\\') {
        return Err(Error::Config(format!(
            "Asset name must use / separators: {}",
            name
        )));
    }

    let path = Path::new(name);
    let relative_normal = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !relative_normal {
        return Err(Error::Config(format!(
            "Asset name must be a relative path without traversal: {}",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_support::generate_test_chain;
    use crate::manifest;
    use std::io::Read;
    use zip::ZipArchive;

    fn test_identity() -> SigningIdentity {
        let chain = generate_test_chain();
        SigningIdentity::new(chain.leaf, chain.leaf_key, chain.intermediate).unwrap()
    }

    const DESCRIPTOR: &[u8] = b"{\"organizationName\":\"Acme\",\"serialNumber\":\"123\"}";

    #[test]
    fn test_builder_default() {
        let builder = PassBuilder::default();
        assert!(builder.descriptor.is_none());
        assert!(builder.descriptor_path.is_none());
        assert!(builder.assets.is_empty());
        assert!(builder.asset_dir.is_none());
        assert_eq!(builder.compression_level.level(), 9);
    }

    #[test]
    fn test_builder_chain() {
        let builder = PassBuilder::new()
            .descriptor_file("/path/to/pass.json")
            .asset("icon.png", b"PNG".to_vec())
            .compression_level(3);

        assert_eq!(
            builder.descriptor_path,
            Some(PathBuf::from("/path/to/pass.json"))
        );
        assert!(builder.assets.contains_key("icon.png"));
        assert_eq!(builder.compression_level.level(), 3);
    }

    #[test]
    fn test_validate_requires_descriptor() {
        let result = PassBuilder::new().validate();
        assert!(result.is_err());
        if let Err(Error::Config(msg)) = result {
            assert!(msg.contains("descriptor"));
        }
    }

    #[test]
    fn test_validate_rejects_both_descriptor_sources() {
        let result = PassBuilder::new()
            .descriptor(DESCRIPTOR)
            .descriptor_file("/path/to/pass.json")
            .validate();

        assert!(result.is_err());
        if let Err(Error::Config(msg)) = result {
            assert!(msg.contains("Cannot specify both"));
        }
    }

    #[test]
    fn test_validate_rejects_reserved_asset_names() {
        for reserved in [DESCRIPTOR_NAME, MANIFEST_NAME, SIGNATURE_NAME] {
            let result = PassBuilder::new()
                .descriptor(DESCRIPTOR)
                .asset(reserved, b"data".to_vec())
                .validate();
            assert!(result.is_err(), "{} should be rejected", reserved);
        }
    }

    #[test]
    fn test_validate_rejects_traversing_asset_names() {
        for bad in ["../escape.png", "/absolute.png", "a/../b.png", ""] {
            let result = PassBuilder::new()
                .descriptor(DESCRIPTOR)
                .asset(bad, b"data".to_vec())
                .validate();
            assert!(result.is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_build_produces_complete_archive() {
        let temp_dir = TempDir::new().unwrap();
        let identity = test_identity();
        let output = temp_dir.path().join("Event.pkpass");

        PassBuilder::new()
            .descriptor(DESCRIPTOR)
            .asset("icon.png", b"PNG_ICON".to_vec())
            .build(&identity, &output)
            .unwrap();

        let file = fs::File::open(&output).unwrap();
        let mut archive = ZipArchive::new(file).unwrap();

        let mut names: Vec<_> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, ["icon.png", "manifest.json", "pass.json", "signature"]);

        // The descriptor travels byte-for-byte
        let mut member = archive.by_name("pass.json").unwrap();
        let mut contents = Vec::new();
        member.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, DESCRIPTOR);
    }

    #[test]
    fn test_build_manifest_covers_descriptor_and_assets() {
        let identity = test_identity();

        let archive_bytes = PassBuilder::new()
            .descriptor(DESCRIPTOR)
            .asset("icon.png", b"PNG_ICON".to_vec())
            .build_to_vec(&identity)
            .unwrap();

        let mut archive = ZipArchive::new(std::io::Cursor::new(archive_bytes)).unwrap();
        let mut manifest_bytes = Vec::new();
        archive
            .by_name("manifest.json")
            .unwrap()
            .read_to_end(&mut manifest_bytes)
            .unwrap();

        let entries = manifest::parse(&manifest_bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries.get("pass.json"),
            Some(&crate::digest::digest(DESCRIPTOR))
        );
        assert_eq!(
            entries.get("icon.png"),
            Some(&crate::digest::digest(b"PNG_ICON"))
        );
    }

    #[test]
    fn test_build_from_descriptor_file_and_asset_dir() {
        let temp_dir = TempDir::new().unwrap();
        let identity = test_identity();

        let descriptor_path = temp_dir.path().join("pass.json");
        fs::write(&descriptor_path, DESCRIPTOR).unwrap();

        let assets = temp_dir.path().join("assets");
        fs::create_dir_all(assets.join("en.lproj")).unwrap();
        fs::write(assets.join("icon.png"), b"PNG_ICON").unwrap();
        fs::write(assets.join("en.lproj/pass.strings"), b"\"a\" = \"b\";").unwrap();

        let output = temp_dir.path().join("Event.pkpass");
        PassBuilder::new()
            .descriptor_file(&descriptor_path)
            .asset_dir(&assets)
            .build(&identity, &output)
            .unwrap();

        let file = fs::File::open(&output).unwrap();
        let mut archive = ZipArchive::new(file).unwrap();
        assert!(archive.by_name("en.lproj/pass.strings").is_ok());
    }

    #[test]
    fn test_build_rejects_non_json_descriptor() {
        let identity = test_identity();
        let result = PassBuilder::new()
            .descriptor(b"not json".to_vec())
            .build_to_vec(&identity);

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_rejects_duplicate_member() {
        let temp_dir = TempDir::new().unwrap();
        let identity = test_identity();

        let assets = temp_dir.path().join("assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("icon.png"), b"FROM_DIR").unwrap();

        let result = PassBuilder::new()
            .descriptor(DESCRIPTOR)
            .asset_dir(&assets)
            .asset("icon.png", b"INLINE".to_vec())
            .build_to_vec(&identity);

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_rejects_reserved_name_in_asset_dir() {
        let temp_dir = TempDir::new().unwrap();
        let identity = test_identity();

        let assets = temp_dir.path().join("assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("manifest.json"), b"{}").unwrap();

        let result = PassBuilder::new()
            .descriptor(DESCRIPTOR)
            .asset_dir(&assets)
            .build_to_vec(&identity);

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_missing_descriptor_file() {
        let identity = test_identity();
        let result = PassBuilder::new()
            .descriptor_file("/nonexistent/pass.json")
            .build_to_vec(&identity);

        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_manifest_bytes_are_idempotent() {
        let identity = test_identity();
        let builder = PassBuilder::new()
            .descriptor(DESCRIPTOR)
            .asset("icon.png", b"PNG_ICON".to_vec());

        let read_manifest = |bytes: Vec<u8>| -> Vec<u8> {
            let mut archive = ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
            let mut manifest_bytes = Vec::new();
            archive
                .by_name("manifest.json")
                .unwrap()
                .read_to_end(&mut manifest_bytes)
                .unwrap();
            manifest_bytes
        };

        let first = read_manifest(builder.build_to_vec(&identity).unwrap());
        let second = read_manifest(builder.build_to_vec(&identity).unwrap());
        assert_eq!(first, second);
    }
}
