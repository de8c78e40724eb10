//! Error types for pass packaging operations.
//!
//! This module defines the [`enum@Error`] enum covering all failure cases
//! on the build side of the pipeline: I/O, signing material, cryptography,
//! serialization, and configuration errors.
//!
//! Verification-side defects are not errors; they are reported through
//! [`crate::VerificationReport`] so a caller always receives a structured
//! result describing every failed check.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Error type for pass packaging operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Match on variants to handle specific failure cases.
///
/// # Examples
///
/// ```no_run
/// use passkit::{Error, PassBuilder, SigningIdentity};
///
/// let identity = SigningIdentity::from_pem_files("cert.pem", "key.pem", "wwdr.pem", None)?;
/// let result = PassBuilder::new()
///     .descriptor_file("pass.json")
///     .build(&identity, "out.pkpass");
/// match result {
///     Ok(()) => println!("Pass built"),
///     Err(Error::Signing(msg)) => eprintln!("Signing failed: {msg}"),
///     Err(Error::Io(e)) => eprintln!("IO error: {e}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # Ok::<(), passkit::Error>(())
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Occurs when reading staged files, writing the output archive, or
    /// accessing the filesystem during packaging.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Signing operation failed.
    ///
    /// Covers failures of the detached PKCS#7 signing primitive, including
    /// the case where signing reported success but produced empty output.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Invalid or malformed certificate or private key.
    ///
    /// The provided signing material could not be parsed, or the private
    /// key does not correspond to the certificate. See
    /// [`crate::SigningIdentity`] for accepted formats.
    #[error("Invalid certificate: {0}")]
    Certificate(String),

    /// Incorrect password for private key or PKCS#12 file.
    ///
    /// The password provided to [`crate::SigningIdentity::from_p12`] or
    /// [`crate::SigningIdentity::from_pem`] is incorrect.
    #[error("Invalid password for private key or PKCS#12")]
    InvalidPassword,

    /// Required signing material not present or unreadable.
    ///
    /// Raised when an identity file named by the caller cannot be read.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Invalid builder or template configuration.
    ///
    /// A configuration value is invalid, conflicting inputs were specified,
    /// or an asset name collides with a reserved bundle member.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization or parsing failed.
    ///
    /// Occurs when serializing the manifest digest map or parsing a stored
    /// manifest via [`crate::manifest::parse`].
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIP archive operation failed.
    ///
    /// Occurs during bundle packaging or extraction. See [`crate::archive`].
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
