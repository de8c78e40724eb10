pub mod archive;
pub mod builder;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod template;
pub mod verify;

pub use archive::{extract_archive, validate_archive, write_archive, CompressionLevel};
pub use builder::PassBuilder;
pub use crypto::SigningIdentity;
pub use digest::{digest, digest_file};
pub use error::Error;
pub use manifest::{EntryFault, ManifestBuilder, DESCRIPTOR_NAME, MANIFEST_NAME, SIGNATURE_NAME};
pub use template::PassConfig;
pub use verify::{Finding, PassVerifier, SignatureStatus, Verdict, VerificationReport};

pub type Result<T> = std::result::Result<T, Error>;
