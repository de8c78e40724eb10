//! Bundle verification workflow.
//!
//! Verification re-derives everything the builder established and checks it
//! against what the archive actually contains:
//!
//! 1. The archive exists, parses as ZIP, and extracts into a scoped
//!    working directory.
//! 2. `pass.json`, `manifest.json`, and `signature` are present and
//!    non-empty.
//! 3. The descriptor parses as JSON. Its content stays opaque.
//! 4. The stored manifest agrees with digests re-derived from the
//!    extracted files, in both directions. Every discrepancy is collected
//!    before the run stops.
//! 5. Without a trust anchor the signature is skipped, and the verdict
//!    says so rather than claiming full validity.
//! 6. With an anchor, the detached signature is validated against the
//!    stored manifest bytes exactly as they appear in the archive.
//!
//! Steps short-circuit: a failed step ends the run with everything found
//! so far, and the signature is reported as unchecked. Defects are never
//! raised as [`crate::Error`]; the caller always receives a
//! [`VerificationReport`] describing each failed check. `Err` is reserved
//! for environmental problems such as being unable to create the working
//! directory.

use crate::archive::{extract_archive, validate_archive};
use crate::crypto::{identity::load_certificate, smime};
use crate::manifest::{self, EntryFault, ManifestBuilder};
use crate::manifest::{DESCRIPTOR_NAME, MANIFEST_NAME, REQUIRED_MEMBERS, SIGNATURE_NAME};
use crate::{Error, Result};
use openssl::x509::X509;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// A single verification defect.
///
/// Each variant corresponds to one class of failed check. A report may
/// carry several findings when a single step surfaces more than one
/// defect, such as two required members missing at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// The bundle or an extracted member could not be read.
    Io { detail: String },
    /// The archive or a required member is structurally unusable.
    Structural {
        /// Affected member, or `None` when the archive itself is at fault
        #[serde(skip_serializing_if = "Option::is_none")]
        member: Option<String>,
        detail: String,
    },
    /// The descriptor is not well-formed JSON.
    MalformedDescriptor { detail: String },
    /// The stored manifest disagrees with the extracted files.
    ManifestMismatch { faults: Vec<EntryFault> },
    /// Cryptographic signature validation failed against the trust anchor.
    SignatureInvalid { detail: String },
}

impl Finding {
    /// The bundle member this finding refers to, when one is identifiable.
    pub fn member(&self) -> Option<&str> {
        match self {
            Finding::Structural { member, .. } => member.as_deref(),
            Finding::MalformedDescriptor { .. } => Some(DESCRIPTOR_NAME),
            Finding::SignatureInvalid { .. } => Some(SIGNATURE_NAME),
            _ => None,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Io { detail } => write!(f, "IO failure: {}", detail),
            Finding::Structural {
                member: Some(member),
                detail,
            } => write!(f, "{}: {}", member, detail),
            Finding::Structural {
                member: None,
                detail,
            } => write!(f, "Malformed archive: {}", detail),
            Finding::MalformedDescriptor { detail } => {
                write!(f, "Malformed descriptor: {}", detail)
            }
            Finding::ManifestMismatch { faults } => {
                let joined = faults
                    .iter()
                    .map(|fault| fault.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "Manifest mismatch: {}", joined)
            }
            Finding::SignatureInvalid { detail } => write!(f, "Signature invalid: {}", detail),
        }
    }
}

/// Outcome of the signature check within one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    /// The signature validated against the supplied trust anchor.
    Verified,
    /// No trust anchor was supplied, so the signature was never checked.
    Skipped,
    /// Signature validation failed.
    Failed,
    /// An earlier check failed before the signature could be examined.
    Unchecked,
}

/// Overall verdict of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every check passed, including signature validation.
    Valid,
    /// Every performed check passed, but no trust anchor was supplied.
    /// The bundle is manifest-valid at best, not trusted.
    SignatureSkipped,
    /// At least one check failed.
    Invalid,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Valid => write!(f, "valid"),
            Verdict::SignatureSkipped => write!(f, "valid (signature not checked)"),
            Verdict::Invalid => write!(f, "invalid"),
        }
    }
}

/// Structured result of verifying one bundle.
#[derive(Debug, Serialize)]
pub struct VerificationReport {
    findings: Vec<Finding>,
    signature: SignatureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    descriptor: Option<serde_json::Value>,
}

impl VerificationReport {
    fn new() -> Self {
        Self {
            findings: Vec::new(),
            signature: SignatureStatus::Unchecked,
            descriptor: None,
        }
    }

    /// The overall verdict implied by the findings and signature status.
    pub fn verdict(&self) -> Verdict {
        if !self.findings.is_empty() {
            Verdict::Invalid
        } else if self.signature == SignatureStatus::Skipped {
            Verdict::SignatureSkipped
        } else {
            Verdict::Valid
        }
    }

    /// Whether every check passed, including signature validation.
    pub fn is_valid(&self) -> bool {
        self.verdict() == Verdict::Valid
    }

    /// Every defect found, in check order.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// How far signature validation got.
    pub fn signature_status(&self) -> SignatureStatus {
        self.signature
    }

    /// The parsed descriptor, available once step 3 has passed.
    pub fn descriptor(&self) -> Option<&serde_json::Value> {
        self.descriptor.as_ref()
    }
}

/// Bundle verification workflow.
///
/// # Examples
///
/// ```no_run
/// use passkit::PassVerifier;
///
/// let report = PassVerifier::new()
///     .trust_anchor_file("wwdr.pem")?
///     .verify("Event.pkpass")?;
///
/// if !report.is_valid() {
///     for finding in report.findings() {
///         eprintln!("{}", finding);
///     }
/// }
/// # Ok::<(), passkit::Error>(())
/// ```
#[derive(Default)]
pub struct PassVerifier {
    trust_anchor: Option<X509>,
}

impl PassVerifier {
    /// Create a verifier with no trust anchor configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trust anchor certificate.
    ///
    /// The anchor may be a self-signed root or the issuing intermediate
    /// itself. Without one, verification stops after the manifest check
    /// and reports [`Verdict::SignatureSkipped`] at best.
    pub fn trust_anchor(mut self, anchor: X509) -> Self {
        self.trust_anchor = Some(anchor);
        self
    }

    /// Set the trust anchor from PEM or DER data.
    pub fn trust_anchor_pem(self, data: &[u8]) -> Result<Self> {
        let anchor = load_certificate(data)
            .map_err(|e| Error::Certificate(format!("Failed to load trust anchor: {}", e)))?;
        Ok(self.trust_anchor(anchor))
    }

    /// Set the trust anchor from a certificate file.
    pub fn trust_anchor_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path.as_ref()).map_err(|e| {
            Error::MissingCredentials(format!(
                "Failed to read trust anchor {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        self.trust_anchor_pem(&data)
    }

    /// Verify a bundle archive on disk.
    ///
    /// Always returns a report when the environment cooperates; defects in
    /// the bundle itself become findings, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] only if the scoped working directory cannot
    /// be created.
    pub fn verify(&self, bundle_path: impl AsRef<Path>) -> Result<VerificationReport> {
        let bundle_path = bundle_path.as_ref();
        let mut report = VerificationReport::new();

        debug!("Verifying bundle: {}", bundle_path.display());

        // Dropped on every exit path, removing the extracted files
        let workdir = TempDir::new().map_err(|e| {
            Error::Io(io::Error::other(format!(
                "Failed to create temp directory: {}",
                e
            )))
        })?;

        // Step 1: the archive must exist, parse as ZIP, and extract cleanly
        if let Err(e) = validate_archive(bundle_path) {
            report.findings.push(archive_finding(e));
            return Ok(report);
        }
        if let Err(e) = extract_archive(bundle_path, workdir.path()) {
            report.findings.push(archive_finding(e));
            return Ok(report);
        }

        // Step 2: required members present and non-empty, all three checked
        // before stopping
        for name in REQUIRED_MEMBERS {
            let finding = match fs::metadata(workdir.path().join(name)) {
                Ok(meta) if meta.len() > 0 => continue,
                Ok(_) => "required member is empty".to_string(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    "required member is missing".to_string()
                }
                Err(e) => format!("required member is unreadable: {}", e),
            };
            report.findings.push(Finding::Structural {
                member: Some(name.to_string()),
                detail: finding,
            });
        }
        if !report.findings.is_empty() {
            return Ok(report);
        }

        // Step 3: the descriptor must parse as JSON; its content is opaque
        let descriptor_bytes = match fs::read(workdir.path().join(DESCRIPTOR_NAME)) {
            Ok(bytes) => bytes,
            Err(e) => {
                report.findings.push(Finding::Io {
                    detail: format!("Failed to read {}: {}", DESCRIPTOR_NAME, e),
                });
                return Ok(report);
            }
        };
        match serde_json::from_slice::<serde_json::Value>(&descriptor_bytes) {
            Ok(value) => report.descriptor = Some(value),
            Err(e) => {
                report.findings.push(Finding::MalformedDescriptor {
                    detail: e.to_string(),
                });
                return Ok(report);
            }
        }

        // Step 4: stored manifest against re-derived digests, both directions
        let manifest_bytes = match fs::read(workdir.path().join(MANIFEST_NAME)) {
            Ok(bytes) => bytes,
            Err(e) => {
                report.findings.push(Finding::Io {
                    detail: format!("Failed to read {}: {}", MANIFEST_NAME, e),
                });
                return Ok(report);
            }
        };
        let stored = match manifest::parse(&manifest_bytes) {
            Ok(map) => map,
            Err(e) => {
                report.findings.push(Finding::Structural {
                    member: Some(MANIFEST_NAME.to_string()),
                    detail: format!("does not parse as a digest map: {}", e),
                });
                return Ok(report);
            }
        };

        let mut derived = ManifestBuilder::new(workdir.path());
        if let Err(e) = derived.scan() {
            report.findings.push(Finding::Io {
                detail: format!("Failed to hash extracted files: {}", e),
            });
            return Ok(report);
        }

        let faults = manifest::compare(&stored, derived.entries());
        if !faults.is_empty() {
            report.findings.push(Finding::ManifestMismatch { faults });
            return Ok(report);
        }

        // Steps 5 and 6: the signature covers the manifest bytes exactly as
        // stored, so validation runs over the raw extracted bytes
        match &self.trust_anchor {
            None => report.signature = SignatureStatus::Skipped,
            Some(anchor) => {
                let signature_bytes = match fs::read(workdir.path().join(SIGNATURE_NAME)) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        report.findings.push(Finding::Io {
                            detail: format!("Failed to read {}: {}", SIGNATURE_NAME, e),
                        });
                        return Ok(report);
                    }
                };
                match smime::verify_detached(&signature_bytes, &manifest_bytes, anchor) {
                    Ok(()) => report.signature = SignatureStatus::Verified,
                    Err(e) => {
                        let detail = match e {
                            Error::Signing(msg) | Error::Certificate(msg) => msg,
                            other => other.to_string(),
                        };
                        report.signature = SignatureStatus::Failed;
                        report.findings.push(Finding::SignatureInvalid { detail });
                    }
                }
            }
        }

        debug!(
            "Verification finished: {} ({} finding(s))",
            report.verdict(),
            report.findings.len()
        );

        Ok(report)
    }

    /// Verify a bundle supplied as in-memory archive bytes.
    pub fn verify_bytes(&self, archive: &[u8]) -> Result<VerificationReport> {
        let workdir = TempDir::new().map_err(|e| {
            Error::Io(io::Error::other(format!(
                "Failed to create temp directory: {}",
                e
            )))
        })?;
        let bundle_path = workdir.path().join("bundle.pkpass");
        fs::write(&bundle_path, archive)?;

        self.verify(&bundle_path)
    }
}

/// Map a step-1 access error onto the finding taxonomy.
fn archive_finding(e: Error) -> Finding {
    match e {
        Error::Zip(e) => Finding::Structural {
            member: None,
            detail: e.to_string(),
        },
        other => Finding::Io {
            detail: other.to_string(),
        },
    }
}
