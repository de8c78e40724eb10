//! Certificate and private key loading for pass signing

use crate::{Error, Result};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::Path;

/// Signing identity: pass certificate, matching private key, and the issuing
/// intermediate certificate embedded alongside the signature.
pub struct SigningIdentity {
    /// Pass type certificate
    pub certificate: X509,
    /// Private key matching the certificate
    pub private_key: PKey<Private>,
    /// Issuing intermediate certificate, included in the signature so
    /// verifiers can build a chain to their trust anchor
    pub intermediate: X509,
    /// Team ID extracted from the certificate subject
    pub team_id: Option<String>,
}

impl SigningIdentity {
    /// Assemble an identity from already-parsed components.
    ///
    /// Validates that the private key matches the certificate and extracts
    /// the team ID from the certificate subject.
    pub fn new(
        certificate: X509,
        private_key: PKey<Private>,
        intermediate: X509,
    ) -> Result<Self> {
        Self::validate_key_pair(&certificate, &private_key)?;
        let team_id = Self::extract_team_id(&certificate);

        Ok(Self {
            certificate,
            private_key,
            intermediate,
            team_id,
        })
    }

    /// Load from in-memory certificate, private key, and intermediate data.
    ///
    /// Each certificate may be PEM or DER. The key password, if provided, is
    /// handled via SecretString and zeroized when no longer needed.
    pub fn from_pem(
        cert_data: &[u8],
        key_data: &[u8],
        intermediate_data: &[u8],
        key_password: Option<&SecretString>,
    ) -> Result<Self> {
        let certificate = load_certificate(cert_data)
            .map_err(|e| Error::Certificate(format!("Failed to load certificate: {}", e)))?;
        let intermediate = load_certificate(intermediate_data).map_err(|e| {
            Error::Certificate(format!("Failed to load intermediate certificate: {}", e))
        })?;

        let private_key = if let Some(pass) = key_password {
            PKey::private_key_from_pem_passphrase(key_data, pass.expose_secret().as_bytes())
        } else {
            PKey::private_key_from_pem(key_data).or_else(|_| PKey::private_key_from_der(key_data))
        }
        .map_err(|e| Error::Certificate(format!("Failed to load private key: {}", e)))?;

        Self::new(certificate, private_key, intermediate)
    }

    /// Load from separate certificate, private key, and intermediate files.
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        intermediate_path: impl AsRef<Path>,
        key_password: Option<&SecretString>,
    ) -> Result<Self> {
        let cert_data = read_material(cert_path.as_ref(), "certificate")?;
        let key_data = read_material(key_path.as_ref(), "private key")?;
        let intermediate_data =
            read_material(intermediate_path.as_ref(), "intermediate certificate")?;

        Self::from_pem(&cert_data, &key_data, &intermediate_data, key_password)
    }

    /// Load certificate and key from PKCS#12 (.p12) data.
    ///
    /// The intermediate certificate is supplied separately; any CA entries
    /// bundled inside the PKCS#12 are ignored. The password is handled via
    /// SecretString and zeroized when no longer needed. Defaults to empty
    /// string if not provided.
    pub fn from_p12(
        p12_data: &[u8],
        intermediate_data: &[u8],
        password: Option<&SecretString>,
    ) -> Result<Self> {
        let pkcs12 = Pkcs12::from_der(p12_data)
            .map_err(|e| Error::Certificate(format!("Invalid PKCS#12: {}", e)))?;

        let pass = password.map(|s| s.expose_secret().as_str()).unwrap_or("");
        let parsed = pkcs12.parse2(pass).map_err(|_| Error::InvalidPassword)?;

        let certificate = parsed
            .cert
            .ok_or_else(|| Error::Certificate("No certificate in PKCS#12".into()))?;
        let private_key = parsed
            .pkey
            .ok_or_else(|| Error::Certificate("No private key in PKCS#12".into()))?;

        let intermediate = load_certificate(intermediate_data).map_err(|e| {
            Error::Certificate(format!("Failed to load intermediate certificate: {}", e))
        })?;

        Self::new(certificate, private_key, intermediate)
    }

    /// Load from a PKCS#12 file plus a separate intermediate certificate file.
    pub fn from_p12_files(
        p12_path: impl AsRef<Path>,
        intermediate_path: impl AsRef<Path>,
        password: Option<&SecretString>,
    ) -> Result<Self> {
        let p12_data = read_material(p12_path.as_ref(), "PKCS#12 file")?;
        let intermediate_data =
            read_material(intermediate_path.as_ref(), "intermediate certificate")?;

        Self::from_p12(&p12_data, &intermediate_data, password)
    }

    /// Extract team ID from certificate subject
    fn extract_team_id(cert: &X509) -> Option<String> {
        let subject = cert.subject_name();

        // The OU (Organizational Unit) entry carries the team ID
        for entry in subject.entries() {
            let nid = entry.object().nid();
            if nid == openssl::nid::Nid::ORGANIZATIONALUNITNAME {
                if let Ok(data) = entry.data().as_utf8() {
                    return Some(data.to_string());
                }
            }
        }
        None
    }

    /// Validate that the private key matches the certificate's public key
    fn validate_key_pair(cert: &X509, private_key: &PKey<Private>) -> Result<()> {
        let cert_public_key = cert.public_key().map_err(|e| {
            Error::Certificate(format!(
                "Failed to extract public key from certificate: {}",
                e
            ))
        })?;

        if !private_key.public_eq(&cert_public_key) {
            return Err(Error::Certificate(
                "Private key does not match certificate public key".into(),
            ));
        }

        Ok(())
    }
}

/// Parse a certificate from PEM, falling back to DER.
pub(crate) fn load_certificate(
    data: &[u8],
) -> std::result::Result<X509, openssl::error::ErrorStack> {
    X509::from_pem(data).or_else(|_| X509::from_der(data))
}

fn read_material(path: &Path, role: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        Error::MissingCredentials(format!("Failed to read {} {}: {}", role, path.display(), e))
    })
}
