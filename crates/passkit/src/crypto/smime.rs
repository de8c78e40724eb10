//! Detached PKCS#7 signing and verification over manifest bytes
//!
//! Signatures are detached SignedData structures in DER form: the manifest
//! content is not embedded, only its digest and the signer chain. The
//! issuing intermediate certificate is included so a verifier holding
//! either the root or the intermediate itself can build a trust chain.

use crate::crypto::SigningIdentity;
use crate::{Error, Result};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::X509;

/// Produce a detached PKCS#7 signature over the given bytes.
///
/// The output is DER, suitable for storage as the bundle's `signature`
/// member. The identity's intermediate certificate is embedded alongside
/// the signer certificate.
///
/// # Errors
///
/// Returns [`Error::Signing`] if signature generation fails or reports
/// success while producing empty output.
pub fn sign_detached(data: &[u8], identity: &SigningIdentity) -> Result<Vec<u8>> {
    let mut extra_certs = Stack::new()
        .map_err(|e| Error::Signing(format!("Failed to allocate certificate stack: {}", e)))?;
    extra_certs
        .push(identity.intermediate.clone())
        .map_err(|e| Error::Signing(format!("Failed to add intermediate certificate: {}", e)))?;

    let flags = Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY | Pkcs7Flags::NOSMIMECAP;
    let pkcs7 = Pkcs7::sign(
        &identity.certificate,
        &identity.private_key,
        &extra_certs,
        data,
        flags,
    )
    .map_err(|e| Error::Signing(format!("Failed to create PKCS#7 signature: {}", e)))?;

    let der = pkcs7
        .to_der()
        .map_err(|e| Error::Signing(format!("Failed to serialize signature: {}", e)))?;

    // A zero-length signature must never reach the archive
    if der.is_empty() {
        return Err(Error::Signing(
            "Signature generation produced no output".into(),
        ));
    }

    Ok(der)
}

/// Verify a detached PKCS#7 signature against the content it claims to cover.
///
/// The trust anchor may be a self-signed root or the issuing intermediate
/// itself; the store is built with partial-chain semantics so either works.
/// Certificates embedded in the signature are used as untrusted chain
/// material only.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the signature is malformed, does not match
/// the content, or its signer does not chain to the trust anchor.
pub fn verify_detached(signature: &[u8], content: &[u8], trust_anchor: &X509) -> Result<()> {
    let pkcs7 = Pkcs7::from_der(signature)
        .map_err(|e| Error::Signing(format!("Malformed PKCS#7 signature: {}", e)))?;

    let mut store_builder = X509StoreBuilder::new()
        .map_err(|e| Error::Certificate(format!("Failed to create trust store: {}", e)))?;
    store_builder
        .add_cert(trust_anchor.clone())
        .map_err(|e| Error::Certificate(format!("Failed to add trust anchor: {}", e)))?;
    store_builder
        .set_flags(X509VerifyFlags::PARTIAL_CHAIN)
        .map_err(|e| Error::Certificate(format!("Failed to configure trust store: {}", e)))?;
    let store = store_builder.build();

    let certs = Stack::new()
        .map_err(|e| Error::Signing(format!("Failed to allocate certificate stack: {}", e)))?;

    pkcs7
        .verify(&certs, &store, Some(content), None, Pkcs7Flags::BINARY)
        .map_err(|e| Error::Signing(format!("Signature verification failed: {}", e)))?;

    Ok(())
}
