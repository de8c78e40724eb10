//! Signing material and the detached signature primitive.
//!
//! [`SigningIdentity`] loads and validates the pass certificate, private
//! key, and issuing intermediate. [`smime`] produces and checks the
//! detached PKCS#7 signature over manifest bytes.

pub mod identity;
pub mod smime;

pub use identity::SigningIdentity;

#[cfg(test)]
pub(crate) mod test_support {
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::x509::extension::{BasicConstraints, KeyUsage};
    use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509};

    /// Generate a test EC key pair
    pub fn generate_test_ec_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::SECP256K1).unwrap();
        let ec_key = EcKey::generate(&group).unwrap();
        PKey::from_ec_key(ec_key).unwrap()
    }

    fn make_name(cn: &str, ou: Option<&str>) -> X509Name {
        let mut builder = X509NameBuilder::new().unwrap();
        builder.append_entry_by_text("CN", cn).unwrap();
        if let Some(ou) = ou {
            builder.append_entry_by_text("OU", ou).unwrap();
        }
        builder.build()
    }

    fn build_cert(
        pubkey: &PKey<Private>,
        subject: &X509Name,
        issuer: &X509Name,
        signer: &PKey<Private>,
        is_ca: bool,
        serial: u32,
    ) -> X509 {
        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();

        let serial = BigNum::from_u32(serial).unwrap();
        builder
            .set_serial_number(&serial.to_asn1_integer().unwrap())
            .unwrap();

        builder.set_subject_name(subject).unwrap();
        builder.set_issuer_name(issuer).unwrap();
        builder.set_pubkey(pubkey).unwrap();

        let not_before = Asn1Time::days_from_now(0).unwrap();
        let not_after = Asn1Time::days_from_now(365).unwrap();
        builder.set_not_before(&not_before).unwrap();
        builder.set_not_after(&not_after).unwrap();

        if is_ca {
            builder
                .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                .unwrap();
            builder
                .append_extension(
                    KeyUsage::new()
                        .critical()
                        .key_cert_sign()
                        .crl_sign()
                        .build()
                        .unwrap(),
                )
                .unwrap();
        } else {
            builder
                .append_extension(BasicConstraints::new().build().unwrap())
                .unwrap();
            builder
                .append_extension(
                    KeyUsage::new().critical().digital_signature().build().unwrap(),
                )
                .unwrap();
        }

        builder.sign(signer, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    /// Generate a self-signed leaf certificate, optionally with an OU entry
    pub fn generate_test_cert(key: &PKey<Private>, ou: Option<&str>) -> X509 {
        let name = make_name("Test Certificate", ou);
        build_cert(key, &name, &name, key, false, 1)
    }

    /// A full root -> intermediate -> leaf chain for signature tests
    pub struct TestChain {
        pub root: X509,
        pub intermediate: X509,
        pub leaf: X509,
        pub leaf_key: PKey<Private>,
    }

    /// Generate a three-tier certificate chain.
    ///
    /// The leaf carries OU `TEAM123456` so identity loading picks up a
    /// team ID, mirroring how pass type certificates are issued.
    pub fn generate_test_chain() -> TestChain {
        let root_key = generate_test_ec_key();
        let root_name = make_name("Test Root CA", None);
        let root = build_cert(&root_key, &root_name, &root_name, &root_key, true, 1);

        let intermediate_key = generate_test_ec_key();
        let intermediate_name = make_name("Test Intermediate CA", None);
        let intermediate = build_cert(
            &intermediate_key,
            &intermediate_name,
            &root_name,
            &root_key,
            true,
            2,
        );

        let leaf_key = generate_test_ec_key();
        let leaf_name = make_name("Pass Type ID: pass.com.example.test", Some("TEAM123456"));
        let leaf = build_cert(
            &leaf_key,
            &leaf_name,
            &intermediate_name,
            &intermediate_key,
            false,
            3,
        );

        TestChain {
            root,
            intermediate,
            leaf,
            leaf_key,
        }
    }
}
