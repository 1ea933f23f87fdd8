// PKCS#10 certificate-request construction.
//
// The vendor enrollment endpoint validates the PEM framing byte-for-byte,
// so the request is serialized once here and carried as an opaque string
// from then on.

use std::fmt;
use std::str::FromStr;

use const_oid::db::rfc5280::ID_KP_CODE_SIGNING;
use der::asn1::Ia5String;
use der::{EncodePem, pem::LineEnding};
use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use sha2::Sha256;
use x509_cert::builder::{Builder, RequestBuilder};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::name::Name;

use crate::error::IdentityError;

/// Which certificate profile the request targets.
///
/// The author profile carries only the device-binding SAN; the
/// distributor profile is stricter and additionally asserts leaf-only
/// code-signing usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestProfile {
    Author,
    Distributor,
}

/// A generated key pair plus its serialized PKCS#10 request.
///
/// The private key lives only in process memory until
/// [`IdentityIssuer::enroll`](super::IdentityIssuer::enroll) writes the
/// encrypted bundles; it is never logged and `Debug` does not reveal it.
pub struct IdentityRequest {
    key: RsaPrivateKey,
    pem: String,
    email: String,
    device_id: String,
    profile: RequestProfile,
}

impl IdentityRequest {
    /// Generate a 2048-bit RSA key pair and build the certificate request.
    ///
    /// The subject carries the issuing email; the extension-request
    /// attribute carries a Subject-Alternative-Name URI binding the target
    /// device (`urn:platform:deviceid=<id>`). Key-generation failure is
    /// fatal -- it indicates an unusable cryptographic provider.
    pub fn generate(
        email: &str,
        device_id: &str,
        profile: RequestProfile,
    ) -> Result<Self, IdentityError> {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048)
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?;

        let pem = build_request_pem(&key, email, device_id, profile)?;

        Ok(Self {
            key,
            pem,
            email: email.to_owned(),
            device_id: device_id.to_owned(),
            profile,
        })
    }

    /// The PEM-framed request, byte-exact as submitted to the vendor.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn profile(&self) -> RequestProfile {
        self.profile
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }
}

impl fmt::Debug for IdentityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRequest")
            .field("email", &self.email)
            .field("device_id", &self.device_id)
            .field("profile", &self.profile)
            .field("key", &"<redacted>")
            .finish()
    }
}

fn build_request_pem(
    key: &RsaPrivateKey,
    email: &str,
    device_id: &str,
    profile: RequestProfile,
) -> Result<String, IdentityError> {
    let request_err = |e: &dyn fmt::Display| IdentityError::Request(e.to_string());

    let signer = SigningKey::<Sha256>::new(key.clone());
    let subject = Name::from_str(&format!("CN={email}")).map_err(|e| request_err(&e))?;
    let mut builder = RequestBuilder::new(subject, &signer).map_err(|e| request_err(&e))?;

    let uri = format!("urn:platform:deviceid={device_id}");
    let san = SubjectAltName(vec![GeneralName::UniformResourceIdentifier(
        Ia5String::new(&uri).map_err(|e| request_err(&e))?,
    )]);
    builder.add_extension(&san).map_err(|e| request_err(&e))?;

    if profile == RequestProfile::Distributor {
        // Leaf-only, signature-only, code-signing. BasicConstraints and
        // KeyUsage are marked critical by their RFC 5280 defaults.
        builder
            .add_extension(&BasicConstraints {
                ca: false,
                path_len_constraint: None,
            })
            .map_err(|e| request_err(&e))?;
        builder
            .add_extension(&KeyUsage(KeyUsages::DigitalSignature.into()))
            .map_err(|e| request_err(&e))?;
        builder
            .add_extension(&ExtendedKeyUsage(vec![ID_KP_CODE_SIGNING]))
            .map_err(|e| request_err(&e))?;
    }

    let request = builder
        .build::<rsa::pkcs1v15::Signature>()
        .map_err(|e| request_err(&e))?;
    request
        .to_pem(LineEnding::LF)
        .map_err(|e| request_err(&e))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    // Key generation dominates these tests; one request is shared where
    // possible to keep the suite quick.

    #[test]
    fn pem_framing_is_byte_exact() {
        let request =
            IdentityRequest::generate("dev@example.com", "2.0:X1:1234", RequestProfile::Author)
                .unwrap();
        let pem = request.pem();

        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----\n"));
        assert!(pem.trim_end().ends_with("-----END CERTIFICATE REQUEST-----"));

        for line in pem.lines() {
            assert!(line.len() <= 64, "body line over 64 columns: {line}");
        }
    }

    #[test]
    fn distributor_profile_builds() {
        let request =
            IdentityRequest::generate("dev@example.com", "2.0:X1:1234", RequestProfile::Distributor)
                .unwrap();
        assert_eq!(request.profile(), RequestProfile::Distributor);
        assert!(request.pem().contains("BEGIN CERTIFICATE REQUEST"));
    }

    #[test]
    fn debug_does_not_leak_key_material() {
        let request =
            IdentityRequest::generate("dev@example.com", "dev-1", RequestProfile::Author).unwrap();
        let debug = format!("{request:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("PrivateKey"));
    }
}
