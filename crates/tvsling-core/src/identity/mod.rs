// Vendor code-signing identity issuance.
//
// Two-step flow: generate a key pair + PKCS#10 request locally, then
// exchange the request for a signed chain at the vendor enrollment
// endpoint and write password-protected author/distributor bundles.

mod password;
mod request;

pub use password::generate_password;
pub use request::{IdentityRequest, RequestProfile};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use der::DecodePem;
use der::pem::LineEnding;
use pkcs8::EncodePrivateKey;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};
use tvsling_api::{CertificateChain, EnrollmentClient};
use x509_cert::Certificate;

use crate::error::IdentityError;

/// Names of the identity bundles written by [`IdentityIssuer::enroll`].
pub const AUTHOR_BUNDLE: &str = "author-identity.pem";
pub const DISTRIBUTOR_BUNDLE: &str = "distributor-identity.pem";

/// A signed identity for one device/user pair.
///
/// The bundles on disk are the only durable artifact; each holds the
/// PBES2-encrypted private key plus the certificate chain and is protected
/// by its own generated password.
#[derive(Debug)]
pub struct CertificateProfile {
    pub chain_pem: String,
    pub author_bundle: PathBuf,
    pub distributor_bundle: PathBuf,
    pub author_password: SecretString,
    pub distributor_password: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Exchanges certificate requests for signed identity bundles.
pub struct IdentityIssuer {
    enrollment: EnrollmentClient,
}

impl IdentityIssuer {
    pub fn new(enrollment: EnrollmentClient) -> Self {
        Self { enrollment }
    }

    /// Submit `request` with a bearer token and write the author and
    /// distributor bundles under `output_dir`.
    ///
    /// Enrollment failures are recoverable; the caller may retry with a
    /// freshly generated request. Bundle writes are atomic (temp file,
    /// then persist) and happen exactly once.
    pub async fn enroll(
        &self,
        request: &IdentityRequest,
        auth_token: &SecretString,
        user_id: &str,
        output_dir: &Path,
    ) -> Result<CertificateProfile, IdentityError> {
        let chain = self
            .enrollment
            .enroll(request.pem(), auth_token, user_id)
            .await
            .map_err(IdentityError::Enrollment)?;

        let chain_pem = chain.to_pem();
        let expires_at = chain_expiry(&chain);

        let author_password = SecretString::from(generate_password(12));
        let distributor_password = SecretString::from(generate_password(12));

        let author_bundle = output_dir.join(AUTHOR_BUNDLE);
        let distributor_bundle = output_dir.join(DISTRIBUTOR_BUNDLE);

        write_bundle(&author_bundle, request, &chain_pem, &author_password)?;
        write_bundle(
            &distributor_bundle,
            request,
            &chain_pem,
            &distributor_password,
        )?;

        info!(
            device = request.device_id(),
            dir = %output_dir.display(),
            "identity bundles written"
        );

        Ok(CertificateProfile {
            chain_pem,
            author_bundle,
            distributor_bundle,
            author_password,
            distributor_password,
            expires_at,
        })
    }
}

/// Expiry of the leaf certificate, when the chain parses.
///
/// Best-effort: a chain the library cannot parse still produces usable
/// bundles, so this only logs.
fn chain_expiry(chain: &CertificateChain) -> Option<DateTime<Utc>> {
    let leaf = chain.certificates.first()?;
    match Certificate::from_pem(leaf.as_bytes()) {
        Ok(cert) => {
            let not_after = cert.tbs_certificate.validity.not_after.to_system_time();
            Some(DateTime::<Utc>::from(not_after))
        }
        Err(err) => {
            warn!(%err, "could not parse leaf certificate for expiry");
            None
        }
    }
}

/// Write one identity bundle: encrypted PKCS#8 private key followed by the
/// certificate chain, as a single PEM file replaced atomically.
fn write_bundle(
    path: &Path,
    request: &IdentityRequest,
    chain_pem: &str,
    password: &SecretString,
) -> Result<(), IdentityError> {
    let bundle_err = |message: String| IdentityError::Bundle {
        path: path.to_path_buf(),
        message,
    };

    let encrypted_key = request
        .private_key()
        .to_pkcs8_encrypted_pem(
            &mut rand::thread_rng(),
            password.expose_secret().as_bytes(),
            LineEnding::LF,
        )
        .map_err(|e| bundle_err(e.to_string()))?;

    let dir = path.parent().ok_or_else(|| bundle_err("no parent directory".into()))?;
    std::fs::create_dir_all(dir).map_err(|e| bundle_err(e.to_string()))?;

    let mut content = String::with_capacity(encrypted_key.len() + chain_pem.len() + 1);
    content.push_str(&encrypted_key);
    if !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(chain_pem);

    let temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| bundle_err(e.to_string()))?;
    std::fs::write(temp.path(), content).map_err(|e| bundle_err(e.to_string()))?;
    temp.persist(path).map_err(|e| bundle_err(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn bundle_contains_encrypted_key_and_chain() {
        let request =
            IdentityRequest::generate("dev@example.com", "dev-1", RequestProfile::Author).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AUTHOR_BUNDLE);
        let password = SecretString::from(generate_password(12));

        let chain = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        write_bundle(&path, &request, chain, &password).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("BEGIN ENCRYPTED PRIVATE KEY"));
        assert!(content.contains("BEGIN CERTIFICATE"));
        // The raw key must never appear unencrypted.
        assert!(!content.contains("BEGIN PRIVATE KEY"));
        assert!(!content.contains("BEGIN RSA PRIVATE KEY"));
    }
}
