// Vendor enrollment client.
//
// Exchanges a PEM-framed PKCS#10 request plus a bearer token for a signed
// author/distributor certificate chain. The endpoint validates the PEM
// framing byte-for-byte, so the request body carries the PEM string
// verbatim rather than a re-encoded form.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{ApiError, truncate_body};

#[derive(Debug, Serialize)]
struct EnrollmentRequest<'a> {
    csr: &'a str,
    #[serde(rename = "userId")]
    user_id: &'a str,
}

/// Signed certificate chain returned by the enrollment endpoint,
/// leaf first.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateChain {
    pub certificates: Vec<String>,
}

impl CertificateChain {
    /// Concatenated PEM form of the whole chain.
    pub fn to_pem(&self) -> String {
        let mut pem = String::new();
        for cert in &self.certificates {
            pem.push_str(cert.trim_end());
            pem.push('\n');
        }
        pem
    }
}

/// Client for the vendor certificate-enrollment endpoint.
pub struct EnrollmentClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl EnrollmentClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    /// Submit a certificate request and exchange it for a signed chain.
    ///
    /// Rejections and malformed responses both surface as
    /// [`ApiError::Enrollment`] / [`ApiError::Deserialization`] — the caller
    /// may retry with a freshly generated request.
    pub async fn enroll(
        &self,
        csr_pem: &str,
        auth_token: &SecretString,
        user_id: &str,
    ) -> Result<CertificateChain, ApiError> {
        debug!("POST {} (enrollment)", self.endpoint);

        let body = EnrollmentRequest { csr: csr_pem, user_id };
        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(auth_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ApiError::Enrollment {
                status: status.as_u16(),
                message: truncate_body(&message, 200).to_owned(),
            });
        }

        let body = resp.text().await?;
        let chain: CertificateChain =
            serde_json::from_str(&body).map_err(|e| ApiError::deserialization(&e, &body))?;

        if chain.certificates.is_empty() {
            return Err(ApiError::Enrollment {
                status: status.as_u16(),
                message: "response contained no certificates".into(),
            });
        }

        Ok(chain)
    }
}
