// Media-server public-info client.
//
// The auto-login patch step needs the server's canonical identifier, which
// only the server itself can provide. `/System/Info/Public` requires no
// authentication.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::ApiError;

/// Unauthenticated server metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicSystemInfo {
    pub id: String,
    pub server_name: Option<String>,
    pub version: Option<String>,
    pub local_address: Option<String>,
}

/// Client for the media server's public-info endpoint.
pub struct ServerInfoClient {
    http: reqwest::Client,
}

impl ServerInfoClient {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Fetch the server's public system info.
    pub async fn fetch_public_info(&self, server: &Url) -> Result<PublicSystemInfo, ApiError> {
        // Joining against the raw string avoids `Url::join` dropping the
        // last path segment of prefix-mounted servers.
        let url = Url::parse(&format!(
            "{}/System/Info/Public",
            server.as_str().trim_end_matches('/')
        ))?;
        debug!("GET {url}");

        let resp = self.http.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                endpoint: url.to_string(),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::deserialization(&e, &body))
    }
}
