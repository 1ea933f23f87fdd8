// Device-info client for the platform's developer API.
//
// Every TV in developer mode serves `GET http://<ip>:8001/api/v2/` with a
// JSON document describing the device. Responses vary across firmware
// generations (booleans arrive as `true`, `"true"`, or `"1"`), so the
// deserializer is deliberately lenient.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::DEVICE_INFO_PATH;
use crate::error::ApiError;

/// Device metadata as reported by the developer API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceInfo {
    pub name: Option<String>,
    #[serde(rename = "modelName")]
    pub model_name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    #[serde(rename = "developerMode", default, deserialize_with = "flag")]
    pub developer_mode: bool,
    #[serde(rename = "developerIP")]
    pub developer_ip: Option<String>,
}

/// The developer API nests everything under a `device` key.
#[derive(Debug, Deserialize)]
struct DeviceInfoEnvelope {
    device: DeviceInfo,
}

/// Accepts `true`, `"true"`, `"1"`, and `1` as truthy. Older firmware
/// reports the flag as a string.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Str(String),
        Num(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Str(s) => matches!(s.as_str(), "true" | "1"),
        Flag::Num(n) => n != 0,
    })
}

/// Client for the device-info endpoint.
///
/// Cheap to clone; the underlying `reqwest::Client` is shared. The scanner
/// issues many concurrent fetches through a single instance.
#[derive(Debug, Clone)]
pub struct DeviceInfoClient {
    http: reqwest::Client,
}

impl DeviceInfoClient {
    /// Create a client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Fetch device info from a base URL.
    ///
    /// The scanner builds the URL from the address and its probe port,
    /// which also lets tests point the client at a mock server.
    pub async fn fetch_at(&self, base: &Url) -> Result<DeviceInfo, ApiError> {
        let url = base.join(DEVICE_INFO_PATH)?;
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
        let envelope: DeviceInfoEnvelope =
            serde_json::from_str(&body).map_err(|e| ApiError::deserialization(&e, &body))?;
        Ok(envelope.device)
    }
}
