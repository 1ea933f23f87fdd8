// ── Discovered-device domain type ──

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tvsling_api::DeviceInfo;

/// A TV discovered on the local network.
///
/// Immutable after creation; a new scan replaces prior results wholesale.
/// Hosts that answer the developer-API port but fail the info fetch are
/// represented with only the address populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDevice {
    pub address: Ipv4Addr,
    pub name: Option<String>,
    pub model: Option<String>,
    pub device_type: Option<String>,
    pub developer_mode: bool,
    pub developer_ip: Option<String>,
}

impl NetworkDevice {
    /// A degraded record for a host that accepted the port probe but did
    /// not produce parseable device info.
    pub fn address_only(address: Ipv4Addr) -> Self {
        Self {
            address,
            name: None,
            model: None,
            device_type: None,
            developer_mode: false,
            developer_ip: None,
        }
    }

    /// Build a full record from a device-info response.
    pub fn from_info(address: Ipv4Addr, info: DeviceInfo) -> Self {
        Self {
            address,
            name: info.name,
            model: info.model_name,
            device_type: info.device_type,
            developer_mode: info.developer_mode,
            developer_ip: info.developer_ip,
        }
    }

    /// Display label for device pickers: name when known, address otherwise.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.address),
            None => self.address.to_string(),
        }
    }
}
