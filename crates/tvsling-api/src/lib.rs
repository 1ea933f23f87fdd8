// tvsling-api: HTTP clients for the TV developer API, vendor enrollment,
// media-server info, and archive download.

pub mod device_info;
pub mod download;
pub mod enrollment;
pub mod error;
pub mod server_info;

pub use device_info::{DeviceInfo, DeviceInfoClient};
pub use download::download_to_file;
pub use enrollment::{CertificateChain, EnrollmentClient};
pub use error::ApiError;
pub use server_info::{PublicSystemInfo, ServerInfoClient};

/// TCP port the platform's developer API listens on.
pub const DEVELOPER_API_PORT: u16 = 8001;

/// Path of the device-info endpoint on the developer API.
pub const DEVICE_INFO_PATH: &str = "/api/v2/";

/// Default vendor certificate-enrollment endpoint.
pub const VENDOR_ENROLLMENT_URL: &str = "https://seller.tvsling.tv/api/v1/profile/certificates";
