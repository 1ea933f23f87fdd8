// tvsling-core: the device-provisioning and package-retrofit pipeline.
//
// Control flow across the modules: `scan` finds candidate TVs, `identity`
// issues a vendor-signed code-signing identity for the selected device,
// `archive` + `patch` retrofit the distributable package, and `install`
// drives the privileged installer tool against the device.

pub mod archive;
pub mod error;
pub mod identity;
pub mod install;
pub mod model;
pub mod patch;
pub mod scan;

pub use archive::ArchiveWorkspace;
pub use error::{ArchiveError, CoreError, IdentityError, PatchError};
pub use identity::{CertificateProfile, IdentityIssuer, IdentityRequest, RequestProfile};
pub use install::{InstallOptions, InstallOrchestrator, PackageSource};
pub use model::{InstallOutcome, InstallPhase, InstallProgress, NetworkDevice};
pub use patch::{PatchContext, PatchSettings, PatchStep, PluginPatch, apply_pipeline};
pub use scan::{DeviceScanner, ScanOptions};

/// Loopback port of the local diagnostic bridge. The bridge itself is an
/// external collaborator; patch steps only need its origin for CSP grants
/// and injected scripts.
pub const BRIDGE_PORT: u16 = 9998;

/// HTTP origin of the local diagnostic bridge.
pub const BRIDGE_ORIGIN: &str = "http://127.0.0.1:9998";

/// WebSocket origin used by the diagnostic console mirror.
pub const BRIDGE_WS_ORIGIN: &str = "ws://127.0.0.1:9998";
