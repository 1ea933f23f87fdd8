// ── Domain types ──

mod device;
mod install;

pub use device::NetworkDevice;
pub use install::{InstallOutcome, InstallPhase, InstallProgress};
