//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing diagnostics with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use tvsling_api::ApiError;
use tvsling_config::ConfigError;
use tvsling_core::{ArchiveError, CoreError, IdentityError, PatchError};

/// Stable process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const INSTALL: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Devices ──────────────────────────────────────────────────────
    #[error("No developer API at {address} (probe timed out after {timeout_ms}ms)")]
    #[diagnostic(
        code(tvsling::device_unreachable),
        help(
            "Check that Developer Mode is enabled on the TV and that this\n\
             machine's IP is registered as the developer host.\n\
             Try: tvsling scan"
        )
    )]
    DeviceUnreachable { address: String, timeout_ms: u64 },

    #[error("No devices found on the local network")]
    #[diagnostic(
        code(tvsling::no_devices),
        help(
            "Make sure the TV is on the same subnet and Developer Mode is on.\n\
             Virtual adapters are skipped by default; try --include-virtual."
        )
    )]
    NoDevices,

    // ── Credentials / configuration ──────────────────────────────────
    #[error("No access token configured")]
    #[diagnostic(
        code(tvsling::no_access_token),
        help(
            "Set TVSLING_ACCESS_TOKEN, pass --token, or run: tvsling config init"
        )
    )]
    NoAccessToken,

    #[error("No media server configured")]
    #[diagnostic(
        code(tvsling::no_server),
        help("Pass --server or run: tvsling config init")
    )]
    NoServer,

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tvsling::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(tvsling::config))]
    Config(String),

    // ── Install ──────────────────────────────────────────────────────
    #[error("Install failed: {message}")]
    #[diagnostic(
        code(tvsling::install_failed),
        help("Re-run with -v for the full installer output.")
    )]
    InstallFailed { message: String },

    // ── Cancellation ─────────────────────────────────────────────────
    #[error("Operation cancelled")]
    #[diagnostic(code(tvsling::cancelled))]
    Cancelled,

    // ── Wrapped domain errors ────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(tvsling::api))]
    Api(#[from] ApiError),

    #[error(transparent)]
    #[diagnostic(code(tvsling::identity))]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    #[diagnostic(code(tvsling::archive))]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    #[diagnostic(code(tvsling::patch))]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DeviceUnreachable { .. } | Self::NoDevices => exit_code::NOT_FOUND,
            Self::NoAccessToken => exit_code::AUTH,
            Self::NoServer | Self::Validation { .. } => exit_code::USAGE,
            Self::InstallFailed { .. } => exit_code::INSTALL,
            Self::Cancelled => exit_code::CANCELLED,
            Self::Api(err) => match err {
                ApiError::Enrollment { .. } => exit_code::AUTH,
                ApiError::Cancelled => exit_code::CANCELLED,
                _ => exit_code::CONNECTION,
            },
            Self::Identity(IdentityError::Enrollment(_)) => exit_code::AUTH,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Api(e) => Self::Api(e),
            CoreError::Identity(e) => Self::Identity(e),
            CoreError::Archive(e) => Self::Archive(e),
            CoreError::Patch(e) => Self::Patch(e),
            CoreError::DeviceUnreachable {
                address,
                timeout_ms,
            } => Self::DeviceUnreachable {
                address,
                timeout_ms,
            },
            CoreError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoAccessToken => Self::NoAccessToken,
            ConfigError::NoServer => Self::NoServer,
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(CliError::NoDevices.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(CliError::NoAccessToken.exit_code(), exit_code::AUTH);
        assert_eq!(CliError::Cancelled.exit_code(), exit_code::CANCELLED);
        assert_eq!(
            CliError::InstallFailed {
                message: "boom".into()
            }
            .exit_code(),
            exit_code::INSTALL
        );
    }

    #[test]
    fn core_cancellation_maps_to_cancelled() {
        let err = CliError::from(CoreError::Cancelled);
        assert!(matches!(err, CliError::Cancelled));
    }
}
