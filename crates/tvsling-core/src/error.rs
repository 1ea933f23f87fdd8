use std::path::PathBuf;

use thiserror::Error;
use tvsling_api::ApiError;

/// Identity-issuance failures.
///
/// The split matters to callers: key generation failing means the
/// cryptographic provider is unusable (no retry), while enrollment
/// failures are recoverable with a fresh request.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// RSA key-pair generation failed. Fatal -- do not retry.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Building or signing the PKCS#10 request failed.
    #[error("Certificate request construction failed: {0}")]
    Request(String),

    /// The vendor enrollment endpoint rejected or failed the exchange.
    /// Recoverable -- the caller may retry with a new request.
    #[error("Enrollment failed: {0}")]
    Enrollment(#[source] ApiError),

    /// Writing a password-protected identity bundle failed.
    #[error("Failed to write identity bundle {path}: {message}")]
    Bundle { path: PathBuf, message: String },
}

/// Archive extraction / repacking failures. Fatal for the install attempt.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt or unreadable archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to replace {path}: {message}")]
    Replace { path: PathBuf, message: String },
}

/// Per-step patch failures.
///
/// `MissingAsset` is recoverable at the pipeline level (the step is
/// skipped with a warning); the rest abort the current install attempt.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Expected asset not found: {0}")]
    MissingAsset(PathBuf),

    #[error("I/O error patching {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed server-list manifest: {0}")]
    ServerManifest(#[from] serde_json::Error),
}

impl PatchError {
    /// Recoverable failures are absorbed by the pipeline (step skipped,
    /// warning logged); everything else propagates.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingAsset(_))
    }
}

/// Top-level error type for `tvsling-core` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    /// A manually supplied address did not accept the developer-API port.
    #[error("No developer API at {address}: connection failed within {timeout_ms}ms")]
    DeviceUnreachable { address: String, timeout_ms: u64 },

    /// Operation aborted via the cancellation token before producing a result.
    #[error("Operation cancelled")]
    Cancelled,
}
