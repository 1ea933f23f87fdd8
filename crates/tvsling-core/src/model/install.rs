// ── Install orchestration domain types ──

use serde::{Deserialize, Serialize};

/// Terminal result of an install operation. Never mutated after
/// construction.
///
/// `Cancelled` is deliberately distinct from `Failed`: a user declining
/// the OS elevation prompt is not an error condition and the caller
/// should not present it as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallOutcome {
    Succeeded,
    Failed { message: String },
    Cancelled,
}

impl InstallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// The failure message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            Self::Succeeded | Self::Cancelled => None,
        }
    }
}

/// Phases of the install state machine:
/// `Idle → Downloading → ToolEnsured → Installing → {Succeeded, Failed, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallPhase {
    Idle,
    Downloading,
    ToolEnsured,
    Installing,
    Succeeded,
    Failed,
    Cancelled,
}

/// Progress events emitted by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub enum InstallProgress {
    Phase(InstallPhase),
    /// Bytes received so far and the total when the server reported one.
    Downloaded { received: u64, total: Option<u64> },
}
