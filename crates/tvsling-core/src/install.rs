// Install orchestration.
//
// Drives the vendor installer CLI against a selected device:
// `Idle → Downloading → ToolEnsured → Installing → {Succeeded, Failed,
// Cancelled}`. The child's output always goes through a transient capture
// file -- elevated processes cannot have their standard streams piped on
// the platforms we elevate on -- and is read back after exit.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use tvsling_api::{ApiError, download_to_file};

use crate::model::{InstallOutcome, InstallPhase, InstallProgress};

/// Exit code the OS reports when the user declines the elevation prompt.
///
/// Windows: `ERROR_CANCELLED` (1223) from UAC. Unix: 126, pkexec's
/// "authorization dialog dismissed".
#[cfg(windows)]
pub const ELEVATION_DECLINED_EXIT: i32 = 1223;
#[cfg(not(windows))]
pub const ELEVATION_DECLINED_EXIT: i32 = 126;

/// Message used when the tool is absent; kept distinct from generic
/// failures so callers can suggest installing the SDK tooling.
const TOOL_MISSING: &str = "installer tool not found";

/// Where the package comes from.
#[derive(Debug, Clone)]
pub enum PackageSource {
    Remote(Url),
    Local(PathBuf),
}

/// Per-orchestrator configuration, passed in at construction.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Path of the vendor installer CLI.
    pub tool_path: PathBuf,
    /// Wrap the tool invocation in an OS elevation request.
    pub elevate: bool,
    /// Directory remote packages are downloaded into.
    pub download_dir: PathBuf,
}

/// Drives one install operation at a time against one device.
pub struct InstallOrchestrator {
    http: reqwest::Client,
    options: InstallOptions,
}

impl InstallOrchestrator {
    pub fn new(options: InstallOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            options,
        }
    }

    /// Run the full install state machine. Never returns an `Err`: every
    /// failure mode collapses into the terminal [`InstallOutcome`].
    pub async fn install(
        &self,
        source: &PackageSource,
        device: Ipv4Addr,
        cancel: &CancellationToken,
        progress: impl Fn(InstallProgress),
    ) -> InstallOutcome {
        progress(InstallProgress::Phase(InstallPhase::Downloading));
        let package = match self.obtain_package(source, cancel, &progress).await {
            Ok(path) => path,
            Err(ApiError::Cancelled) => {
                progress(InstallProgress::Phase(InstallPhase::Cancelled));
                return InstallOutcome::Cancelled;
            }
            Err(err) => {
                progress(InstallProgress::Phase(InstallPhase::Failed));
                return InstallOutcome::Failed {
                    message: format!("package download failed: {err}"),
                };
            }
        };

        if !self.options.tool_path.is_file() {
            progress(InstallProgress::Phase(InstallPhase::Failed));
            return InstallOutcome::Failed {
                message: format!("{TOOL_MISSING} at {}", self.options.tool_path.display()),
            };
        }
        progress(InstallProgress::Phase(InstallPhase::ToolEnsured));

        // Last cooperative check before spawning: an elevated child cannot
        // be killed mid-elevation, so this is the final chance to stop.
        if cancel.is_cancelled() {
            progress(InstallProgress::Phase(InstallPhase::Cancelled));
            return InstallOutcome::Cancelled;
        }

        progress(InstallProgress::Phase(InstallPhase::Installing));
        let outcome = self.run_tool(&package, device, cancel).await;

        progress(InstallProgress::Phase(match outcome {
            InstallOutcome::Succeeded => InstallPhase::Succeeded,
            InstallOutcome::Failed { .. } => InstallPhase::Failed,
            InstallOutcome::Cancelled => InstallPhase::Cancelled,
        }));
        outcome
    }

    async fn obtain_package(
        &self,
        source: &PackageSource,
        cancel: &CancellationToken,
        progress: &impl Fn(InstallProgress),
    ) -> Result<PathBuf, ApiError> {
        match source {
            PackageSource::Local(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(ApiError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("package not found: {}", path.display()),
                    )))
                }
            }
            PackageSource::Remote(url) => {
                let name = url
                    .path_segments()
                    .and_then(|mut s| s.next_back())
                    .filter(|s| !s.is_empty())
                    .unwrap_or("package.wgt");
                let dest = self.options.download_dir.join(name);
                std::fs::create_dir_all(&self.options.download_dir)?;

                download_to_file(&self.http, url, &dest, cancel, |received, total| {
                    progress(InstallProgress::Downloaded { received, total });
                })
                .await?;
                Ok(dest)
            }
        }
    }

    /// Spawn the installer tool and interpret its exit.
    ///
    /// Cancellation requested while the child runs is honoured only after
    /// the process exits naturally -- elevated children cannot be killed
    /// mid-elevation -- and then reported as `Cancelled`.
    async fn run_tool(
        &self,
        package: &Path,
        device: Ipv4Addr,
        cancel: &CancellationToken,
    ) -> InstallOutcome {
        let capture = match tempfile::NamedTempFile::with_prefix("tvsling-install-") {
            Ok(file) => file,
            Err(err) => {
                return InstallOutcome::Failed {
                    message: format!("could not create output capture file: {err}"),
                };
            }
        };

        let mut command = if self.options.elevate {
            elevated_command(&self.options.tool_path, package, device, capture.path())
        } else {
            direct_command(&self.options.tool_path, package, device, capture.path())
        };

        info!(
            tool = %self.options.tool_path.display(),
            %device,
            elevated = self.options.elevate,
            "spawning installer tool"
        );

        let status = match command.status().await {
            Ok(status) => status,
            Err(err) => {
                return InstallOutcome::Failed {
                    message: format!("failed to spawn installer tool: {err}"),
                };
            }
        };

        if cancel.is_cancelled() {
            // The process ran to completion anyway; the user asked out.
            warn!("install cancelled by user after tool exit");
            return InstallOutcome::Cancelled;
        }

        let output = std::fs::read_to_string(capture.path()).ok();
        interpret_exit(status.code(), output.as_deref())
    }
}

/// Map the tool's exit condition onto the install outcome. Pure so the
/// three-way split (success / declined elevation / failure) is testable
/// without spawning anything.
pub fn interpret_exit(code: Option<i32>, output: Option<&str>) -> InstallOutcome {
    match code {
        Some(0) => InstallOutcome::Succeeded,
        Some(ELEVATION_DECLINED_EXIT) => InstallOutcome::Cancelled,
        _ => {
            let captured = output.map(str::trim).filter(|s| !s.is_empty());
            let message = match (code, captured) {
                (Some(code), Some(text)) => format!("installer exited with code {code}: {text}"),
                (Some(code), None) => {
                    format!("installer exited with code {code} and produced no output")
                }
                (None, Some(text)) => format!("installer terminated by signal: {text}"),
                (None, None) => "installer terminated by signal with no output".to_owned(),
            };
            InstallOutcome::Failed { message }
        }
    }
}

fn tool_args(package: &Path, device: Ipv4Addr) -> Vec<String> {
    vec![
        "install".to_owned(),
        "-t".to_owned(),
        device.to_string(),
        "-n".to_owned(),
        package.display().to_string(),
    ]
}

/// Unelevated invocation: both streams go straight to the capture file.
fn direct_command(
    tool: &Path,
    package: &Path,
    device: Ipv4Addr,
    capture: &Path,
) -> tokio::process::Command {
    let mut command = tokio::process::Command::new(tool);
    command.args(tool_args(package, device));

    match std::fs::File::create(capture).and_then(|out| out.try_clone().map(|err_h| (out, err_h))) {
        Ok((out, err_h)) => {
            command.stdout(std::process::Stdio::from(out));
            command.stderr(std::process::Stdio::from(err_h));
        }
        Err(err) => {
            warn!(%err, "could not attach capture file, discarding tool output");
            command.stdout(std::process::Stdio::null());
            command.stderr(std::process::Stdio::null());
        }
    }
    command
}

#[cfg(unix)]
fn elevated_command(
    tool: &Path,
    package: &Path,
    device: Ipv4Addr,
    capture: &Path,
) -> tokio::process::Command {
    // pkexec runs the command as root after an authorization dialog; the
    // redirection happens inside the child shell so root owns the writes.
    let line = format!(
        "{} {} > {} 2>&1",
        shell_quote(&tool.display().to_string()),
        tool_args(package, device)
            .iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" "),
        shell_quote(&capture.display().to_string()),
    );

    let mut command = tokio::process::Command::new("pkexec");
    command.arg("sh").arg("-c").arg(line);
    command
}

#[cfg(windows)]
fn elevated_command(
    tool: &Path,
    package: &Path,
    device: Ipv4Addr,
    capture: &Path,
) -> tokio::process::Command {
    // Start-Process -Verb RunAs raises the UAC prompt; a declined prompt
    // throws, which the catch maps onto the canonical 1223 exit code.
    let inner = format!(
        "\"{}\" {} > \"{}\" 2>&1",
        tool.display(),
        tool_args(package, device).join(" "),
        capture.display(),
    );
    let script = format!(
        "try {{ \
         $p = Start-Process -FilePath 'cmd.exe' -ArgumentList '/c','{inner}' -Verb RunAs -Wait -PassThru; \
         exit $p.ExitCode \
         }} catch {{ exit {ELEVATION_DECLINED_EXIT} }}"
    );

    let mut command = tokio::process::Command::new("powershell");
    command.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
    command
}

#[cfg(unix)]
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
