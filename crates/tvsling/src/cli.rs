//! Clap derive structures for the `tvsling` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tvsling -- provision smart TVs and retrofit app packages
#[derive(Debug, Parser)]
#[command(
    name = "tvsling",
    version,
    about = "Provision smart TVs on the local network",
    long_about = "Discover TVs exposing the developer API, issue code-signing \n\
        identities, retrofit distributable app packages, and drive the \n\
        vendor installer against a selected device.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Media server URL (overrides the config file)
    #[arg(long, short = 's', env = "TVSLING_SERVER", global = true)]
    pub server: Option<String>,

    /// Server access token
    #[arg(long, env = "TVSLING_ACCESS_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Server-side user id
    #[arg(long, short = 'u', env = "TVSLING_USER_ID", global = true)]
    pub user: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TVSLING_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip interactive prompts, taking defaults
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the local network for TVs with the developer API enabled
    #[command(alias = "s")]
    Scan(ScanArgs),

    /// Check one address for a reachable developer API
    #[command(alias = "v")]
    Validate(ValidateArgs),

    /// Manage code-signing identities
    Cert(CertArgs),

    /// Retrofit a distributable app package in place
    #[command(alias = "p")]
    Patch(PatchArgs),

    /// Patch a package and install it on a device
    #[command(alias = "i")]
    Install(InstallArgs),

    /// Manage the configuration file
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Scan / Validate ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Per-host probe timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Maximum concurrent probes
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Also scan ranges derived from virtual adapters
    #[arg(long)]
    pub include_virtual: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// IPv4 address of the TV
    pub address: Ipv4Addr,

    /// Probe timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

// ── Cert ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CertArgs {
    #[command(subcommand)]
    pub command: CertCommand,
}

#[derive(Debug, Subcommand)]
pub enum CertCommand {
    /// Issue a signed author + distributor identity for one device
    Issue(CertIssueArgs),
}

#[derive(Debug, Args)]
pub struct CertIssueArgs {
    /// Email placed in the request subject
    #[arg(long)]
    pub email: Option<String>,

    /// Device unique id (DUID) bound into the certificate
    #[arg(long)]
    pub device_id: String,

    /// Directory the identity bundles are written to
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Vendor enrollment endpoint
    #[arg(long, env = "TVSLING_ENROLLMENT_URL", hide_env = true)]
    pub endpoint: Option<String>,
}

// ── Patch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PatchArgs {
    /// Path of the package archive to patch in place
    pub package: PathBuf,

    #[command(flatten)]
    pub flags: PatchFlags,

    /// Skip the auto-login credential injection
    #[arg(long)]
    pub no_autologin: bool,
}

// ── Install ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Target device address (interactive pick when omitted)
    #[arg(long, short = 'd')]
    pub device: Option<Ipv4Addr>,

    /// Package to install: a local path or an http(s) URL
    #[arg(long, short = 'p')]
    pub package: String,

    /// Installer tool path (overrides the config file)
    #[arg(long)]
    pub tool: Option<PathBuf>,

    /// Run the installer without requesting OS elevation
    #[arg(long)]
    pub no_elevate: bool,

    /// Install the package as-is, without the patch pipeline
    #[arg(long)]
    pub no_patch: bool,

    #[command(flatten)]
    pub patch: PatchFlags,
}

/// Patch inputs shared with the standalone `patch` command.
#[derive(Debug, Args)]
pub struct PatchFlags {
    /// Plugin compatibility patches to queue (repeatable)
    #[arg(long = "plugin")]
    pub plugins: Vec<String>,

    /// CSS file whose contents are injected into the client
    #[arg(long)]
    pub custom_css: Option<PathBuf>,

    /// Mirror console output to the local diagnostic bridge
    #[arg(long)]
    pub diagnostics: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactively create the configuration file
    Init,
    /// Print the effective configuration (secrets masked)
    Show,
    /// Print the configuration file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_asserts() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
