//! Shared configuration for the tvsling CLI.
//!
//! TOML config file merged with `TVSLING_`-prefixed environment
//! variables, credential resolution (env + plaintext), and translation
//! into the option structs `tvsling_core` consumes.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tvsling_core::{InstallOptions, PatchSettings, PluginPatch, ScanOptions};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured (set [server].access_token or TVSLING_SERVER__ACCESS_TOKEN)")]
    NoAccessToken,

    #[error("no server URL configured (set [server].url or TVSLING_SERVER__URL)")]
    NoServer,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Media server the patched client talks to.
    #[serde(default)]
    pub server: ServerSection,

    /// Network scan tuning.
    #[serde(default)]
    pub scan: ScanSection,

    /// Package patch pipeline inputs.
    #[serde(default)]
    pub patch: PatchSection,

    /// Installer tool configuration.
    #[serde(default)]
    pub install: InstallSection,

    /// Signing identity defaults.
    #[serde(default)]
    pub identity: IdentitySection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerSection {
    /// Server base URL (e.g., "http://192.168.1.20:8096").
    pub url: Option<String>,

    /// Access token (plaintext — prefer the environment variable).
    pub access_token: Option<String>,

    /// Environment variable name containing the access token.
    pub access_token_env: Option<String>,

    /// Server-side user id injected by the auto-login patch.
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ScanSection {
    /// Per-host probe budget in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Maximum in-flight probes.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Scan ranges derived from virtual adapters too.
    #[serde(default)]
    pub include_virtual: bool,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            concurrency: default_concurrency(),
            include_virtual: false,
        }
    }
}

fn default_probe_timeout_ms() -> u64 {
    1500
}
fn default_concurrency() -> usize {
    64
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PatchSection {
    /// Plugin names with compatibility patches to apply.
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Literal CSS injected into the client.
    pub custom_css: Option<String>,

    /// Mirror console output to the diagnostic bridge.
    #[serde(default)]
    pub diagnostics: bool,

    /// Seed stored credentials into the patched client.
    #[serde(default = "default_autologin")]
    pub autologin: bool,
}

impl Default for PatchSection {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
            custom_css: None,
            diagnostics: false,
            autologin: default_autologin(),
        }
    }
}

fn default_autologin() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InstallSection {
    /// Path of the vendor installer CLI.
    pub tool_path: Option<PathBuf>,

    /// Directory downloaded packages land in (defaults to the platform
    /// cache directory).
    pub download_dir: Option<PathBuf>,

    /// Wrap the installer invocation in an OS elevation request.
    #[serde(default = "default_elevate")]
    pub elevate: bool,
}

impl Default for InstallSection {
    fn default() -> Self {
        Self {
            tool_path: None,
            download_dir: None,
            elevate: default_elevate(),
        }
    }
}

fn default_elevate() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct IdentitySection {
    /// Email placed in the certificate request subject.
    pub email: Option<String>,

    /// Directory issued identity bundles are written to (defaults to the
    /// platform data directory).
    pub output_dir: Option<PathBuf>,
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tvsling", "tvsling")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory for downloaded packages.
pub fn default_download_dir() -> PathBuf {
    project_dirs().map_or_else(dirs_fallback, |dirs| dirs.cache_dir().to_path_buf())
}

/// Default directory for issued identity bundles.
pub fn default_identity_dir() -> PathBuf {
    project_dirs().map_or_else(dirs_fallback, |dirs| {
        dirs.data_dir().join("identities")
    })
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tvsling");
    p
}

// ── Config loading / saving ─────────────────────────────────────────

/// Load the full [`Config`] from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from an explicit path, still merging the environment.
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TVSLING_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning defaults when the file does not exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the server access token from the credential chain.
pub fn resolve_access_token(server: &ServerSection) -> Result<SecretString, ConfigError> {
    // 1. Named env var from the config
    if let Some(ref env_name) = server.access_token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Conventional env var
    if let Ok(val) = std::env::var("TVSLING_ACCESS_TOKEN") {
        return Ok(SecretString::from(val));
    }

    // 3. Plaintext in config
    if let Some(ref token) = server.access_token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoAccessToken)
}

// ── Translation to core option structs ──────────────────────────────

impl Config {
    /// The configured server base URL, parsed.
    pub fn server_url(&self) -> Result<url::Url, ConfigError> {
        let raw = self.server.url.as_ref().ok_or(ConfigError::NoServer)?;
        raw.parse().map_err(|_| ConfigError::Validation {
            field: "server.url".into(),
            reason: format!("invalid URL: {raw}"),
        })
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            probe_timeout: Duration::from_millis(self.scan.probe_timeout_ms),
            concurrency: self.scan.concurrency.max(1),
            include_virtual: self.scan.include_virtual,
        }
    }

    pub fn patch_settings(&self) -> Result<PatchSettings, ConfigError> {
        let plugins = self
            .patch
            .plugins
            .iter()
            .map(|name| {
                name.parse::<PluginPatch>()
                    .map_err(|reason| ConfigError::Validation {
                        field: "patch.plugins".into(),
                        reason,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PatchSettings {
            custom_css: self.patch.custom_css.clone(),
            plugins,
            diagnostics: self.patch.diagnostics,
        })
    }

    pub fn install_options(&self) -> Result<InstallOptions, ConfigError> {
        let tool_path = self
            .install
            .tool_path
            .clone()
            .ok_or_else(|| ConfigError::Validation {
                field: "install.tool_path".into(),
                reason: "no installer tool configured".into(),
            })?;

        Ok(InstallOptions {
            tool_path,
            elevate: self.install.elevate,
            download_dir: self
                .install
                .download_dir
                .clone()
                .unwrap_or_else(default_download_dir),
        })
    }

    /// Directory identity bundles are written to.
    pub fn identity_dir(&self) -> PathBuf {
        self.identity
            .output_dir
            .clone()
            .unwrap_or_else(default_identity_dir)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        let scan = config.scan_options();
        assert_eq!(scan.probe_timeout, Duration::from_millis(1500));
        assert_eq!(scan.concurrency, 64);
        assert!(!scan.include_virtual);
        assert!(config.install.elevate);
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [server]
                url = "http://media.local:8096"

                [scan]
                concurrency = 16
                "#,
            )?;
            jail.set_env("TVSLING_SCAN__CONCURRENCY", "8");

            let config = load_config_from(std::path::Path::new("config.toml")).unwrap();
            assert_eq!(config.scan_options().concurrency, 8);
            assert_eq!(
                config.server_url().unwrap().as_str(),
                "http://media.local:8096/"
            );
            Ok(())
        });
    }

    #[test]
    fn token_chain_prefers_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TVSLING_ACCESS_TOKEN", "from-env");
            let section = ServerSection {
                access_token: Some("from-file".into()),
                ..ServerSection::default()
            };
            let token = resolve_access_token(&section).unwrap();
            assert_eq!(secrecy::ExposeSecret::expose_secret(&token), "from-env");
            Ok(())
        });
    }

    #[test]
    fn missing_token_is_an_error() {
        let section = ServerSection::default();
        assert!(matches!(
            resolve_access_token(&section),
            Err(ConfigError::NoAccessToken)
        ));
    }

    #[test]
    fn unknown_plugin_rejected() {
        let config = Config {
            patch: PatchSection {
                plugins: vec!["skip-intro".into(), "bogus".into()],
                ..PatchSection::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            config.patch_settings(),
            Err(ConfigError::Validation { .. })
        ));
    }
}
