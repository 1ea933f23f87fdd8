//! Command handlers, one module per top-level subcommand.

pub mod cert;
pub mod config_cmd;
pub mod install;
pub mod patch;
pub mod scan;

use secrecy::SecretString;
use tvsling_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the access token: CLI flag first, then the config chain.
pub(crate) fn resolve_token(global: &GlobalOpts, config: &Config) -> Result<SecretString, CliError> {
    if let Some(ref token) = global.token {
        return Ok(SecretString::from(token.clone()));
    }
    Ok(tvsling_config::resolve_access_token(&config.server)?)
}

/// Resolve the media server URL: CLI flag first, then the config file.
pub(crate) fn resolve_server(global: &GlobalOpts, config: &Config) -> Result<url::Url, CliError> {
    if let Some(ref raw) = global.server {
        return raw.parse().map_err(|_| CliError::Validation {
            field: "--server".into(),
            reason: format!("invalid URL: {raw}"),
        });
    }
    Ok(config.server_url()?)
}

/// Map a dialoguer / interactive I/O failure into a CliError.
pub(crate) fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
