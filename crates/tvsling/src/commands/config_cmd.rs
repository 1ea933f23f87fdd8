//! Config subcommand handlers.

use dialoguer::Input;
use tvsling_config::{Config, config_path, load_config_or_default, save_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::prompt_err;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config_path().display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = load_config_or_default();
            output::print_output(&format_config_redacted(&cfg), global.quiet);
            Ok(())
        }
        ConfigCommand::Init => init(global),
    }
}

/// Interactively populate and write the configuration file. `--yes`
/// accepts empty defaults without prompting.
fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = load_config_or_default();

    if !global.yes {
        let server: String = Input::new()
            .with_prompt("Media server URL")
            .with_initial_text(cfg.server.url.clone().unwrap_or_default())
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_err)?;
        if !server.is_empty() {
            server.parse::<url::Url>().map_err(|_| CliError::Validation {
                field: "server.url".into(),
                reason: format!("invalid URL: {server}"),
            })?;
            cfg.server.url = Some(server);
        }

        let user_id: String = Input::new()
            .with_prompt("Server user id (optional)")
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_err)?;
        if !user_id.is_empty() {
            cfg.server.user_id = Some(user_id);
        }

        let tool: String = Input::new()
            .with_prompt("Installer tool path (optional)")
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_err)?;
        if !tool.is_empty() {
            cfg.install.tool_path = Some(tool.into());
        }

        let email: String = Input::new()
            .with_prompt("Certificate email (optional)")
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_err)?;
        if !email.is_empty() {
            cfg.identity.email = Some(email);
        }
    }

    save_config(&cfg)?;
    let color = output::should_color(&global.color);
    output::print_output(
        &output::success_line(
            &format!("configuration written to {}", config_path().display()),
            color,
        ),
        global.quiet,
    );
    Ok(())
}

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    let _ = writeln!(out, "[server]");
    if let Some(ref url) = cfg.server.url {
        let _ = writeln!(out, "url = \"{url}\"");
    }
    if cfg.server.access_token.is_some() {
        let _ = writeln!(out, "access_token = \"****\"");
    }
    if let Some(ref env) = cfg.server.access_token_env {
        let _ = writeln!(out, "access_token_env = \"{env}\"");
    }
    if let Some(ref user) = cfg.server.user_id {
        let _ = writeln!(out, "user_id = \"{user}\"");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[scan]");
    let _ = writeln!(out, "probe_timeout_ms = {}", cfg.scan.probe_timeout_ms);
    let _ = writeln!(out, "concurrency = {}", cfg.scan.concurrency);
    let _ = writeln!(out, "include_virtual = {}", cfg.scan.include_virtual);

    let _ = writeln!(out);
    let _ = writeln!(out, "[patch]");
    let _ = writeln!(out, "plugins = {:?}", cfg.patch.plugins);
    let _ = writeln!(out, "diagnostics = {}", cfg.patch.diagnostics);
    let _ = writeln!(out, "autologin = {}", cfg.patch.autologin);
    if cfg.patch.custom_css.is_some() {
        let _ = writeln!(out, "custom_css = \"…\"");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[install]");
    if let Some(ref tool) = cfg.install.tool_path {
        let _ = writeln!(out, "tool_path = \"{}\"", tool.display());
    }
    if let Some(ref dir) = cfg.install.download_dir {
        let _ = writeln!(out, "download_dir = \"{}\"", dir.display());
    }
    let _ = writeln!(out, "elevate = {}", cfg.install.elevate);

    let _ = writeln!(out);
    let _ = writeln!(out, "[identity]");
    if let Some(ref email) = cfg.identity.email {
        let _ = writeln!(out, "email = \"{email}\"");
    }
    if let Some(ref dir) = cfg.identity.output_dir {
        let _ = writeln!(out, "output_dir = \"{}\"", dir.display());
    }

    out.trim_end().to_owned()
}
