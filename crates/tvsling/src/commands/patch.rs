//! Patch command handler and the patch helper shared with `install`.

use std::path::Path;
use std::time::Duration;

use tvsling_api::ServerInfoClient;
use tvsling_config::Config;
use tvsling_core::{ArchiveWorkspace, PatchContext, PatchSettings, PatchStep, apply_pipeline};

use crate::cli::{GlobalOpts, PatchArgs, PatchFlags};
use crate::error::CliError;
use crate::output;

pub async fn run(args: &PatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = tvsling_config::load_config_or_default();
    let settings = build_settings(&config, &args.flags)?;

    let steps = enabled_steps(&config, args.no_autologin);

    apply_to_package(&args.package, &settings, &steps, global, &config).await?;

    let color = output::should_color(&global.color);
    output::print_output(
        &output::success_line(
            &format!("patched {}", args.package.display()),
            color,
        ),
        global.quiet,
    );
    Ok(())
}

/// The canonical step order minus auto-login when disabled by flag or
/// config.
pub(crate) fn enabled_steps(config: &Config, no_autologin: bool) -> Vec<PatchStep> {
    let autologin = config.patch.autologin && !no_autologin;
    PatchStep::CANONICAL_ORDER
        .into_iter()
        .filter(|step| autologin || *step != PatchStep::AutoLogin)
        .collect()
}

/// Merge config-file patch settings with command-line flags. Flags add to
/// the configured plugin list rather than replacing it.
pub(crate) fn build_settings(
    config: &Config,
    flags: &PatchFlags,
) -> Result<PatchSettings, CliError> {
    let mut settings = config.patch_settings()?;

    for name in &flags.plugins {
        let plugin = name.parse().map_err(|reason| CliError::Validation {
            field: "--plugin".into(),
            reason,
        })?;
        if !settings.plugins.contains(&plugin) {
            settings.plugins.push(plugin);
        }
    }
    if let Some(ref path) = flags.custom_css {
        settings.custom_css = Some(std::fs::read_to_string(path)?);
    }
    settings.diagnostics |= flags.diagnostics;

    Ok(settings)
}

/// Extract, run the pipeline, repack. The archive is only replaced after
/// a fully successful run.
pub(crate) async fn apply_to_package(
    package: &Path,
    settings: &PatchSettings,
    steps: &[PatchStep],
    global: &GlobalOpts,
    config: &Config,
) -> Result<(), CliError> {
    let server_url = super::resolve_server(global, config)?;

    let bar = output::spinner("Patching package…", global.quiet);
    let workspace = ArchiveWorkspace::extract(package)?;

    let mut ctx = PatchContext::new(&workspace, server_url, settings)
        .with_server_info_client(ServerInfoClient::new(Duration::from_secs(15))?);

    // Credentials are optional: without them auto-login silently skips.
    let user_id = global.user.clone().or_else(|| config.server.user_id.clone());
    let token = super::resolve_token(global, config).ok();
    if let (Some(user_id), Some(token)) = (user_id, token) {
        ctx = ctx.with_credentials(user_id, token);
    }

    apply_pipeline(&mut ctx, steps).await?;
    drop(ctx);

    workspace.repack()?;
    bar.finish_and_clear();
    Ok(())
}
