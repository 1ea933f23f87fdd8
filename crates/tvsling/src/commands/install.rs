//! Install command handler: patch pipeline plus installer orchestration.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use dialoguer::Select;
use tokio_util::sync::CancellationToken;
use tvsling_config::Config;
use tvsling_core::{
    InstallOptions, InstallOrchestrator, InstallOutcome, InstallPhase, InstallProgress,
    NetworkDevice, PackageSource,
};
use url::Url;

use crate::cli::{GlobalOpts, InstallArgs};
use crate::error::CliError;
use crate::output;

use super::{patch, prompt_err, scan};

pub async fn run(
    args: &InstallArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let config = tvsling_config::load_config_or_default();
    let options = install_options(args, &config)?;

    let device = match args.device {
        Some(address) => address,
        None => pick_device(&config, global, cancel).await?,
    };

    let source = resolve_source(args, global, &config, &options, cancel).await?;

    let bar = output::spinner("Installing…", global.quiet);
    let orchestrator = InstallOrchestrator::new(options);
    let outcome = orchestrator
        .install(&source, device, cancel, |progress| match progress {
            InstallProgress::Phase(InstallPhase::Downloading) => {
                bar.set_message("Downloading package…");
            }
            InstallProgress::Phase(InstallPhase::Installing) => {
                bar.set_message(format!("Installing on {device}…"));
            }
            InstallProgress::Phase(_) | InstallProgress::Downloaded { .. } => {}
        })
        .await;
    bar.finish_and_clear();

    let color = output::should_color(&global.color);
    match outcome {
        InstallOutcome::Succeeded => {
            output::print_output(
                &output::success_line(&format!("installed on {device}"), color),
                global.quiet,
            );
            Ok(())
        }
        InstallOutcome::Cancelled => Err(CliError::Cancelled),
        InstallOutcome::Failed { message } => {
            output::print_output(&output::failure_line("install failed", color), global.quiet);
            Err(CliError::InstallFailed { message })
        }
    }
}

fn install_options(args: &InstallArgs, config: &Config) -> Result<InstallOptions, CliError> {
    let tool_path = args
        .tool
        .clone()
        .or_else(|| config.install.tool_path.clone())
        .ok_or_else(|| CliError::Validation {
            field: "install.tool_path".into(),
            reason: "no installer tool configured; pass --tool or set [install].tool_path".into(),
        })?;

    Ok(InstallOptions {
        tool_path,
        elevate: config.install.elevate && !args.no_elevate,
        download_dir: config
            .install
            .download_dir
            .clone()
            .unwrap_or_else(tvsling_config::default_download_dir),
    })
}

/// Turn `--package` into an install source, patching first unless
/// `--no-patch`. Patching a remote package means downloading it up front;
/// an unpatched remote package is handed to the orchestrator as a URL.
async fn resolve_source(
    args: &InstallArgs,
    global: &GlobalOpts,
    config: &Config,
    options: &InstallOptions,
    cancel: &CancellationToken,
) -> Result<PackageSource, CliError> {
    let remote = Url::parse(&args.package)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"));

    let local: PathBuf = match remote {
        Some(url) => {
            if args.no_patch {
                return Ok(PackageSource::Remote(url));
            }
            download(&url, options, global, cancel).await?
        }
        None => PathBuf::from(&args.package),
    };

    if !args.no_patch {
        patch::apply_to_package(
            &local,
            &patch::build_settings(config, &args.patch)?,
            &patch::enabled_steps(config, false),
            global,
            config,
        )
        .await?;
    }

    Ok(PackageSource::Local(local))
}

async fn download(
    url: &Url,
    options: &InstallOptions,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<PathBuf, CliError> {
    let name = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("package.wgt");
    let dest = options.download_dir.join(name);
    std::fs::create_dir_all(&options.download_dir)?;

    let http = reqwest::Client::new();
    let mut bar: Option<indicatif::ProgressBar> = None;
    tvsling_api::download_to_file(&http, url, &dest, cancel, |received, total| {
        let bar = bar.get_or_insert_with(|| output::download_bar(total, global.quiet));
        bar.set_position(received);
    })
    .await?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    Ok(dest)
}

async fn pick_device(
    config: &Config,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<Ipv4Addr, CliError> {
    let devices = scan::discover(&config.scan_options(), global, cancel).await?;
    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }
    if devices.is_empty() {
        return Err(CliError::NoDevices);
    }
    if devices.len() == 1 || global.yes {
        return Ok(devices[0].address);
    }

    let labels: Vec<String> = devices.iter().map(NetworkDevice::label).collect();
    let choice = Select::new()
        .with_prompt("Select a device")
        .items(&labels)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    Ok(devices[choice].address)
}
