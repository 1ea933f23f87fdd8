//! Scan and validate command handlers.

use std::time::Duration;

use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use tvsling_api::DeviceInfoClient;
use tvsling_core::{DeviceScanner, NetworkDevice, ScanOptions};

use crate::cli::{GlobalOpts, ScanArgs, ValidateArgs};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Type")]
    dtype: String,
    #[tabled(rename = "Dev Mode")]
    dev_mode: String,
    #[tabled(rename = "Dev Host")]
    dev_host: String,
}

impl From<&NetworkDevice> for DeviceRow {
    fn from(d: &NetworkDevice) -> Self {
        Self {
            address: d.address.to_string(),
            name: d.name.clone().unwrap_or_else(|| "-".into()),
            model: d.model.clone().unwrap_or_else(|| "-".into()),
            dtype: d.device_type.clone().unwrap_or_else(|| "-".into()),
            dev_mode: if d.developer_mode { "on" } else { "off" }.into(),
            dev_host: d.developer_ip.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn run(
    args: &ScanArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let config = tvsling_config::load_config_or_default();
    let mut opts = config.scan_options();
    if let Some(ms) = args.timeout {
        opts.probe_timeout = Duration::from_millis(ms);
    }
    if let Some(n) = args.concurrency {
        opts.concurrency = n.max(1);
    }
    opts.include_virtual |= args.include_virtual;

    let devices = discover(&opts, global, cancel).await?;
    if cancel.is_cancelled() && devices.is_empty() {
        return Err(CliError::Cancelled);
    }
    if devices.is_empty() {
        return Err(CliError::NoDevices);
    }

    let rendered = output::render_list(&global.output, &devices, |d| DeviceRow::from(d), |d| {
        d.address.to_string()
    });
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn validate(
    args: &ValidateArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let config = tvsling_config::load_config_or_default();
    let opts = config.scan_options();
    let probe_timeout = args
        .timeout
        .map_or(opts.probe_timeout, Duration::from_millis);

    let scanner = scanner(probe_timeout)?;
    let device = scanner.validate(args.address, probe_timeout, cancel).await?;

    let color = output::should_color(&global.color);
    let mode = if device.developer_mode {
        "developer mode on"
    } else {
        "developer mode off"
    };
    output::print_output(
        &output::success_line(&format!("{} — {mode}", device.label()), color),
        global.quiet,
    );
    Ok(())
}

/// Run one network scan with a spinner. Shared with the install command's
/// interactive device pick.
pub(crate) async fn discover(
    opts: &ScanOptions,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<Vec<NetworkDevice>, CliError> {
    let scanner = scanner(opts.probe_timeout)?;

    let bar = output::spinner("Scanning local network for TVs…", global.quiet);
    let devices = scanner.scan(opts, cancel).await;
    bar.finish_and_clear();

    Ok(devices)
}

fn scanner(probe_timeout: Duration) -> Result<DeviceScanner, CliError> {
    // The HTTP fetch gets its own budget on top of the TCP probe.
    let info = DeviceInfoClient::new(probe_timeout.max(Duration::from_secs(2)))?;
    Ok(DeviceScanner::new(info))
}
